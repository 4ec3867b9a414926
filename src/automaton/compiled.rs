//! Automata prepared for intersection with a term dictionary.

use bit_vec::BitVec;

use crate::automaton::builders::{self, LevenshteinAutomaton};
use crate::automaton::nfa::Nfa;
use crate::automaton::run::RunAutomaton;
use crate::error::Result;

/// A determinized automaton plus the facts the intersector precomputes.
#[derive(Debug, Clone)]
pub struct CompiledAutomaton {
    run: RunAutomaton,
    common_suffix: Option<Vec<u8>>,
}

impl CompiledAutomaton {
    /// Determinize `nfa` and derive its common suffix.
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let run = nfa.determinize();
        let reversed = nfa.reverse().determinize();
        let common_suffix = common_prefix(&reversed).map(|mut bytes| {
            bytes.reverse();
            bytes
        });

        log::debug!(
            "compiled automaton: {} states, common suffix {:?}",
            run.num_states(),
            common_suffix.as_deref().map(String::from_utf8_lossy)
        );

        CompiledAutomaton { run, common_suffix }
    }

    /// Accepts exactly the given terms.
    pub fn term_set<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self::from_nfa(&builders::term_set(terms))
    }

    /// Accepts every term starting with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        Self::from_nfa(&builders::prefix(prefix))
    }

    /// Accepts terms matching a wildcard pattern.
    pub fn wildcard(pattern: &str) -> Result<Self> {
        Ok(Self::from_nfa(&builders::wildcard(pattern)?))
    }

    /// Accepts terms within `max_edits` of `pattern`.
    pub fn levenshtein(pattern: &str, max_edits: u32, prefix_length: usize) -> Result<Self> {
        let lev = LevenshteinAutomaton::new(pattern, max_edits, prefix_length)?;
        Ok(Self::from_nfa(&lev.to_nfa()))
    }

    /// The underlying DFA.
    pub fn run_automaton(&self) -> &RunAutomaton {
        &self.run
    }

    /// Bytes every accepted term ends with, if any.
    pub fn common_suffix(&self) -> Option<&[u8]> {
        self.common_suffix.as_deref()
    }

    /// Returns true if the automaton accepts `term`.
    pub fn accepts(&self, term: &[u8]) -> bool {
        self.run.run(term)
    }
}

/// Bytes shared by every string the automaton accepts, from the start.
fn common_prefix(dfa: &RunAutomaton) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut visited = BitVec::from_elem(dfa.num_states(), false);
    let mut state = dfa.initial();

    loop {
        if dfa.is_accept(state) || visited.get(state as usize).unwrap_or(true) {
            break;
        }
        visited.set(state as usize, true);
        match dfa.transitions(state) {
            [only] if only.min == only.max => {
                bytes.push(only.min);
                state = only.dest;
            }
            _ => break,
        }
    }

    (!bytes.is_empty()).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_suffix() {
        let automaton = CompiledAutomaton::wildcard("*ing").unwrap();
        assert_eq!(automaton.common_suffix(), Some(&b"ing"[..]));

        let automaton = CompiledAutomaton::term_set(["card", "bard"]);
        assert_eq!(automaton.common_suffix(), Some(&b"ard"[..]));

        let automaton = CompiledAutomaton::term_set(["car", "cat"]);
        assert_eq!(automaton.common_suffix(), None);

        let automaton = CompiledAutomaton::prefix(b"ab");
        assert_eq!(automaton.common_suffix(), None);
    }

    #[test]
    fn test_accepts() {
        let automaton = CompiledAutomaton::levenshtein("cat", 1, 0).unwrap();
        assert!(automaton.accepts(b"cat"));
        assert!(automaton.accepts(b"cut"));
        assert!(automaton.accepts(b"cats"));
        assert!(!automaton.accepts(b"dogs"));
    }
}
