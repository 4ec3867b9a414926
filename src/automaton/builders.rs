//! Constructors for the automata used by multi-term queries.

use crate::automaton::nfa::Nfa;
use crate::error::{BlockTreeError, Result};
use crate::util::levenshtein;

/// Largest supported edit distance.
pub const MAX_EDITS: u32 = 2;

/// An automaton accepting exactly the given terms.
pub fn term_set<I, T>(terms: I) -> Nfa
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut nfa = Nfa::new();
    for term in terms {
        // Each term gets its own branch; determinization merges shared prefixes.
        let end = nfa.add_state();
        nfa.add_bytes(nfa.start(), term.as_ref(), end);
        nfa.set_accept(end, true);
    }
    nfa
}

/// An automaton accepting every term that starts with `prefix`.
pub fn prefix(prefix: &[u8]) -> Nfa {
    let mut nfa = Nfa::new();
    let end = nfa.add_state();
    nfa.add_bytes(nfa.start(), prefix, end);
    nfa.add_any_bytes_loop(end);
    nfa.set_accept(end, true);
    nfa
}

/// An automaton for a wildcard pattern.
///
/// `*` matches any sequence of characters, `?` matches exactly one character,
/// and `\` escapes the character that follows it.
pub fn wildcard(pattern: &str) -> Result<Nfa> {
    let mut nfa = Nfa::new();
    let mut cur = nfa.start();
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                let next = nfa.add_state();
                nfa.add_epsilon(cur, next);
                nfa.add_any_bytes_loop(next);
                cur = next;
            }
            '?' => {
                let next = nfa.add_state();
                nfa.add_any_char(cur, next);
                cur = next;
            }
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    BlockTreeError::invalid_argument(format!(
                        "wildcard pattern ends with an escape: {pattern}"
                    ))
                })?;
                let next = nfa.add_state();
                nfa.add_char(cur, escaped, next);
                cur = next;
            }
            literal => {
                let next = nfa.add_state();
                nfa.add_char(cur, literal, next);
                cur = next;
            }
        }
    }

    nfa.set_accept(cur, true);
    Ok(nfa)
}

/// Matches terms within a bounded edit distance of a pattern.
///
/// Edits are counted in characters; insertions, deletions and substitutions
/// cost one each. The first `prefix_length` characters must match exactly.
#[derive(Debug, Clone)]
pub struct LevenshteinAutomaton {
    pattern: String,
    max_edits: u32,
    prefix_length: usize,
}

impl LevenshteinAutomaton {
    /// Create a new Levenshtein automaton.
    ///
    /// # Arguments
    ///
    /// * `pattern` - The string to match against
    /// * `max_edits` - Maximum edit distance (0, 1, or 2)
    /// * `prefix_length` - Required exact prefix length
    pub fn new(pattern: impl Into<String>, max_edits: u32, prefix_length: usize) -> Result<Self> {
        if max_edits > MAX_EDITS {
            return Err(BlockTreeError::invalid_argument(format!(
                "max_edits must be between 0 and {MAX_EDITS}, got {max_edits}"
            )));
        }
        Ok(LevenshteinAutomaton {
            pattern: pattern.into(),
            max_edits,
            prefix_length,
        })
    }

    /// Get the pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Get the maximum edit distance.
    pub fn max_edits(&self) -> u32 {
        self.max_edits
    }

    /// Get the prefix length.
    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    /// Check a candidate directly, without building an automaton.
    pub fn matches(&self, candidate: &str) -> bool {
        levenshtein::within_edits(
            &self.pattern,
            candidate,
            self.max_edits as usize,
            self.prefix_length,
        )
    }

    /// Build the nondeterministic automaton.
    ///
    /// States of the edit part are pairs `(consumed pattern chars, edits used)`.
    pub fn to_nfa(&self) -> Nfa {
        let chars: Vec<char> = self.pattern.chars().collect();
        let split = self.prefix_length.min(chars.len());
        let (exact, rest) = chars.split_at(split);

        let mut nfa = Nfa::new();
        let mut cur = nfa.start();
        for &c in exact {
            let next = nfa.add_state();
            nfa.add_char(cur, c, next);
            cur = next;
        }

        let k = self.max_edits as usize;
        let n = rest.len();
        let mut grid = vec![vec![0usize; k + 1]; n + 1];
        for (i, row) in grid.iter_mut().enumerate() {
            for (e, slot) in row.iter_mut().enumerate() {
                *slot = if i == 0 && e == 0 { cur } else { nfa.add_state() };
            }
        }

        for i in 0..=n {
            for e in 0..=k {
                let state = grid[i][e];
                if i == n {
                    nfa.set_accept(state, true);
                }
                if i < n {
                    nfa.add_char(state, rest[i], grid[i + 1][e]);
                }
                if e < k {
                    // insertion
                    nfa.add_any_char(state, grid[i][e + 1]);
                    if i < n {
                        // substitution
                        nfa.add_any_char(state, grid[i + 1][e + 1]);
                        // deletion
                        nfa.add_epsilon(state, grid[i + 1][e + 1]);
                    }
                }
            }
        }

        nfa
    }
}
