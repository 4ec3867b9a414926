//! Byte-level nondeterministic automata and subset construction.

use std::collections::VecDeque;

use ahash::AHashMap;
use bit_vec::BitVec;

use crate::automaton::run::RunAutomaton;

/// Byte ranges of every well-formed UTF-8 encoded scalar value.
const UTF8_SEQUENCES: &[&[(u8, u8)]] = &[
    &[(0x00, 0x7F)],
    &[(0xC2, 0xDF), (0x80, 0xBF)],
    &[(0xE0, 0xE0), (0xA0, 0xBF), (0x80, 0xBF)],
    &[(0xE1, 0xEC), (0x80, 0xBF), (0x80, 0xBF)],
    &[(0xED, 0xED), (0x80, 0x9F), (0x80, 0xBF)],
    &[(0xEE, 0xEF), (0x80, 0xBF), (0x80, 0xBF)],
    &[(0xF0, 0xF0), (0x90, 0xBF), (0x80, 0xBF), (0x80, 0xBF)],
    &[(0xF1, 0xF3), (0x80, 0xBF), (0x80, 0xBF), (0x80, 0xBF)],
    &[(0xF4, 0xF4), (0x80, 0x8F), (0x80, 0xBF), (0x80, 0xBF)],
];

#[derive(Debug, Clone, Default)]
struct NfaState {
    accept: bool,
    ranges: Vec<(u8, u8, usize)>,
    epsilons: Vec<usize>,
}

/// A nondeterministic automaton over bytes, with epsilon moves.
///
/// State 0 is the start state.
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Nfa {
    /// Create an automaton holding only a non-accepting start state.
    pub fn new() -> Self {
        Nfa {
            states: vec![NfaState::default()],
        }
    }

    /// The start state.
    pub fn start(&self) -> usize {
        0
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Add a fresh state and return its id.
    pub fn add_state(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    /// Mark a state as accepting.
    pub fn set_accept(&mut self, state: usize, accept: bool) {
        self.states[state].accept = accept;
    }

    /// Returns true if the state is accepting.
    pub fn is_accept(&self, state: usize) -> bool {
        self.states[state].accept
    }

    /// Add a transition on every byte in `min..=max`.
    pub fn add_range(&mut self, from: usize, min: u8, max: u8, to: usize) {
        debug_assert!(min <= max);
        self.states[from].ranges.push((min, max, to));
    }

    /// Add a transition on a single byte.
    pub fn add_byte(&mut self, from: usize, byte: u8, to: usize) {
        self.add_range(from, byte, byte, to);
    }

    /// Add an epsilon move.
    pub fn add_epsilon(&mut self, from: usize, to: usize) {
        self.states[from].epsilons.push(to);
    }

    /// Add a path spelling `bytes` from `from` to `to`.
    pub fn add_bytes(&mut self, from: usize, bytes: &[u8], to: usize) {
        match bytes {
            [] => self.add_epsilon(from, to),
            [last] => self.add_byte(from, *last, to),
            [first, rest @ ..] => {
                let mid = self.add_state();
                self.add_byte(from, *first, mid);
                self.add_bytes(mid, rest, to);
            }
        }
    }

    /// Add a path spelling the UTF-8 encoding of `c`.
    pub fn add_char(&mut self, from: usize, c: char, to: usize) {
        let mut buf = [0u8; 4];
        self.add_bytes(from, c.encode_utf8(&mut buf).as_bytes(), to);
    }

    /// Add paths accepting exactly one UTF-8 encoded character.
    pub fn add_any_char(&mut self, from: usize, to: usize) {
        for sequence in UTF8_SEQUENCES {
            let mut cur = from;
            for (i, &(min, max)) in sequence.iter().enumerate() {
                let next = if i + 1 == sequence.len() { to } else { self.add_state() };
                self.add_range(cur, min, max, next);
                cur = next;
            }
        }
    }

    /// Add a self loop on every byte.
    pub fn add_any_bytes_loop(&mut self, state: usize) {
        self.add_range(state, 0x00, 0xFF, state);
    }

    /// The automaton accepting the reversed language.
    pub fn reverse(&self) -> Nfa {
        let offset = 1;
        let mut reversed = Nfa {
            states: vec![NfaState::default(); self.states.len() + offset],
        };

        for (from, state) in self.states.iter().enumerate() {
            for &(min, max, to) in &state.ranges {
                reversed.add_range(to + offset, min, max, from + offset);
            }
            for &to in &state.epsilons {
                reversed.add_epsilon(to + offset, from + offset);
            }
            if state.accept {
                reversed.add_epsilon(0, from + offset);
            }
        }
        reversed.set_accept(self.start() + offset, true);
        reversed
    }

    fn epsilon_closure(&self, set: &mut BitVec) {
        let mut stack: Vec<usize> = set
            .iter()
            .enumerate()
            .filter_map(|(i, present)| present.then_some(i))
            .collect();
        while let Some(state) = stack.pop() {
            for &next in &self.states[state].epsilons {
                if !set.get(next).unwrap_or(false) {
                    set.set(next, true);
                    stack.push(next);
                }
            }
        }
    }

    fn accepts_any(&self, set: &BitVec) -> bool {
        set.iter()
            .enumerate()
            .any(|(i, present)| present && self.states[i].accept)
    }

    /// Subset construction into a dense DFA with dead states removed.
    pub fn determinize(&self) -> RunAutomaton {
        let n = self.states.len();
        let mut start = BitVec::from_elem(n, false);
        start.set(self.start(), true);
        self.epsilon_closure(&mut start);

        let mut ids: AHashMap<BitVec, u32> = AHashMap::new();
        let mut sets = vec![start.clone()];
        let mut table: Vec<u32> = Vec::new();
        let mut accept = Vec::new();
        let mut queue = VecDeque::from([0u32]);
        ids.insert(start, 0);

        while let Some(id) = queue.pop_front() {
            let set = sets[id as usize].clone();
            accept.push(self.accepts_any(&set));

            let row_start = table.len();
            table.resize(row_start + 256, RunAutomaton::DEAD);

            let mut targets: Vec<BitVec> = vec![BitVec::from_elem(n, false); 256];
            let mut touched = [false; 256];
            for (state, present) in set.iter().enumerate() {
                if !present {
                    continue;
                }
                for &(min, max, to) in &self.states[state].ranges {
                    for byte in min..=max {
                        targets[byte as usize].set(to, true);
                        touched[byte as usize] = true;
                    }
                }
            }

            for byte in 0..256 {
                if !touched[byte] {
                    continue;
                }
                let mut target = std::mem::replace(&mut targets[byte], BitVec::new());
                self.epsilon_closure(&mut target);
                let next = match ids.get(&target) {
                    Some(&next) => next,
                    None => {
                        let next = sets.len() as u32;
                        ids.insert(target.clone(), next);
                        sets.push(target);
                        queue.push_back(next);
                        next
                    }
                };
                table[row_start + byte] = next;
            }
        }

        prune_dead(table, accept)
    }
}

/// Drop states that cannot reach an accepting state, keeping the start state.
fn prune_dead(table: Vec<u32>, accept: Vec<bool>) -> RunAutomaton {
    let num_states = accept.len();

    let mut incoming: Vec<Vec<u32>> = vec![Vec::new(); num_states];
    for (state, row) in table.chunks(256).enumerate() {
        for &dest in row {
            if dest != RunAutomaton::DEAD {
                incoming[dest as usize].push(state as u32);
            }
        }
    }

    let mut live = BitVec::from_elem(num_states, false);
    let mut stack: Vec<u32> = Vec::new();
    for (state, &is_accept) in accept.iter().enumerate() {
        if is_accept {
            live.set(state, true);
            stack.push(state as u32);
        }
    }
    while let Some(state) = stack.pop() {
        for &pred in &incoming[state as usize] {
            if !live.get(pred as usize).unwrap_or(false) {
                live.set(pred as usize, true);
                stack.push(pred);
            }
        }
    }

    // Subset construction numbers states in BFS order, so the start state
    // stays at 0 after renumbering.
    let mut remap = vec![RunAutomaton::DEAD; num_states];
    let mut next_id = 0u32;
    for state in 0..num_states {
        if state == 0 || live.get(state).unwrap_or(false) {
            remap[state] = next_id;
            next_id += 1;
        }
    }

    let mut pruned_table = Vec::with_capacity(next_id as usize * 256);
    let mut pruned_accept = BitVec::from_elem(next_id as usize, false);
    for state in 0..num_states {
        let new_id = remap[state];
        if new_id == RunAutomaton::DEAD {
            continue;
        }
        pruned_accept.set(new_id as usize, accept[state]);
        for &dest in &table[state * 256..(state + 1) * 256] {
            let mapped = if dest == RunAutomaton::DEAD || !live.get(dest as usize).unwrap_or(false) {
                RunAutomaton::DEAD
            } else {
                remap[dest as usize]
            };
            pruned_table.push(mapped);
        }
    }

    RunAutomaton::from_table(pruned_table, pruned_accept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinize_literal() {
        let mut nfa = Nfa::new();
        let end = nfa.add_state();
        nfa.add_bytes(nfa.start(), b"ab", end);
        nfa.set_accept(end, true);

        let dfa = nfa.determinize();
        assert!(dfa.run(b"ab"));
        assert!(!dfa.run(b"a"));
        assert!(!dfa.run(b"abc"));
        assert_eq!(dfa.num_states(), 3);
    }

    #[test]
    fn test_dead_branches_are_pruned() {
        let mut nfa = Nfa::new();
        let end = nfa.add_state();
        let trap = nfa.add_state();
        nfa.add_byte(0, b'a', end);
        nfa.add_byte(0, b'b', trap);
        nfa.set_accept(end, true);

        let dfa = nfa.determinize();
        assert_eq!(dfa.num_states(), 2);
        assert_eq!(dfa.step(0, b'b'), None);
        assert_eq!(dfa.transitions(0).len(), 1);
    }

    #[test]
    fn test_any_char_accepts_multibyte() {
        let mut nfa = Nfa::new();
        let end = nfa.add_state();
        nfa.add_any_char(0, end);
        nfa.set_accept(end, true);

        let dfa = nfa.determinize();
        for s in ["a", "é", "€", "😀"] {
            assert!(dfa.run(s.as_bytes()), "{s}");
        }
        assert!(!dfa.run("ab".as_bytes()));
        assert!(!dfa.run(&[0xFF]));
    }

    #[test]
    fn test_reverse() {
        let mut nfa = Nfa::new();
        let end = nfa.add_state();
        nfa.add_bytes(0, b"abc", end);
        nfa.set_accept(end, true);

        let reversed = nfa.reverse().determinize();
        assert!(reversed.run(b"cba"));
        assert!(!reversed.run(b"abc"));
    }
}
