//! Deterministic automata in table form.

use bit_vec::BitVec;

/// A contiguous run of bytes leading to the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Smallest byte of the range.
    pub min: u8,
    /// Largest byte of the range, inclusive.
    pub max: u8,
    /// Destination state.
    pub dest: u32,
}

/// A byte-level DFA with a dense transition table.
///
/// Every state can reach an accepting state, except possibly the start state
/// of an automaton whose language is empty. State 0 is the start state.
#[derive(Debug, Clone)]
pub struct RunAutomaton {
    table: Vec<u32>,
    accept: BitVec,
    transitions: Vec<Vec<Transition>>,
}

impl RunAutomaton {
    /// Marker for a missing transition in the dense table.
    pub const DEAD: u32 = u32::MAX;

    /// Build from a row-major table of 256 entries per state.
    pub fn from_table(table: Vec<u32>, accept: BitVec) -> Self {
        debug_assert_eq!(table.len(), accept.len() * 256);

        let transitions = table
            .chunks(256)
            .map(|row| {
                let mut ranges: Vec<Transition> = Vec::new();
                for (byte, &dest) in row.iter().enumerate() {
                    if dest == Self::DEAD {
                        continue;
                    }
                    let byte = byte as u8;
                    match ranges.last_mut() {
                        Some(last) if last.dest == dest && last.max as usize + 1 == byte as usize => {
                            last.max = byte;
                        }
                        _ => ranges.push(Transition {
                            min: byte,
                            max: byte,
                            dest,
                        }),
                    }
                }
                ranges
            })
            .collect();

        RunAutomaton {
            table,
            accept,
            transitions,
        }
    }

    /// The start state.
    pub fn initial(&self) -> u32 {
        0
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.accept.len()
    }

    /// Step from `state` on `byte`, or `None` if the automaton rejects.
    #[inline]
    pub fn step(&self, state: u32, byte: u8) -> Option<u32> {
        let dest = self.table[state as usize * 256 + byte as usize];
        (dest != Self::DEAD).then_some(dest)
    }

    /// Step over a run of bytes.
    pub fn step_all(&self, mut state: u32, bytes: &[u8]) -> Option<u32> {
        for &byte in bytes {
            state = self.step(state, byte)?;
        }
        Some(state)
    }

    /// Returns true if `state` is accepting.
    #[inline]
    pub fn is_accept(&self, state: u32) -> bool {
        self.accept.get(state as usize).unwrap_or(false)
    }

    /// Outgoing transitions of `state`, sorted by byte.
    pub fn transitions(&self, state: u32) -> &[Transition] {
        &self.transitions[state as usize]
    }

    /// Returns true if the automaton accepts `bytes`.
    pub fn run(&self, bytes: &[u8]) -> bool {
        self.step_all(self.initial(), bytes)
            .is_some_and(|state| self.is_accept(state))
    }
}
