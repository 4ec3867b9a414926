//! Finite automata for multi-term matching.
//!
//! Patterns are first built as byte-level NFAs (see [`builders`]), then
//! determinized into a dense [`RunAutomaton`]. A [`CompiledAutomaton`] bundles
//! the DFA with the precomputed common suffix used by the term dictionary's
//! intersection cursor.
//!
//! # Example
//!
//! ```
//! use blocktree::automaton::CompiledAutomaton;
//!
//! let automaton = CompiledAutomaton::wildcard("ca?").unwrap();
//! assert!(automaton.accepts(b"cat"));
//! assert!(!automaton.accepts(b"cart"));
//! ```

pub mod builders;
pub mod compiled;
pub mod nfa;
pub mod run;

pub use builders::LevenshteinAutomaton;
pub use compiled::CompiledAutomaton;
pub use nfa::Nfa;
pub use run::{RunAutomaton, Transition};
