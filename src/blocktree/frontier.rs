//! The prefix frontier that decides where blocks are cut.
//!
//! The frontier holds one node per prefix of the most recently added term.
//! When a new term arrives, every prefix of the previous term that the new
//! term does not share can never gain entries again: it is *frozen*. A frozen
//! prefix with at least `min_items_in_block` entries below it (terms ending
//! there plus entries carried up from frozen children) becomes one or more
//! blocks, which then count as a single entry for the parent prefix. Smaller
//! prefixes carry their count upward.

use crate::error::{BlockTreeError, Result};

/// Request to write the top `count` pending entries as blocks sharing
/// the first `prefix_len` bytes of the previous term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flush {
    pub(crate) prefix_len: usize,
    pub(crate) count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct FrontierNode {
    is_final: bool,
    child_count: usize,
}

#[derive(Debug)]
pub(crate) struct Frontier {
    min_items_in_block: usize,
    nodes: Vec<FrontierNode>,
    last: Vec<u8>,
    started: bool,
}

impl Frontier {
    pub(crate) fn new(min_items_in_block: usize) -> Self {
        Frontier {
            min_items_in_block,
            nodes: vec![FrontierNode::default()],
            last: Vec::new(),
            started: false,
        }
    }

    /// The most recently added term.
    pub(crate) fn last_term(&self) -> &[u8] {
        &self.last
    }

    /// Freeze the prefixes of the previous term that `term` does not share.
    ///
    /// Returns the shared prefix length, to be passed to [`Frontier::push`]
    /// once the flushes have been written.
    pub(crate) fn freeze_for(&mut self, term: &[u8], flushes: &mut Vec<Flush>) -> Result<usize> {
        if self.started && term <= self.last.as_slice() {
            return Err(BlockTreeError::invalid_argument(format!(
                "terms must be added in strictly increasing byte order: {:?} after {:?}",
                String::from_utf8_lossy(term),
                String::from_utf8_lossy(&self.last)
            )));
        }

        let common = term
            .iter()
            .zip(&self.last)
            .take_while(|(a, b)| a == b)
            .count();
        self.freeze_tail(common + 1, flushes);
        Ok(common)
    }

    /// Make `term` the last term; `common` is its shared prefix with the previous one.
    pub(crate) fn push(&mut self, term: &[u8], common: usize) {
        self.nodes.truncate(common + 1);
        self.nodes.resize(term.len() + 1, FrontierNode::default());
        self.nodes[term.len()].is_final = true;
        self.last.clear();
        self.last.extend_from_slice(term);
        self.started = true;
    }

    /// Freeze every remaining prefix, down to and including the root.
    pub(crate) fn finish(&mut self, flushes: &mut Vec<Flush>) {
        self.freeze_tail(0, flushes);
    }

    fn freeze_tail(&mut self, bound: usize, flushes: &mut Vec<Flush>) {
        let last_len = self.last.len();
        if bound > last_len {
            return;
        }

        for idx in (bound..=last_len).rev() {
            let node = self.nodes[idx];
            let total = usize::from(node.is_final) + node.child_count;

            let carried = if total >= self.min_items_in_block || idx == 0 {
                flushes.push(Flush {
                    prefix_len: idx,
                    count: total,
                });
                1
            } else {
                total
            };

            if idx > 0 {
                self.nodes[idx - 1].child_count += carried;
            }
            self.nodes[idx] = FrontierNode::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_all(frontier: &mut Frontier, terms: &[&str]) -> Vec<Flush> {
        let mut flushes = Vec::new();
        for term in terms {
            let common = frontier.freeze_for(term.as_bytes(), &mut flushes).unwrap();
            frontier.push(term.as_bytes(), common);
        }
        frontier.finish(&mut flushes);
        flushes
    }

    #[test]
    fn test_small_field_is_one_root_block() {
        let mut frontier = Frontier::new(25);
        let flushes = add_all(&mut frontier, &["a", "b", "c"]);
        assert_eq!(flushes, vec![Flush { prefix_len: 0, count: 3 }]);
    }

    #[test]
    fn test_shared_prefix_becomes_sub_block() {
        let mut frontier = Frontier::new(2);
        let flushes = add_all(&mut frontier, &["aa", "ab", "b"]);
        assert_eq!(
            flushes,
            vec![
                Flush { prefix_len: 1, count: 2 },
                Flush { prefix_len: 0, count: 2 },
            ]
        );
    }

    #[test]
    fn test_unsorted_terms_rejected() {
        let mut frontier = Frontier::new(2);
        let mut flushes = Vec::new();
        let common = frontier.freeze_for(b"b", &mut flushes).unwrap();
        frontier.push(b"b", common);
        assert!(frontier.freeze_for(b"a", &mut flushes).is_err());
        assert!(frontier.freeze_for(b"b", &mut flushes).is_err());
    }

    #[test]
    fn test_empty_term_is_allowed_first() {
        let mut frontier = Frontier::new(2);
        let flushes = add_all(&mut frontier, &["", "a"]);
        assert_eq!(flushes, vec![Flush { prefix_len: 0, count: 2 }]);
    }
}
