//! Entries buffered by the writer until they are folded into a block.

use std::fmt;

use crate::postings::BlockTermState;

/// A finished term waiting for its block.
#[derive(Debug, Clone)]
pub(crate) struct PendingTerm<S> {
    pub(crate) term: Vec<u8>,
    pub(crate) state: BlockTermState<S>,
}

/// A block already written to the dictionary, waiting for its parent.
pub(crate) struct PendingBlock {
    pub(crate) prefix: Vec<u8>,
    pub(crate) fp: u64,
    pub(crate) has_terms: bool,
    pub(crate) is_floor: bool,
    /// Leading suffix byte of a floor sibling; `None` for the first block of
    /// a floor group and for ordinary blocks.
    pub(crate) floor_lead_byte: Option<u8>,
    /// Prefix index of this block and everything below it, once compiled.
    pub(crate) index: Option<fst::Map<Vec<u8>>>,
    /// Encoded pointer of this block, once compiled.
    pub(crate) code: Vec<u8>,
    /// Indexes of the sub-blocks referenced from this block.
    pub(crate) sub_indices: Vec<fst::Map<Vec<u8>>>,
}

impl PendingBlock {
    pub(crate) fn new(
        prefix: Vec<u8>,
        fp: u64,
        has_terms: bool,
        is_floor: bool,
        floor_lead_byte: Option<u8>,
        sub_indices: Vec<fst::Map<Vec<u8>>>,
    ) -> Self {
        PendingBlock {
            prefix,
            fp,
            has_terms,
            is_floor,
            floor_lead_byte,
            index: None,
            code: Vec::new(),
            sub_indices,
        }
    }
}

impl fmt::Debug for PendingBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingBlock")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .field("fp", &self.fp)
            .field("has_terms", &self.has_terms)
            .field("is_floor", &self.is_floor)
            .field("floor_lead_byte", &self.floor_lead_byte)
            .field("index_keys", &self.index.as_ref().map(|index| index.len()))
            .field("sub_indices", &self.sub_indices.len())
            .finish()
    }
}

/// A pending term or sub-block.
#[derive(Debug)]
pub(crate) enum PendingEntry<S> {
    Term(PendingTerm<S>),
    Block(PendingBlock),
}

impl<S> PendingEntry<S> {
    pub(crate) fn is_term(&self) -> bool {
        matches!(self, PendingEntry::Term(_))
    }

    /// The bytes this entry is sorted by: a term, or a block's prefix.
    pub(crate) fn key(&self) -> &[u8] {
        match self {
            PendingEntry::Term(term) => &term.term,
            PendingEntry::Block(block) => &block.prefix,
        }
    }
}
