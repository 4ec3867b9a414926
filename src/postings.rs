//! The postings-codec seam of the term dictionary.
//!
//! The dictionary never interprets postings. For every term it asks the
//! postings writer for a fixed number of monotonic integers (the *metadata
//! longs*) plus a free-form byte blob, stores them inside the term's block,
//! and hands them back to the postings reader when a term's metadata is
//! requested. The first term of every block is encoded `absolute`; the
//! following ones may be deltas against their predecessor.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::segment::FieldInfo;
use crate::storage::{BytesReader, IndexInput, IndexOutput};

pub mod sequential;

pub use sequential::{SequentialPostingsReader, SequentialPostingsWriter, SequentialTermState};

/// Per-term statistics supplied by the caller when a term is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStats {
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Total number of occurrences, or -1 when frequencies are omitted.
    pub total_term_freq: i64,
}

impl TermStats {
    /// Create term statistics.
    pub fn new(doc_freq: u32, total_term_freq: i64) -> Self {
        TermStats {
            doc_freq,
            total_term_freq,
        }
    }
}

/// The decoded state of one term: dictionary statistics plus the postings
/// codec's own state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTermState<S> {
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Total number of occurrences, or -1 when frequencies are omitted.
    pub total_term_freq: i64,
    /// Ordinal of the term among the terms of its block.
    pub term_block_ord: usize,
    /// File pointer of the block holding the term.
    pub block_file_pointer: u64,
    /// Postings-codec state.
    pub postings: S,
}

impl<S: Default> BlockTermState<S> {
    /// A fresh state with no frequencies.
    pub fn new() -> Self {
        BlockTermState {
            doc_freq: 0,
            total_term_freq: -1,
            term_block_ord: 0,
            block_file_pointer: 0,
            postings: S::default(),
        }
    }

    /// Statistics carried by this state.
    pub fn stats(&self) -> TermStats {
        TermStats::new(self.doc_freq, self.total_term_freq)
    }
}

/// Write side of a postings codec.
pub trait PostingsWriter {
    /// Codec-specific per-term state.
    type State: Clone + Default + Debug;

    /// Write the codec's header into the terms dictionary stream.
    fn init(&mut self, terms_out: &mut IndexOutput) -> Result<()>;

    /// Switch to a new field; returns the number of metadata longs per term.
    fn set_field(&mut self, field: &FieldInfo) -> usize;

    /// A new term starts; the caller feeds its postings next.
    fn start_term(&mut self);

    /// The current term is complete; fill in the codec state.
    fn finish_term(&mut self, state: &mut BlockTermState<Self::State>) -> Result<()>;

    /// Encode a finished term's metadata.
    ///
    /// `longs` has exactly the arity returned by [`PostingsWriter::set_field`];
    /// values must be non-negative and, unless `absolute`, relative to the
    /// previously encoded term of the same block. Extra bytes go to `out`.
    fn encode_term(
        &mut self,
        longs: &mut [u64],
        out: &mut Vec<u8>,
        field: &FieldInfo,
        state: &BlockTermState<Self::State>,
        absolute: bool,
    ) -> Result<()>;

    /// Release resources held by the codec.
    fn close(&mut self) -> Result<()>;
}

/// Read side of a postings codec.
pub trait PostingsReader: Send + Sync {
    /// Codec-specific per-term state.
    type State: Clone + Default + Debug + Send + Sync;

    /// Read and validate the codec's header from the terms dictionary stream.
    fn init(&mut self, terms_in: &mut IndexInput) -> Result<()>;

    /// Decode one term's metadata, the inverse of [`PostingsWriter::encode_term`].
    fn decode_term(
        &self,
        longs: &[u64],
        input: &mut BytesReader,
        field: &FieldInfo,
        state: &mut BlockTermState<Self::State>,
        absolute: bool,
    ) -> Result<()>;

    /// Verify any files owned by the codec.
    fn check_integrity(&self) -> Result<()>;
}
