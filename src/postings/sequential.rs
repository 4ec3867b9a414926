//! A reference postings codec that lays postings out sequentially.
//!
//! Postings are not stored; the writer only tracks where each term's document
//! and position lists would start if they were appended to `.doc` and `.pos`
//! streams, and keeps the document id of single-document terms inline. The
//! resulting pointers grow monotonically, which is what the dictionary's
//! delta coding of metadata relies on.

use log::trace;

use crate::error::{BlockTreeError, Result};
use crate::postings::{BlockTermState, PostingsReader, PostingsWriter};
use crate::segment::FieldInfo;
use crate::storage::codec;
use crate::storage::{BytesReader, DataInput, DataOutput, IndexInput, IndexOutput};
use crate::util::varint;

/// Codec name written into the terms dictionary header.
pub const CODEC_NAME: &str = "SEQUENTIAL_POSTINGS";

/// Current codec version.
pub const VERSION_CURRENT: u32 = 0;

/// Where a term's postings live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequentialTermState {
    /// Start of the term's document list.
    pub doc_start_fp: u64,
    /// Start of the term's position list.
    pub pos_start_fp: u64,
    /// The only document of a single-document term.
    pub singleton_doc_id: Option<u32>,
}

/// Write side of the sequential codec.
#[derive(Debug, Default)]
pub struct SequentialPostingsWriter {
    doc_fp: u64,
    pos_fp: u64,
    has_freqs: bool,
    has_positions: bool,
    last_doc_id: Option<u32>,
    term_doc_freq: u32,
    term_doc_bytes: u64,
    term_positions: u64,
    last_state: SequentialTermState,
    last_encoded: SequentialTermState,
}

impl SequentialPostingsWriter {
    /// Create a writer whose pointers start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one document of the current term.
    ///
    /// Documents must arrive in increasing order.
    pub fn add_doc(&mut self, doc_id: u32, freq: u32) -> Result<()> {
        let delta = match self.last_doc_id {
            Some(last) if doc_id <= last => {
                return Err(BlockTreeError::invalid_argument(format!(
                    "docs out of order: {doc_id} after {last}"
                )));
            }
            Some(last) => doc_id - last,
            None => doc_id,
        };

        self.term_doc_bytes += varint::encoded_len(delta as u64) as u64;
        if self.has_freqs {
            self.term_doc_bytes += varint::encoded_len(freq as u64) as u64;
        }
        if self.has_positions {
            self.term_positions += freq as u64;
        }
        self.term_doc_freq += 1;
        self.last_doc_id = Some(doc_id);
        Ok(())
    }

    /// State assigned to the most recently finished term.
    pub fn last_state(&self) -> SequentialTermState {
        self.last_state
    }
}

impl PostingsWriter for SequentialPostingsWriter {
    type State = SequentialTermState;

    fn init(&mut self, terms_out: &mut IndexOutput) -> Result<()> {
        codec::write_header(terms_out, CODEC_NAME, VERSION_CURRENT)
    }

    fn set_field(&mut self, field: &FieldInfo) -> usize {
        self.has_freqs = field.index_options.has_freqs();
        self.has_positions = field.index_options.has_positions();
        if self.has_positions { 2 } else { 1 }
    }

    fn start_term(&mut self) {
        self.last_doc_id = None;
        self.term_doc_freq = 0;
        self.term_doc_bytes = 0;
        self.term_positions = 0;
    }

    fn finish_term(&mut self, state: &mut BlockTermState<Self::State>) -> Result<()> {
        let singleton_doc_id = if state.doc_freq == 1 {
            // Single-document terms without recorded docs still get an id.
            Some(self.last_doc_id.unwrap_or(0))
        } else {
            None
        };

        state.postings = SequentialTermState {
            doc_start_fp: self.doc_fp,
            pos_start_fp: self.pos_fp,
            singleton_doc_id,
        };

        if singleton_doc_id.is_none() {
            self.doc_fp += self.term_doc_bytes.max(state.doc_freq as u64);
        }
        self.pos_fp += self.term_positions;
        self.last_state = state.postings;
        trace!(
            "finished term: doc_fp={} pos_fp={} df={}",
            state.postings.doc_start_fp, state.postings.pos_start_fp, state.doc_freq
        );
        Ok(())
    }

    fn encode_term(
        &mut self,
        longs: &mut [u64],
        out: &mut Vec<u8>,
        field: &FieldInfo,
        state: &BlockTermState<Self::State>,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            self.last_encoded = SequentialTermState::default();
        }

        let current = state.postings;
        longs[0] = current
            .doc_start_fp
            .checked_sub(self.last_encoded.doc_start_fp)
            .ok_or_else(|| BlockTreeError::invalid_operation("doc pointers went backwards"))?;
        if field.index_options.has_positions() {
            longs[1] = current
                .pos_start_fp
                .checked_sub(self.last_encoded.pos_start_fp)
                .ok_or_else(|| BlockTreeError::invalid_operation("position pointers went backwards"))?;
        }

        if let Some(doc_id) = current.singleton_doc_id {
            out.write_vint(doc_id)?;
        }

        self.last_encoded = current;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Read side of the sequential codec.
#[derive(Debug, Default)]
pub struct SequentialPostingsReader {
    version: Option<u32>,
}

impl SequentialPostingsReader {
    /// Create a reader.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostingsReader for SequentialPostingsReader {
    type State = SequentialTermState;

    fn init(&mut self, terms_in: &mut IndexInput) -> Result<()> {
        let version = codec::check_header(terms_in, CODEC_NAME, VERSION_CURRENT, VERSION_CURRENT)?;
        self.version = Some(version);
        Ok(())
    }

    fn decode_term(
        &self,
        longs: &[u64],
        input: &mut BytesReader,
        field: &FieldInfo,
        state: &mut BlockTermState<Self::State>,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            state.postings = SequentialTermState::default();
        }

        state.postings.doc_start_fp += longs[0];
        if field.index_options.has_positions() {
            state.postings.pos_start_fp += longs[1];
        }
        state.postings.singleton_doc_id = if state.doc_freq == 1 {
            Some(input.read_vint()?)
        } else {
            None
        };
        Ok(())
    }

    fn check_integrity(&self) -> Result<()> {
        match self.version {
            Some(_) => Ok(()),
            None => Err(BlockTreeError::invalid_operation("postings reader was not initialized")),
        }
    }
}
