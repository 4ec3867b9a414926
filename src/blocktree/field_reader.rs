//! Read access to the terms of one field.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::automaton::CompiledAutomaton;
use crate::blocktree::cursor::TermCursor;
use crate::blocktree::index::{TermsIndex, read_block_pointer};
use crate::blocktree::intersect::IntersectCursor;
use crate::blocktree::stats::Stats;
use crate::blocktree::terms::Terms;
use crate::error::Result;
use crate::postings::PostingsReader;
use crate::segment::FieldInfo;
use crate::storage::{BytesReader, IndexInput};

/// Directory entry of a field plus its loaded prefix index.
///
/// Blocks are only read by cursors, each on its own clone of the
/// dictionary input, so any number of cursors may run at once.
pub struct FieldReader<P: PostingsReader> {
    info: FieldInfo,
    segment: String,
    num_terms: u64,
    root_code: Vec<u8>,
    root_block_fp: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
    doc_count: u32,
    index_start_fp: u64,
    longs_size: usize,
    index: TermsIndex,
    dict: Arc<IndexInput>,
    postings: Arc<P>,
}

impl<P: PostingsReader> fmt::Debug for FieldReader<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReader")
            .field("field", &self.info.name)
            .field("num_terms", &self.num_terms)
            .field("sum_doc_freq", &self.sum_doc_freq)
            .field("sum_total_term_freq", &self.sum_total_term_freq)
            .field("doc_count", &self.doc_count)
            .field("root_block_fp", &self.root_block_fp)
            .field("index_start_fp", &self.index_start_fp)
            .field("index", &self.index)
            .finish()
    }
}

/// Directory values of a field, as read from the dictionary.
#[derive(Debug, Clone)]
pub(crate) struct FieldMeta {
    pub(crate) info: FieldInfo,
    pub(crate) num_terms: u64,
    pub(crate) root_code: Vec<u8>,
    pub(crate) sum_total_term_freq: i64,
    pub(crate) sum_doc_freq: u64,
    pub(crate) doc_count: u32,
    pub(crate) index_start_fp: u64,
    pub(crate) longs_size: usize,
}

impl<P: PostingsReader> FieldReader<P> {
    /// Load the field's prefix index from `index_in` at its start pointer.
    pub(crate) fn new(
        meta: FieldMeta,
        segment: &str,
        index_in: &IndexInput,
        dict: Arc<IndexInput>,
        postings: Arc<P>,
    ) -> Result<Self> {
        let mut clone = index_in.clone_input()?;
        clone.seek(meta.index_start_fp)?;
        let index = TermsIndex::read(&mut clone)?;

        let mut scratch = BytesReader::new();
        scratch.reset(&meta.root_code);
        let root_block_fp = read_block_pointer(&mut scratch)?.fp;

        debug!(
            "loaded field {}: {} terms, {} index prefixes, root block fp={root_block_fp}",
            meta.info.name,
            meta.num_terms,
            index.num_prefixes()
        );

        Ok(FieldReader {
            info: meta.info,
            segment: segment.to_string(),
            num_terms: meta.num_terms,
            root_code: meta.root_code,
            root_block_fp,
            sum_total_term_freq: meta.sum_total_term_freq,
            sum_doc_freq: meta.sum_doc_freq,
            doc_count: meta.doc_count,
            index_start_fp: meta.index_start_fp,
            longs_size: meta.longs_size,
            index,
            dict,
            postings,
        })
    }

    /// The field's metadata.
    pub fn info(&self) -> &FieldInfo {
        &self.info
    }

    /// Name of the segment the field belongs to.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// The code of the root block.
    pub fn root_code(&self) -> &[u8] {
        &self.root_code
    }

    pub(crate) fn root_block_fp(&self) -> u64 {
        self.root_block_fp
    }

    /// Number of metadata longs the postings codec stores per term.
    pub fn longs_size(&self) -> usize {
        self.longs_size
    }

    /// The field's prefix index.
    pub fn index(&self) -> &TermsIndex {
        &self.index
    }

    pub(crate) fn dict(&self) -> &IndexInput {
        &self.dict
    }

    pub(crate) fn postings(&self) -> &P {
        &self.postings
    }

    /// Enumerate the terms accepted by `automaton`.
    ///
    /// With `start_term`, enumeration begins after it; `start_term` itself is
    /// never returned.
    pub fn intersect<'a>(
        &'a self,
        automaton: &'a CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<IntersectCursor<'a, P>> {
        IntersectCursor::new(self, automaton, start_term)
    }

    /// Walk every block of the field and report its shape.
    pub fn compute_stats(&self) -> Result<Stats> {
        TermCursor::new(self).compute_block_stats()
    }
}

impl<P: PostingsReader> Terms for FieldReader<P> {
    type Cursor<'a>
        = TermCursor<'a, P>
    where
        Self: 'a;

    fn iterator(&self) -> TermCursor<'_, P> {
        TermCursor::new(self)
    }

    fn size(&self) -> u64 {
        self.num_terms
    }

    fn sum_doc_freq(&self) -> u64 {
        self.sum_doc_freq
    }

    fn sum_total_term_freq(&self) -> i64 {
        self.sum_total_term_freq
    }

    fn doc_count(&self) -> u32 {
        self.doc_count
    }

    fn has_freqs(&self) -> bool {
        self.info.index_options.has_freqs()
    }

    fn has_positions(&self) -> bool {
        self.info.index_options.has_positions()
    }

    fn has_offsets(&self) -> bool {
        self.info.index_options.has_offsets()
    }

    fn has_payloads(&self) -> bool {
        self.info.has_payloads
    }
}
