//! Block-based terms dictionary and index writer.
//!
//! Writes two files per segment:
//!
//! - `.tim`, the terms dictionary: a codec header, the postings codec's
//!   header, the blocks of every field, the field directory, the directory
//!   offset and a footer.
//! - `.tip`, the terms index: a codec header, one prefix index per field,
//!   the table of index start pointers, the directory offset and a footer.
//!
//! Terms of a field arrive in sorted order and are grouped into blocks of
//! `min_items_in_block..=max_items_in_block` entries sharing a prefix. An entry
//! is either a term or a reference to a sub-block. A block that would hold
//! more than `max_items_in_block` entries is split into *floor* blocks, keyed
//! by the first byte after the shared prefix.
//!
//! Each block is laid out as
//!
//! ```text
//! Block      := vint(entCount << 1 | isLastInFloor)
//!               vint(suffixLen << 1 | isLeaf) Suffixes
//!               vint(statsLen) Stats
//!               vint(metaLen) Meta
//! Suffixes   := leaf:     { vint(suffix) bytes }*
//!               non-leaf: { vint(suffix << 1 | isSubBlock) bytes [vlong(blockFP - subBlockFP)] }*
//! Stats      := { vint(docFreq) [vlong(totalTermFreq - docFreq)] }*
//! Meta       := { vlong(long)* bytes }*
//! ```

use log::{debug, trace, warn};

use crate::blocktree::config::BlockTreeConfig;
use crate::blocktree::frontier::{Flush, Frontier};
use crate::blocktree::header::{
    ChecksumHeader, HeaderCodec, TERMS_CODEC_NAME, TERMS_INDEX_CODEC_NAME,
};
use crate::blocktree::index::{compile_index, write_index};
use crate::blocktree::pending::{PendingBlock, PendingEntry, PendingTerm};
use crate::error::{BlockTreeError, Result};
use crate::postings::{BlockTermState, PostingsWriter, TermStats};
use crate::segment::{FieldInfo, IndexOptions, SegmentInfo, TERMS_EXTENSION, TERMS_INDEX_EXTENSION};
use crate::storage::{DataOutput, IndexOutput, Storage};

static CURRENT_HEADER: ChecksumHeader = ChecksumHeader;

/// Summary of one finished field, written to the directory at close.
#[derive(Debug, Clone)]
struct FieldMetaData {
    field: FieldInfo,
    root_code: Vec<u8>,
    num_terms: u64,
    index_start_fp: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
    doc_count: u32,
    longs_size: usize,
}

/// Writes the terms dictionary and index of one segment.
///
/// Fields are added one at a time with [`BlockTreeTermsWriter::add_field`];
/// [`BlockTreeTermsWriter::close`] writes the field directory and seals both
/// files.
#[derive(Debug)]
pub struct BlockTreeTermsWriter<W: PostingsWriter> {
    terms_out: IndexOutput,
    index_out: IndexOutput,
    postings_writer: W,
    config: BlockTreeConfig,
    header: &'static dyn HeaderCodec,
    max_doc: u32,
    fields: Vec<FieldMetaData>,
}

impl<W: PostingsWriter> BlockTreeTermsWriter<W> {
    /// Create the `.tim` and `.tip` files of `segment` and write their headers.
    pub fn new(
        storage: &dyn Storage,
        segment: &SegmentInfo,
        postings_writer: W,
        config: BlockTreeConfig,
    ) -> Result<Self> {
        Self::with_header(storage, segment, postings_writer, config, &CURRENT_HEADER)
    }

    /// Like [`BlockTreeTermsWriter::new`], writing an older on-disk version.
    pub(crate) fn with_header(
        storage: &dyn Storage,
        segment: &SegmentInfo,
        mut postings_writer: W,
        config: BlockTreeConfig,
        header: &'static dyn HeaderCodec,
    ) -> Result<Self> {
        config.validate()?;

        let terms_name = segment.file_name(TERMS_EXTENSION);
        let mut terms_out = IndexOutput::new(&terms_name, storage.create_output(&terms_name)?);
        header.write_header(&mut terms_out, TERMS_CODEC_NAME)?;

        let index_name = segment.file_name(TERMS_INDEX_EXTENSION);
        let mut index_out = IndexOutput::new(&index_name, storage.create_output(&index_name)?);
        header.write_header(&mut index_out, TERMS_INDEX_CODEC_NAME)?;

        postings_writer.init(&mut terms_out)?;

        debug!(
            "writing terms dictionary {terms_name} (version {}, blocks {}..={})",
            header.version(),
            config.min_items_in_block,
            config.max_items_in_block
        );

        Ok(BlockTreeTermsWriter {
            terms_out,
            index_out,
            postings_writer,
            config,
            header,
            max_doc: segment.doc_count,
            fields: Vec::new(),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &BlockTreeConfig {
        &self.config
    }

    /// Start writing the terms of `field`.
    pub fn add_field(&mut self, field: &FieldInfo) -> Result<TermsWriter<'_, W>> {
        if self.fields.iter().any(|f| f.field.number == field.number) {
            return Err(BlockTreeError::invalid_argument(format!(
                "field {} (number {}) was already written",
                field.name, field.number
            )));
        }
        Ok(TermsWriter::new(self, field.clone()))
    }

    /// Write the field directory and trailers, then close both files.
    pub fn close(mut self) -> Result<()> {
        let dir_start = self.terms_out.position();
        let index_dir_start = self.index_out.position();

        self.terms_out.write_vint(self.fields.len() as u32)?;
        for field in &self.fields {
            let out = &mut self.terms_out;
            out.write_vint(field.field.number)?;
            out.write_vlong(field.num_terms)?;
            out.write_vint(field.root_code.len() as u32)?;
            out.write_bytes(&field.root_code)?;
            if field.field.index_options != IndexOptions::DocsOnly {
                out.write_vlong(field.sum_total_term_freq as u64)?;
            }
            out.write_vlong(field.sum_doc_freq)?;
            out.write_vint(field.doc_count)?;
            if self.header.has_metadata_arity() {
                out.write_vint(field.longs_size as u32)?;
            }
            self.index_out.write_vlong(field.index_start_fp)?;
        }

        self.header
            .write_trailer(&mut self.terms_out, TERMS_CODEC_NAME, dir_start)?;
        self.header
            .write_trailer(&mut self.index_out, TERMS_INDEX_CODEC_NAME, index_dir_start)?;

        debug!(
            "closed terms dictionary {}: {} fields, {} dictionary bytes, {} index bytes",
            self.terms_out.name(),
            self.fields.len(),
            self.terms_out.position(),
            self.index_out.position()
        );

        self.terms_out.close()?;
        self.index_out.close()?;
        self.postings_writer.close()
    }
}

/// Writes the terms of one field.
///
/// Terms must be finished in strictly increasing byte order. Between
/// [`TermsWriter::start_term`] and [`TermsWriter::finish_term`] the caller
/// feeds the term's postings to the postings writer.
#[derive(Debug)]
pub struct TermsWriter<'a, W: PostingsWriter> {
    parent: &'a mut BlockTreeTermsWriter<W>,
    field: FieldInfo,
    longs_size: usize,
    num_terms: u64,
    frontier: Frontier,
    flushes: Vec<Flush>,
    pending: Vec<PendingEntry<W::State>>,
    // Index into pending of the most recently written block.
    last_block_index: Option<usize>,
    arena: Vec<u8>,
    longs: Vec<u64>,
    suffix_writer: Vec<u8>,
    stats_writer: Vec<u8>,
    meta_writer: Vec<u8>,
    bytes_writer: Vec<u8>,
}

impl<'a, W: PostingsWriter> TermsWriter<'a, W> {
    fn new(parent: &'a mut BlockTreeTermsWriter<W>, field: FieldInfo) -> Self {
        let longs_size = parent.postings_writer.set_field(&field);
        let frontier = Frontier::new(parent.config.min_items_in_block);
        TermsWriter {
            parent,
            field,
            longs_size,
            num_terms: 0,
            frontier,
            flushes: Vec::new(),
            pending: Vec::new(),
            last_block_index: None,
            arena: Vec::new(),
            longs: vec![0; longs_size],
            suffix_writer: Vec::new(),
            stats_writer: Vec::new(),
            meta_writer: Vec::new(),
            bytes_writer: Vec::new(),
        }
    }

    /// The field being written.
    pub fn field(&self) -> &FieldInfo {
        &self.field
    }

    /// Number of terms finished so far.
    pub fn num_terms(&self) -> u64 {
        self.num_terms
    }

    /// Begin a term; returns the postings writer to feed its postings to.
    pub fn start_term(&mut self) -> &mut W {
        self.parent.postings_writer.start_term();
        &mut self.parent.postings_writer
    }

    /// Finish a term started with [`TermsWriter::start_term`].
    pub fn finish_term(&mut self, term: &[u8], stats: TermStats) -> Result<()> {
        if stats.doc_freq == 0 {
            return Err(BlockTreeError::invalid_argument(format!(
                "term {:?} has docFreq=0",
                String::from_utf8_lossy(term)
            )));
        }
        let has_freqs = self.field.index_options.has_freqs();
        if has_freqs && stats.total_term_freq < stats.doc_freq as i64 {
            return Err(BlockTreeError::invalid_argument(format!(
                "term {:?}: totalTermFreq={} is less than docFreq={}",
                String::from_utf8_lossy(term),
                stats.total_term_freq,
                stats.doc_freq
            )));
        }

        let common = self.frontier.freeze_for(term, &mut self.flushes)?;
        self.write_flushes()?;
        self.frontier.push(term, common);

        let mut state = BlockTermState::new();
        state.doc_freq = stats.doc_freq;
        state.total_term_freq = if has_freqs { stats.total_term_freq } else { -1 };
        self.parent.postings_writer.finish_term(&mut state)?;

        self.pending.push(PendingEntry::Term(PendingTerm {
            term: term.to_vec(),
            state,
        }));
        self.num_terms += 1;
        Ok(())
    }

    /// Start and finish a term without feeding postings.
    pub fn add_term(&mut self, term: &[u8], stats: TermStats) -> Result<()> {
        self.start_term();
        self.finish_term(term, stats)
    }

    /// Flush the remaining blocks and the field's prefix index.
    ///
    /// A field without terms leaves no trace in either file.
    pub fn finish(mut self, sum_total_term_freq: i64, sum_doc_freq: u64, doc_count: u32) -> Result<()> {
        if self.num_terms == 0 {
            debug!("field {} has no terms; skipped", self.field.name);
            return Ok(());
        }

        self.validate_field_stats(sum_total_term_freq, sum_doc_freq, doc_count)?;

        self.frontier.finish(&mut self.flushes);
        self.write_flushes()?;

        let root = match (self.pending.pop(), self.pending.is_empty()) {
            (Some(PendingEntry::Block(block)), true) if block.prefix.is_empty() => block,
            _ => {
                return Err(BlockTreeError::invalid_operation(
                    "pending entries left after the root block was written",
                ));
            }
        };
        let index = root
            .index
            .as_ref()
            .ok_or_else(|| BlockTreeError::invalid_operation("root block has no index"))?;

        let index_start_fp = self.parent.index_out.position();
        write_index(&mut self.parent.index_out, &self.arena, index)?;

        debug!(
            "finished field {}: {} terms, {} index prefixes, {} index bytes",
            self.field.name,
            self.num_terms,
            index.len(),
            self.parent.index_out.position() - index_start_fp
        );

        let sum_total_term_freq = if self.field.index_options.has_freqs() {
            sum_total_term_freq
        } else {
            -1
        };
        self.parent.fields.push(FieldMetaData {
            field: self.field.clone(),
            root_code: root.code,
            num_terms: self.num_terms,
            index_start_fp,
            sum_total_term_freq,
            sum_doc_freq,
            doc_count,
            longs_size: self.longs_size,
        });
        Ok(())
    }

    fn validate_field_stats(&self, sum_total_term_freq: i64, sum_doc_freq: u64, doc_count: u32) -> Result<()> {
        if doc_count > self.parent.max_doc {
            return Err(BlockTreeError::invalid_argument(format!(
                "field {}: docCount={doc_count} exceeds maxDoc={}",
                self.field.name, self.parent.max_doc
            )));
        }
        if sum_doc_freq < doc_count as u64 {
            return Err(BlockTreeError::invalid_argument(format!(
                "field {}: sumDocFreq={sum_doc_freq} is less than docCount={doc_count}",
                self.field.name
            )));
        }
        if self.field.index_options.has_freqs() && sum_total_term_freq < sum_doc_freq as i64 {
            return Err(BlockTreeError::invalid_argument(format!(
                "field {}: sumTotalTermFreq={sum_total_term_freq} is less than sumDocFreq={sum_doc_freq}",
                self.field.name
            )));
        }
        Ok(())
    }

    fn write_flushes(&mut self) -> Result<()> {
        let mut flushes = std::mem::take(&mut self.flushes);
        for flush in flushes.drain(..) {
            self.write_blocks(flush.prefix_len, flush.count)?;
        }
        self.flushes = flushes;
        Ok(())
    }

    /// Write the top `count` pending entries as one block, or as a primary
    /// block followed by floor blocks when there are too many of them.
    fn write_blocks(&mut self, prefix_len: usize, count: usize) -> Result<()> {
        let prefix = self.frontier.last_term()[..prefix_len].to_vec();

        if prefix_len == 0 || count <= self.parent.config.max_items_in_block {
            let mut block = self.write_block(prefix_len, prefix, count, count, false, None, true)?;
            compile_index(&mut block, &mut [], &mut self.arena)?;
            self.pending.push(PendingEntry::Block(block));
        } else {
            self.write_floor_blocks(prefix_len, prefix, count)?;
        }

        self.last_block_index = Some(self.pending.len() - 1);
        Ok(())
    }

    fn write_floor_blocks(&mut self, prefix_len: usize, prefix: Vec<u8>, count: usize) -> Result<()> {
        let min_items = self.parent.config.min_items_in_block;
        let max_items = self.parent.config.max_items_in_block;

        // Runs of entries sharing the byte after the prefix. The first run is
        // always labeled `None` and holds only the first entry, so the first
        // block of the group keeps the bare prefix.
        let mut sub_labels: Vec<Option<u8>> = Vec::new();
        let mut sub_counts: Vec<usize> = Vec::new();
        let mut last_label: Option<u8> = None;
        let mut run_count = 0;

        for entry in &self.pending[self.pending.len() - count..] {
            let key = entry.key();
            let label = key.get(prefix_len).copied();
            debug_assert!(entry.is_term() || label.is_some());

            if label != last_label && run_count != 0 {
                sub_labels.push(last_label);
                sub_counts.push(run_count);
                last_label = label;
                run_count = 0;
            }
            run_count += 1;
        }
        sub_labels.push(last_label);
        sub_counts.push(run_count);

        let mut pending_count = 0;
        let mut start_label = sub_labels[0];
        let mut cur_start = count;
        let mut first_block: Option<PendingBlock> = None;
        let mut floor_blocks: Vec<PendingBlock> = Vec::new();

        for sub in 0..sub_labels.len() {
            pending_count += sub_counts[sub];
            if pending_count < min_items {
                continue;
            }

            let mut block_prefix = prefix.clone();
            if let Some(label) = start_label {
                block_prefix.push(label);
            }
            let block = self.write_block(
                prefix_len,
                block_prefix,
                cur_start,
                pending_count,
                true,
                start_label,
                cur_start == pending_count,
            )?;
            match first_block {
                None => first_block = Some(block),
                Some(_) => floor_blocks.push(block),
            }

            cur_start -= pending_count;
            pending_count = 0;
            start_label = sub_labels.get(sub + 1).copied().flatten();

            if cur_start == 0 {
                break;
            }

            if cur_start <= max_items {
                // The remainder fits in one block, possibly below the minimum.
                let label = start_label.ok_or_else(|| {
                    BlockTreeError::invalid_operation("floor block without a lead byte")
                })?;
                if cur_start < min_items {
                    warn!(
                        "field {}: last floor block for prefix {:?} has {cur_start} entries (min {min_items})",
                        self.field.name,
                        String::from_utf8_lossy(&prefix)
                    );
                }
                let mut block_prefix = prefix.clone();
                block_prefix.push(label);
                let block = self.write_block(
                    prefix_len,
                    block_prefix,
                    cur_start,
                    cur_start,
                    true,
                    Some(label),
                    true,
                )?;
                floor_blocks.push(block);
                break;
            }
        }

        let mut first_block = first_block
            .ok_or_else(|| BlockTreeError::invalid_operation("floor split produced no block"))?;
        compile_index(&mut first_block, &mut floor_blocks, &mut self.arena)?;
        self.pending.push(PendingEntry::Block(first_block));
        Ok(())
    }

    /// Write `length` pending entries, starting `start_backwards` entries from
    /// the end of the pending list, as one block.
    #[allow(clippy::too_many_arguments)]
    fn write_block(
        &mut self,
        prefix_len: usize,
        index_prefix: Vec<u8>,
        start_backwards: usize,
        length: usize,
        is_floor: bool,
        floor_lead_byte: Option<u8>,
        is_last_in_floor: bool,
    ) -> Result<PendingBlock> {
        debug_assert!(length > 0);
        let start = self.pending.len() - start_backwards;

        let is_leaf = match self.last_block_index {
            None => true,
            Some(idx) if idx < start => true,
            _ if !is_floor => false,
            _ => self.pending[start..start + length].iter().all(|e| e.is_term()),
        };

        let start_fp = self.parent.terms_out.position();
        self.parent
            .terms_out
            .write_vint(((length << 1) | usize::from(is_last_in_floor)) as u32)?;

        let docs_only = self.field.index_options == IndexOptions::DocsOnly;
        let mut sub_indices = Vec::new();
        let mut term_count = 0;
        let mut absolute = true;

        let entries: Vec<PendingEntry<W::State>> = self.pending.drain(start..start + length).collect();
        for entry in entries {
            match entry {
                PendingEntry::Term(term) => {
                    let suffix = &term.term[prefix_len..];
                    if is_leaf {
                        self.suffix_writer.write_vint(suffix.len() as u32)?;
                    } else {
                        self.suffix_writer.write_vint((suffix.len() as u32) << 1)?;
                    }
                    self.suffix_writer.extend_from_slice(suffix);

                    let state = &term.state;
                    self.stats_writer.write_vint(state.doc_freq)?;
                    if !docs_only {
                        debug_assert!(state.total_term_freq >= state.doc_freq as i64);
                        self.stats_writer
                            .write_vlong((state.total_term_freq - state.doc_freq as i64) as u64)?;
                    }

                    self.bytes_writer.clear();
                    self.parent.postings_writer.encode_term(
                        &mut self.longs,
                        &mut self.bytes_writer,
                        &self.field,
                        state,
                        absolute,
                    )?;
                    for &value in &self.longs {
                        self.meta_writer.write_vlong(value)?;
                    }
                    self.meta_writer.extend_from_slice(&self.bytes_writer);
                    absolute = false;
                    term_count += 1;
                }
                PendingEntry::Block(mut block) => {
                    debug_assert!(!is_leaf);
                    let suffix = &block.prefix[prefix_len..];
                    debug_assert!(!suffix.is_empty());
                    debug_assert!(block.fp < start_fp);
                    self.suffix_writer.write_vint(((suffix.len() as u32) << 1) | 1)?;
                    self.suffix_writer.extend_from_slice(suffix);
                    self.suffix_writer.write_vlong(start_fp - block.fp)?;
                    let index = block.index.take().ok_or_else(|| {
                        BlockTreeError::invalid_operation("sub-block was written without an index")
                    })?;
                    sub_indices.push(index);
                }
            }
        }

        let out = &mut self.parent.terms_out;
        out.write_vint(((self.suffix_writer.len() as u32) << 1) | u32::from(is_leaf))?;
        out.write_bytes(&self.suffix_writer)?;
        out.write_vint(self.stats_writer.len() as u32)?;
        out.write_bytes(&self.stats_writer)?;
        out.write_vint(self.meta_writer.len() as u32)?;
        out.write_bytes(&self.meta_writer)?;

        trace!(
            "field {}: block fp={start_fp} prefix={:?} entries={length} leaf={is_leaf} floor={is_floor} suffix_bytes={}",
            self.field.name,
            String::from_utf8_lossy(&index_prefix),
            self.suffix_writer.len()
        );

        self.suffix_writer.clear();
        self.stats_writer.clear();
        self.meta_writer.clear();

        if let Some(idx) = self.last_block_index
            && idx >= start
        {
            self.last_block_index = Some(if idx < start + length { start } else { idx - length });
        }

        Ok(PendingBlock::new(
            index_prefix,
            start_fp,
            term_count != 0,
            is_floor,
            floor_lead_byte,
            sub_indices,
        ))
    }
}
