//! Block statistics of one field, gathered by walking every block.

use std::fmt;

use serde::Serialize;

use crate::blocktree::frame::Frame;
use crate::error::{BlockTreeError, Result};

/// Shape of a field's block tree: how many blocks of each kind, how terms
/// are spread over them, and where the bytes go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Segment the field belongs to.
    pub segment: String,
    /// Field name.
    pub field: String,

    /// Nodes in the prefix index FST.
    pub index_node_count: u64,
    /// Arcs in the prefix index FST.
    pub index_arc_count: u64,
    /// Bytes held by the prefix index.
    pub index_num_bytes: u64,

    /// Number of terms.
    pub total_term_count: u64,
    /// Sum of the lengths of all terms.
    pub total_term_bytes: u64,

    /// Blocks that are not part of a floor group.
    pub non_floor_block_count: u64,
    /// Floor groups; each counts once however many blocks it has.
    pub floor_block_count: u64,
    /// Blocks inside floor groups.
    pub floor_sub_block_count: u64,
    /// Blocks holding both terms and sub-blocks.
    pub mixed_block_count: u64,
    /// Blocks holding only terms.
    pub terms_only_block_count: u64,
    /// Blocks holding only sub-blocks.
    pub sub_blocks_only_block_count: u64,
    /// All blocks.
    pub total_block_count: u64,

    /// Number of blocks per prefix length.
    pub block_count_by_prefix_len: Vec<u64>,

    /// Bytes of the suffix blobs.
    pub total_block_suffix_bytes: u64,
    /// Bytes of the stats blobs.
    pub total_block_stats_bytes: u64,
    /// Block bytes outside the suffix and stats blobs.
    pub total_block_other_bytes: u64,

    #[serde(skip)]
    start_block_count: u64,
    #[serde(skip)]
    end_block_count: u64,
}

impl Stats {
    pub(crate) fn new(segment: &str, field: &str) -> Self {
        Stats {
            segment: segment.to_string(),
            field: field.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn start_block<S>(&mut self, frame: &Frame<S>, is_floor: bool) {
        self.total_block_count += 1;
        if is_floor {
            if frame.fp == frame.fp_orig {
                self.floor_block_count += 1;
            }
            self.floor_sub_block_count += 1;
        } else {
            self.non_floor_block_count += 1;
        }

        if self.block_count_by_prefix_len.len() <= frame.prefix {
            self.block_count_by_prefix_len.resize(frame.prefix + 1, 0);
        }
        self.block_count_by_prefix_len[frame.prefix] += 1;
        self.start_block_count += 1;

        let (suffix_bytes, stats_bytes) = frame.blob_lengths();
        self.total_block_suffix_bytes += suffix_bytes as u64;
        self.total_block_stats_bytes += stats_bytes as u64;
    }

    pub(crate) fn end_block<S>(&mut self, frame: &Frame<S>) -> Result<()> {
        let term_count = frame.term_block_ord();
        let sub_block_count = frame.ent_count - term_count;
        self.total_term_count += term_count as u64;
        match (term_count != 0, sub_block_count != 0) {
            (true, true) => self.mixed_block_count += 1,
            (true, false) => self.terms_only_block_count += 1,
            (false, true) => self.sub_blocks_only_block_count += 1,
            (false, false) => {
                return Err(BlockTreeError::corrupt(format!(
                    "block fp={} holds neither terms nor sub-blocks",
                    frame.fp
                )));
            }
        }
        self.end_block_count += 1;

        let (suffix_bytes, stats_bytes) = frame.blob_lengths();
        let other_bytes = (frame.fp_end - frame.fp)
            .checked_sub((suffix_bytes + stats_bytes) as u64)
            .ok_or_else(|| BlockTreeError::corrupt(format!("block fp={} is shorter than its blobs", frame.fp)))?;
        self.total_block_other_bytes += other_bytes;
        Ok(())
    }

    /// Render the public counters as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub(crate) fn term(&mut self, term: &[u8]) {
        self.total_term_bytes += term.len() as u64;
    }

    pub(crate) fn finish(&self) -> Result<()> {
        debug_assert_eq!(self.start_block_count, self.end_block_count);
        debug_assert_eq!(
            self.total_block_count,
            self.floor_sub_block_count + self.non_floor_block_count
        );
        debug_assert_eq!(
            self.total_block_count,
            self.mixed_block_count + self.terms_only_block_count + self.sub_blocks_only_block_count
        );
        if self.start_block_count != self.end_block_count {
            return Err(BlockTreeError::corrupt(format!(
                "field {}: {} blocks started but {} ended",
                self.field, self.start_block_count, self.end_block_count
            )));
        }
        Ok(())
    }
}

/// Formats ` (avg unit)`, or nothing when `count` is zero.
fn average(total: u64, count: u64, unit: &str) -> String {
    if count == 0 {
        String::new()
    } else {
        format!(" ({:.1} {unit})", total as f64 / count as f64)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  BlockTree stats for segment={} field={}:", self.segment, self.field)?;
        writeln!(f, "    index FST:")?;
        writeln!(f, "      {} nodes", self.index_node_count)?;
        writeln!(f, "      {} arcs", self.index_arc_count)?;
        writeln!(f, "      {} bytes", self.index_num_bytes)?;
        writeln!(f, "    terms:")?;
        writeln!(f, "      {} terms", self.total_term_count)?;
        writeln!(
            f,
            "      {} bytes{}",
            self.total_term_bytes,
            average(self.total_term_bytes, self.total_term_count, "bytes/term")
        )?;
        writeln!(f, "    blocks:")?;
        writeln!(f, "      {} blocks", self.total_block_count)?;
        writeln!(f, "      {} terms-only blocks", self.terms_only_block_count)?;
        writeln!(f, "      {} sub-block-only blocks", self.sub_blocks_only_block_count)?;
        writeln!(f, "      {} mixed blocks", self.mixed_block_count)?;
        writeln!(f, "      {} floor blocks", self.floor_block_count)?;
        writeln!(f, "      {} non-floor blocks", self.non_floor_block_count)?;
        writeln!(f, "      {} floor sub-blocks", self.floor_sub_block_count)?;
        writeln!(
            f,
            "      {} term suffix bytes{}",
            self.total_block_suffix_bytes,
            average(self.total_block_suffix_bytes, self.total_block_count, "suffix-bytes/block")
        )?;
        writeln!(
            f,
            "      {} term stats bytes{}",
            self.total_block_stats_bytes,
            average(self.total_block_stats_bytes, self.total_block_count, "stats-bytes/block")
        )?;
        writeln!(
            f,
            "      {} other bytes{}",
            self.total_block_other_bytes,
            average(self.total_block_other_bytes, self.total_block_count, "other-bytes/block")
        )?;
        if self.total_block_count != 0 {
            writeln!(f, "      by prefix length:")?;
            for (prefix, &count) in self.block_count_by_prefix_len.iter().enumerate() {
                if count != 0 {
                    writeln!(f, "        {prefix:2}: {count}")?;
                }
            }
        }
        Ok(())
    }
}
