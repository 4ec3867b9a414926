//! One decoded block on a reader's descent through the dictionary.
//!
//! A frame holds the three blobs of a block (suffixes, stats, metadata), the
//! floor data of its index code, and the cursor state of the entry being
//! visited. Frames are kept in a `Vec` indexed by depth and reused across
//! seeks; their buffers grow and are never shrunk.

use crate::blocktree::index::read_block_pointer;
use crate::blocktree::terms::SeekStatus;
use crate::error::{BlockTreeError, Result};
use crate::postings::{BlockTermState, PostingsReader};
use crate::segment::{FieldInfo, IndexOptions};
use crate::storage::{BytesReader, DataInput, IndexInput};

/// Floor label used once no floor sibling follows.
pub(crate) const NO_FLOOR_LABEL: u16 = 256;

/// A growable term buffer whose bytes past the logical length stay valid.
#[derive(Debug, Default, Clone)]
pub(crate) struct TermBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl TermBuffer {
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Byte at `at`, whether or not it lies inside the logical length.
    pub(crate) fn byte(&self, at: usize) -> u8 {
        self.bytes.get(at).copied().unwrap_or(0)
    }

    /// The first `n` bytes, whether or not they lie inside the logical length.
    pub(crate) fn head(&self, n: usize) -> &[u8] {
        &self.bytes[..n.min(self.bytes.len())]
    }

    pub(crate) fn set_byte(&mut self, at: usize, byte: u8) {
        if self.bytes.len() <= at {
            self.bytes.resize(at + 1, 0);
        }
        self.bytes[at] = byte;
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        if self.bytes.len() < len {
            self.bytes.resize(len, 0);
        }
        self.len = len;
    }

    /// Overwrite everything from `at` on with `src`.
    pub(crate) fn splice(&mut self, at: usize, src: &[u8]) {
        let end = at + src.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[at..end].copy_from_slice(src);
        self.len = end;
    }

    pub(crate) fn copy_from(&mut self, src: &[u8]) {
        self.splice(0, src);
    }
}

/// Saved position of a frame within its loaded block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryMark {
    next_ent: usize,
    reader_pos: usize,
    suffix_start: usize,
    suffix_len: usize,
    last_sub_fp: Option<u64>,
    at_sub_block: bool,
    term_block_ord: usize,
}

/// Result of scanning a block for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scan {
    pub(crate) status: SeekStatus,
    /// False if the scan stopped on a sub-block entry.
    pub(crate) term_exists: bool,
}

#[derive(Debug)]
pub(crate) struct Frame<S> {
    /// File pointer of the block currently loaded.
    pub(crate) fp: u64,
    /// File pointer of the first block of the floor group.
    pub(crate) fp_orig: u64,
    /// File pointer just past the loaded block.
    pub(crate) fp_end: u64,
    /// Length of the prefix shared by every entry.
    pub(crate) prefix: usize,
    pub(crate) has_terms: bool,
    pub(crate) has_terms_orig: bool,
    pub(crate) is_floor: bool,

    pub(crate) loaded: bool,
    pub(crate) ent_count: usize,
    pub(crate) next_ent: usize,
    pub(crate) is_last_in_floor: bool,
    pub(crate) is_leaf: bool,
    /// File pointer of the most recently visited sub-block.
    pub(crate) last_sub_fp: Option<u64>,
    /// Whether the most recently visited entry is a sub-block.
    pub(crate) at_sub_block: bool,

    suffix_len: usize,
    suffix_start: usize,
    suffixes: BytesReader,
    stats: BytesReader,
    meta: BytesReader,

    floor: BytesReader,
    pub(crate) num_follow_floor_blocks: u32,
    pub(crate) next_floor_label: u16,

    pub(crate) meta_data_upto: usize,
    pub(crate) state: BlockTermState<S>,
    longs: Vec<u64>,
}

impl<S: Default> Frame<S> {
    pub(crate) fn new(longs_size: usize) -> Self {
        Frame {
            fp: 0,
            fp_orig: 0,
            fp_end: 0,
            prefix: 0,
            has_terms: false,
            has_terms_orig: false,
            is_floor: false,
            loaded: false,
            ent_count: 0,
            next_ent: 0,
            is_last_in_floor: false,
            is_leaf: false,
            last_sub_fp: None,
            at_sub_block: false,
            suffix_len: 0,
            suffix_start: 0,
            suffixes: BytesReader::new(),
            stats: BytesReader::new(),
            meta: BytesReader::new(),
            floor: BytesReader::new(),
            num_follow_floor_blocks: 0,
            next_floor_label: NO_FLOOR_LABEL,
            meta_data_upto: 0,
            state: BlockTermState::new(),
            longs: vec![0; longs_size],
        }
    }
}

impl<S> Frame<S> {
    /// Take the floor data that follows the block pointer in `code`.
    pub(crate) fn set_floor_data(&mut self, floor: &[u8]) -> Result<()> {
        self.floor.reset(floor);
        self.num_follow_floor_blocks = self.floor.read_vint()?;
        self.next_floor_label = u16::from(self.floor.read_byte()?);
        Ok(())
    }

    /// Set the pointer flags and floor data from an index code.
    pub(crate) fn set_code(&mut self, code: &[u8], scratch: &mut BytesReader) -> Result<u64> {
        scratch.reset(code);
        let pointer = read_block_pointer(scratch)?;
        self.has_terms = pointer.has_terms;
        self.has_terms_orig = pointer.has_terms;
        self.is_floor = pointer.is_floor;
        if pointer.is_floor {
            self.set_floor_data(&code[scratch.position()..])?;
        }
        Ok(pointer.fp)
    }

    /// Read the next floor follower: its file pointer and has-terms flag.
    pub(crate) fn read_floor_follower(&mut self) -> Result<(u64, bool)> {
        if self.num_follow_floor_blocks == 0 {
            return Err(BlockTreeError::corrupt(format!(
                "floor data exhausted for block fp={}",
                self.fp_orig
            )));
        }
        let code = self.floor.read_vlong()?;
        self.num_follow_floor_blocks -= 1;
        self.next_floor_label = if self.num_follow_floor_blocks != 0 {
            u16::from(self.floor.read_byte()?)
        } else {
            NO_FLOOR_LABEL
        };
        Ok((self.fp_orig + (code >> 1), code & 1 != 0))
    }

    /// Go back to the first block of the floor group.
    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.fp = self.fp_orig;
        self.loaded = false;
        self.has_terms = self.has_terms_orig;
        if self.is_floor {
            self.floor.set_position(0)?;
            self.num_follow_floor_blocks = self.floor.read_vint()?;
            self.next_floor_label = u16::from(self.floor.read_byte()?);
        }
        Ok(())
    }

    /// Load the block at `fp` unless it is loaded already.
    pub(crate) fn load_block(&mut self, input: &mut IndexInput) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        self.read_block(input)
    }

    /// Move on to the next floor sibling, which directly follows this block.
    pub(crate) fn load_next_floor_block(&mut self, input: &mut IndexInput) -> Result<()> {
        self.fp = self.fp_end;
        self.read_block(input)
    }

    /// Read the block at `fp`.
    pub(crate) fn read_block(&mut self, input: &mut IndexInput) -> Result<()> {
        input.seek(self.fp)?;

        let code = input.read_vint()?;
        self.ent_count = (code >> 1) as usize;
        if self.ent_count == 0 {
            return Err(BlockTreeError::corrupt(format!(
                "empty block at fp={} (resource={})",
                self.fp,
                input.name()
            )));
        }
        self.is_last_in_floor = code & 1 != 0;

        let code = input.read_vint()?;
        self.is_leaf = code & 1 != 0;
        self.suffixes.fill_from(input, (code >> 1) as usize)?;

        let num_bytes = input.read_vint()? as usize;
        self.stats.fill_from(input, num_bytes)?;

        let num_bytes = input.read_vint()? as usize;
        self.meta.fill_from(input, num_bytes)?;

        self.meta_data_upto = 0;
        self.state.term_block_ord = 0;
        self.next_ent = 0;
        self.suffix_start = 0;
        self.suffix_len = 0;
        self.last_sub_fp = None;
        self.at_sub_block = false;
        self.fp_end = input.position();
        self.loaded = true;
        Ok(())
    }

    /// Suffix bytes of the current entry.
    pub(crate) fn suffix(&self) -> &[u8] {
        &self.suffixes.as_slice()[self.suffix_start..self.suffix_start + self.suffix_len]
    }

    pub(crate) fn suffix_len(&self) -> usize {
        self.suffix_len
    }

    /// Returns true once every entry of the loaded block was visited.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.next_ent == self.ent_count
    }

    /// Number of terms visited so far in the loaded block.
    pub(crate) fn term_block_ord(&self) -> usize {
        if self.is_leaf {
            self.next_ent
        } else {
            self.state.term_block_ord
        }
    }

    fn read_suffix(&mut self, len: usize) -> Result<()> {
        self.suffix_len = len;
        self.suffix_start = self.suffixes.position();
        self.suffixes.skip(len)
    }

    fn read_sub_block_pointer(&mut self) -> Result<u64> {
        let delta = self.suffixes.read_vlong()?;
        let sub_fp = self.fp.checked_sub(delta).ok_or_else(|| {
            BlockTreeError::corrupt(format!("sub-block delta {delta} exceeds block fp={}", self.fp))
        })?;
        self.last_sub_fp = Some(sub_fp);
        Ok(sub_fp)
    }

    /// Decode the next entry; returns true if it is a sub-block.
    pub(crate) fn next_entry(&mut self) -> Result<bool> {
        debug_assert!(self.loaded && self.next_ent < self.ent_count);
        self.next_ent += 1;
        if self.is_leaf {
            let len = self.suffixes.read_vint()? as usize;
            self.read_suffix(len)?;
            self.at_sub_block = false;
            return Ok(false);
        }

        let code = self.suffixes.read_vint()?;
        self.read_suffix((code >> 1) as usize)?;
        if code & 1 == 0 {
            self.state.term_block_ord += 1;
            self.at_sub_block = false;
            Ok(false)
        } else {
            self.read_sub_block_pointer()?;
            self.at_sub_block = true;
            Ok(true)
        }
    }

    pub(crate) fn mark(&self) -> EntryMark {
        EntryMark {
            next_ent: self.next_ent,
            reader_pos: self.suffixes.position(),
            suffix_start: self.suffix_start,
            suffix_len: self.suffix_len,
            last_sub_fp: self.last_sub_fp,
            at_sub_block: self.at_sub_block,
            term_block_ord: self.state.term_block_ord,
        }
    }

    /// Step back to a position taken with [`Frame::mark`] in the same block.
    pub(crate) fn reset_to(&mut self, mark: EntryMark) -> Result<()> {
        self.suffixes.set_position(mark.reader_pos)?;
        self.next_ent = mark.next_ent;
        self.suffix_start = mark.suffix_start;
        self.suffix_len = mark.suffix_len;
        self.last_sub_fp = mark.last_sub_fp;
        self.at_sub_block = mark.at_sub_block;
        self.state.term_block_ord = mark.term_block_ord;
        Ok(())
    }

    /// Skip entries until the one pointing at `sub_fp`.
    pub(crate) fn scan_to_sub_block(&mut self, sub_fp: u64) -> Result<()> {
        debug_assert!(!self.is_leaf);
        if self.last_sub_fp == Some(sub_fp) {
            return Ok(());
        }
        while self.next_ent < self.ent_count {
            if self.next_entry()? && self.last_sub_fp == Some(sub_fp) {
                return Ok(());
            }
        }
        Err(BlockTreeError::corrupt(format!(
            "sub-block fp={sub_fp} not referenced from block fp={}",
            self.fp
        )))
    }

    /// Among the floor siblings, select the one that may contain `target`.
    pub(crate) fn scan_to_floor_frame(&mut self, target: &[u8]) -> Result<()> {
        if !self.is_floor || target.len() <= self.prefix {
            return Ok(());
        }
        let target_label = u16::from(target[self.prefix]);
        if target_label < self.next_floor_label {
            return Ok(());
        }

        let mut new_fp;
        loop {
            let (fp, has_terms) = self.read_floor_follower()?;
            new_fp = fp;
            self.has_terms = has_terms;
            self.is_last_in_floor = self.num_follow_floor_blocks == 0;
            if self.is_last_in_floor || target_label < self.next_floor_label {
                break;
            }
        }

        if new_fp != self.fp {
            self.loaded = false;
            self.fp = new_fp;
        }
        Ok(())
    }

    /// Copy the current entry's full bytes into `term`.
    pub(crate) fn fill_term(&self, term: &mut TermBuffer) {
        term.splice(self.prefix, self.suffix());
    }

    /// Scan the loaded block for the first entry >= `target`.
    ///
    /// `target[..prefix]` must equal this block's prefix. With `exact_only`,
    /// `term` is left holding the last entry visited even when the scan runs
    /// off the block.
    pub(crate) fn scan_to_term(&mut self, target: &[u8], exact_only: bool, term: &mut TermBuffer) -> Result<Scan> {
        if self.next_ent == self.ent_count {
            if exact_only {
                self.fill_term(term);
            }
            return Ok(Scan {
                status: SeekStatus::End,
                term_exists: !self.at_sub_block,
            });
        }

        let target_suffix = &target[self.prefix.min(target.len())..];
        loop {
            let is_sub_block = self.next_entry()?;
            // A sub-block whose prefix equals the target only holds larger terms.
            let cmp = match self.suffix().cmp(target_suffix) {
                std::cmp::Ordering::Equal if is_sub_block => std::cmp::Ordering::Greater,
                cmp => cmp,
            };

            match cmp {
                std::cmp::Ordering::Less => {
                    if self.next_ent == self.ent_count {
                        if exact_only {
                            self.fill_term(term);
                        }
                        return Ok(Scan {
                            status: SeekStatus::End,
                            term_exists: !is_sub_block,
                        });
                    }
                }
                std::cmp::Ordering::Greater => {
                    self.fill_term(term);
                    return Ok(Scan {
                        status: SeekStatus::NotFound,
                        term_exists: !is_sub_block,
                    });
                }
                std::cmp::Ordering::Equal => {
                    self.fill_term(term);
                    return Ok(Scan {
                        status: SeekStatus::Found,
                        term_exists: true,
                    });
                }
            }
        }
    }

    /// Decode term metadata up to the current term.
    pub(crate) fn decode_meta_data<P>(&mut self, postings: &P, field: &FieldInfo) -> Result<()>
    where
        P: PostingsReader<State = S> + ?Sized,
    {
        let limit = self.term_block_ord();
        debug_assert!(limit > 0);
        let mut absolute = self.meta_data_upto == 0;

        while self.meta_data_upto < limit {
            self.state.doc_freq = self.stats.read_vint()?;
            self.state.total_term_freq = if field.index_options == IndexOptions::DocsOnly {
                -1
            } else {
                self.state.doc_freq as i64 + self.stats.read_vlong()? as i64
            };
            for long in self.longs.iter_mut() {
                *long = self.meta.read_vlong()?;
            }
            postings.decode_term(&self.longs, &mut self.meta, field, &mut self.state, absolute)?;
            self.meta_data_upto += 1;
            absolute = false;
        }

        self.state.term_block_ord = self.meta_data_upto;
        self.state.block_file_pointer = self.fp;
        Ok(())
    }

    /// Bytes held by the suffix and stats blobs of the loaded block.
    pub(crate) fn blob_lengths(&self) -> (usize, usize) {
        (self.suffixes.len(), self.stats.len())
    }
}
