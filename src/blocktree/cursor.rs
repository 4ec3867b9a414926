//! Seekable cursor over the terms of one field.
//!
//! The cursor keeps a stack of [`Frame`]s, one per block on the path from the
//! root to the current term, and the prefix-index arcs followed to reach
//! them. A seek reuses every frame and arc that is still valid for the prefix
//! the target shares with the current term, then walks the index for the
//! rest and scans the block it lands in.
//!
//! Frame `0` is a placeholder used before the first positioning and after a
//! seek by saved state; the root block lives in frame `1`.

use std::cmp::Ordering;
use std::fmt;

use log::trace;

use crate::blocktree::field_reader::FieldReader;
use crate::blocktree::frame::{Frame, TermBuffer};
use crate::blocktree::index::IndexArc;
use crate::blocktree::stats::Stats;
use crate::blocktree::terms::{SeekStatus, SeekTermsEnum, TermsEnum};
use crate::error::{BlockTreeError, Result};
use crate::postings::{BlockTermState, PostingsReader};
use crate::storage::{BytesReader, IndexInput};

/// A cursor over every term of a field.
pub struct TermCursor<'a, P: PostingsReader> {
    field: &'a FieldReader<P>,
    // Cloned from the field's dictionary input on first block load.
    input: Option<IndexInput>,
    frames: Vec<Frame<P::State>>,
    current: usize,
    arcs: Vec<IndexArc>,
    scratch: BytesReader,
    term: TermBuffer,
    term_exists: bool,
    target_before_current_length: isize,
    valid_index_prefix: usize,
    // Target of a failed seek_exact; the next call to next() seeks past it.
    pending_seek: Option<Vec<u8>>,
    eof: bool,
}

impl<P: PostingsReader> fmt::Debug for TermCursor<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermCursor")
            .field("field", &self.field.info().name)
            .field("term", &String::from_utf8_lossy(self.term.as_slice()))
            .field("term_exists", &self.term_exists)
            .field("depth", &self.current)
            .field("eof", &self.eof)
            .finish()
    }
}

impl<'a, P: PostingsReader> TermCursor<'a, P> {
    pub(crate) fn new(field: &'a FieldReader<P>) -> Self {
        TermCursor {
            field,
            input: None,
            frames: vec![Frame::new(field.longs_size())],
            current: 0,
            arcs: vec![field.index().first_arc()],
            scratch: BytesReader::new(),
            term: TermBuffer::default(),
            term_exists: false,
            target_before_current_length: 0,
            valid_index_prefix: 0,
            pending_seek: None,
            eof: false,
        }
    }

    fn ensure_frame(&mut self, idx: usize) {
        while self.frames.len() <= idx {
            self.frames.push(Frame::new(self.field.longs_size()));
        }
    }

    fn set_arc(&mut self, ord: usize, arc: IndexArc) {
        if self.arcs.len() <= ord {
            self.arcs.resize(ord + 1, arc);
        }
        self.arcs[ord] = arc;
    }

    /// Run a block operation on frame `idx` with the dictionary input.
    fn frame_io<F>(&mut self, idx: usize, op: F) -> Result<()>
    where
        F: FnOnce(&mut Frame<P::State>, &mut IndexInput) -> Result<()>,
    {
        if self.input.is_none() {
            self.input = Some(self.field.dict().clone_input()?);
        }
        match self.input.as_mut() {
            Some(input) => op(&mut self.frames[idx], input),
            None => Err(BlockTreeError::invalid_operation("dictionary input is not open")),
        }
    }

    /// Push the block whose index code is `code`, for a prefix of `length` bytes.
    fn push_frame_code(&mut self, code: &[u8], length: usize) -> Result<usize> {
        let idx = self.current + 1;
        self.ensure_frame(idx);
        let fp = self.frames[idx].set_code(code, &mut self.scratch)?;
        self.push_frame_fp(fp, length)
    }

    fn push_frame_fp(&mut self, fp: u64, length: usize) -> Result<usize> {
        let idx = self.current + 1;
        self.ensure_frame(idx);
        let target_before = self.target_before_current_length;
        let frame = &mut self.frames[idx];

        if frame.fp_orig == fp && frame.loaded {
            // Same block as last time: keep its position unless the new
            // target may lie before it.
            if (idx as isize - 1) > target_before {
                frame.rewind()?;
            }
        } else {
            frame.loaded = false;
            frame.prefix = length;
            frame.state.term_block_ord = 0;
            frame.fp_orig = fp;
            frame.fp = fp;
            frame.last_sub_fp = None;
        }
        Ok(idx)
    }

    /// Descend into the sub-block the current frame just visited.
    fn push_sub_block(&mut self) -> Result<()> {
        let sub_fp = self.frames[self.current]
            .last_sub_fp
            .ok_or_else(|| BlockTreeError::corrupt("sub-block entry without a file pointer"))?;
        let length = self.term.len();
        self.current = self.push_frame_fp(sub_fp, length)?;

        // Reached without the index: no floor data, and terms are possible.
        let frame = &mut self.frames[self.current];
        frame.is_floor = false;
        frame.has_terms = true;
        frame.has_terms_orig = true;
        self.frame_io(self.current, Frame::load_block)
    }

    /// Decode the next entry of the current frame into the term buffer.
    fn next_in_frame(&mut self) -> Result<bool> {
        let frame = &mut self.frames[self.current];
        let is_sub_block = frame.next_entry()?;
        frame.fill_term(&mut self.term);
        self.term_exists = !is_sub_block;
        Ok(is_sub_block)
    }

    /// Reposition the frame stack for a seek to `target`.
    ///
    /// Returns `None` if the cursor already sits on `target`, otherwise the
    /// arc and target length the index walk resumes from.
    fn prepare_seek(&mut self, target: &[u8]) -> Result<Option<(IndexArc, usize)>> {
        self.pending_seek = None;
        self.eof = false;
        self.target_before_current_length = self.current as isize - 1;

        if self.current == 0 {
            let field = self.field;
            let index = field.index();
            self.target_before_current_length = -1;
            let arc = index.first_arc();
            self.set_arc(0, arc);
            self.current = self.push_frame_code(index.code(&arc)?, 0)?;
            return Ok(Some((arc, 0)));
        }

        let mut arc = self.arcs[0];
        let mut target_upto = 0;
        let mut last_frame = 1;
        let target_limit = target.len().min(self.valid_index_prefix);
        let mut cmp = Ordering::Equal;

        // Walk the arcs that are still valid for the current term.
        while target_upto < target_limit {
            cmp = self.term.byte(target_upto).cmp(&target[target_upto]);
            if cmp != Ordering::Equal {
                break;
            }
            arc = self.arcs[1 + target_upto];
            if arc.is_final() {
                last_frame += 1;
            }
            target_upto += 1;
        }

        if cmp == Ordering::Equal {
            let limit = target.len().min(self.term.len());
            let mut upto = target_upto;
            while upto < limit {
                cmp = self.term.byte(upto).cmp(&target[upto]);
                if cmp != Ordering::Equal {
                    break;
                }
                upto += 1;
            }
            if cmp == Ordering::Equal {
                cmp = self.term.len().cmp(&target.len());
            }
        }

        match cmp {
            Ordering::Less => self.current = last_frame,
            Ordering::Greater => {
                // Seeking backwards: the frame must restart from its first block.
                self.target_before_current_length = last_frame as isize - 1;
                self.current = last_frame;
                self.frames[last_frame].rewind()?;
            }
            Ordering::Equal if self.term_exists => return Ok(None),
            Ordering::Equal => {}
        }
        Ok(Some((arc, target_upto)))
    }

    /// Follow the index along `target`, pushing a frame at each block prefix.
    ///
    /// Returns how many target bytes were consumed.
    fn walk_index(&mut self, target: &[u8], mut arc: IndexArc, mut target_upto: usize) -> Result<usize> {
        let field = self.field;
        let index = field.index();
        while target_upto < target.len() {
            let label = target[target_upto];
            let Some(next) = index.find_target_arc(label, &arc) else {
                break;
            };
            arc = next;
            self.term.set_byte(target_upto, label);
            self.set_arc(1 + target_upto, arc);
            target_upto += 1;
            if arc.is_final() {
                self.current = self.push_frame_code(index.code(&arc)?, target_upto)?;
            }
        }
        Ok(target_upto)
    }

    /// Scan the current frame for `target`, descending to the first term of
    /// a sub-block when the scan stops on one.
    fn scan_current(&mut self, target: &[u8], exact_only: bool) -> Result<SeekStatus> {
        let scan = self.frames[self.current].scan_to_term(target, exact_only, &mut self.term)?;
        self.term_exists = scan.term_exists;

        if scan.status == SeekStatus::NotFound && !exact_only && !scan.term_exists {
            self.push_sub_block()?;
            while self.next_in_frame()? {
                self.push_sub_block()?;
            }
        }
        Ok(scan.status)
    }

    fn seek_exact_inner(&mut self, target: &[u8]) -> Result<bool> {
        let Some((arc, target_upto)) = self.prepare_seek(target)? else {
            return Ok(true);
        };
        let target_upto = self.walk_index(target, arc, target_upto)?;

        let cur = self.current;
        self.valid_index_prefix = self.frames[cur].prefix;
        self.frames[cur].scan_to_floor_frame(target)?;

        if !self.frames[cur].has_terms {
            // The block holds only sub-blocks, none of them on the target's path.
            self.term_exists = false;
            if target_upto < target.len() {
                self.term.set_byte(target_upto, target[target_upto]);
                self.term.set_len(target_upto + 1);
            } else {
                self.term.set_len(target_upto);
            }
            return Ok(false);
        }

        self.frame_io(cur, Frame::load_block)?;
        Ok(self.scan_current(target, true)? == SeekStatus::Found)
    }

    fn seek_ceil_inner(&mut self, target: &[u8]) -> Result<SeekStatus> {
        let Some((arc, target_upto)) = self.prepare_seek(target)? else {
            return Ok(SeekStatus::Found);
        };
        self.walk_index(target, arc, target_upto)?;

        let cur = self.current;
        self.valid_index_prefix = self.frames[cur].prefix;
        self.frames[cur].scan_to_floor_frame(target)?;
        self.frame_io(cur, Frame::load_block)?;

        let status = self.scan_current(target, false)?;
        if status != SeekStatus::End {
            return Ok(status);
        }

        // Every term of this block is smaller; the answer is in a later block.
        self.term.copy_from(target);
        self.term_exists = false;
        if self.advance()? {
            Ok(SeekStatus::NotFound)
        } else {
            Ok(SeekStatus::End)
        }
    }

    fn move_next(&mut self) -> Result<bool> {
        if let Some(target) = self.pending_seek.take() {
            return Ok(self.seek_ceil_inner(&target)? != SeekStatus::End);
        }
        if self.eof {
            return Ok(false);
        }

        if self.current == 0 {
            if self.term_exists {
                // Positioned by saved state: locate the term in its block first.
                let target = self.term.as_slice().to_vec();
                match self.seek_ceil_inner(&target)? {
                    SeekStatus::Found => {}
                    SeekStatus::NotFound => return Ok(true),
                    SeekStatus::End => return Ok(false),
                }
            } else {
                let field = self.field;
                self.target_before_current_length = -1;
                self.set_arc(0, field.index().first_arc());
                self.current = self.push_frame_code(field.root_code(), 0)?;
                self.frame_io(self.current, Frame::load_block)?;
            }
        }

        self.advance()
    }

    /// Step to the next term from a positioned stack.
    fn advance(&mut self) -> Result<bool> {
        if !self.frames[self.current].loaded {
            self.frame_io(self.current, Frame::load_block)?;
        }
        self.target_before_current_length = self.current as isize - 1;

        while self.frames[self.current].is_exhausted() {
            let cur = self.current;
            if !self.frames[cur].is_last_in_floor {
                self.frame_io(cur, Frame::load_next_floor_block)?;
                continue;
            }
            if cur == 1 {
                self.term.set_len(0);
                self.valid_index_prefix = 0;
                self.frames[1].rewind()?;
                self.term_exists = false;
                self.eof = true;
                return Ok(false);
            }

            let last_fp = self.frames[cur].fp_orig;
            self.current = cur - 1;
            let parent = self.current;
            if !self.frames[parent].loaded || self.frames[parent].last_sub_fp != Some(last_fp) {
                // The parent was left elsewhere by a seek; find the sub-block again.
                self.frames[parent].scan_to_floor_frame(self.term.as_slice())?;
                self.frame_io(parent, Frame::load_block)?;
                self.frames[parent].scan_to_sub_block(last_fp)?;
            }
            self.valid_index_prefix = self.valid_index_prefix.min(self.frames[parent].prefix);
        }

        while self.next_in_frame()? {
            self.push_sub_block()?;
        }
        Ok(true)
    }

    fn decoded_state(&mut self) -> Result<&BlockTermState<P::State>> {
        if self.eof || !self.term_exists || self.pending_seek.is_some() {
            return Err(BlockTreeError::invalid_operation(
                "cursor is not positioned on a term",
            ));
        }
        let field = self.field;
        let cur = self.current;
        if cur != 0 {
            self.frames[cur].decode_meta_data(field.postings(), field.info())?;
        }
        Ok(&self.frames[cur].state)
    }

    /// Walk every block of the field and gather [`Stats`].
    pub(crate) fn compute_block_stats(mut self) -> Result<Stats> {
        let field = self.field;
        let index = field.index();
        let mut stats = Stats::new(field.segment(), &field.info().name);
        let (nodes, arcs) = index.node_and_arc_counts();
        stats.index_node_count = nodes as u64;
        stats.index_arc_count = arcs as u64;
        stats.index_num_bytes = index.size_in_bytes() as u64;

        self.target_before_current_length = -1;
        self.current = self.push_frame_code(field.root_code(), 0)?;
        self.frame_io(self.current, Frame::load_block)?;
        let is_floor = !self.frames[self.current].is_last_in_floor;
        stats.start_block(&self.frames[self.current], is_floor);

        'blocks: loop {
            while self.frames[self.current].is_exhausted() {
                let cur = self.current;
                stats.end_block(&self.frames[cur])?;
                if !self.frames[cur].is_last_in_floor {
                    self.frame_io(cur, Frame::load_next_floor_block)?;
                    stats.start_block(&self.frames[cur], true);
                } else if cur == 1 {
                    break 'blocks;
                } else {
                    self.current = cur - 1;
                }
            }

            while self.next_in_frame()? {
                self.push_sub_block()?;
                let is_floor = !self.frames[self.current].is_last_in_floor;
                stats.start_block(&self.frames[self.current], is_floor);
            }
            stats.term(self.term.as_slice());
        }

        stats.finish()?;
        trace!("computed block stats for field {}", field.info().name);
        Ok(stats)
    }
}

impl<P: PostingsReader> TermsEnum for TermCursor<'_, P> {
    type State = P::State;

    fn next(&mut self) -> Result<Option<&[u8]>> {
        if self.move_next()? {
            Ok(Some(self.term.as_slice()))
        } else {
            Ok(None)
        }
    }

    fn term(&self) -> &[u8] {
        self.term.as_slice()
    }

    fn doc_freq(&mut self) -> Result<u32> {
        Ok(self.decoded_state()?.doc_freq)
    }

    fn total_term_freq(&mut self) -> Result<i64> {
        Ok(self.decoded_state()?.total_term_freq)
    }

    fn term_state(&mut self) -> Result<BlockTermState<P::State>> {
        Ok(self.decoded_state()?.clone())
    }
}

impl<P: PostingsReader> SeekTermsEnum for TermCursor<'_, P> {
    fn seek_exact(&mut self, target: &[u8]) -> Result<bool> {
        let found = self.seek_exact_inner(target)?;
        if !found {
            self.pending_seek = Some(target.to_vec());
        }
        trace!(
            "seek_exact {:?} in field {}: {found}",
            String::from_utf8_lossy(target),
            self.field.info().name
        );
        Ok(found)
    }

    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus> {
        let status = self.seek_ceil_inner(target)?;
        trace!(
            "seek_ceil {:?} in field {}: {status:?}",
            String::from_utf8_lossy(target),
            self.field.info().name
        );
        Ok(status)
    }

    fn seek_exact_with_state(&mut self, target: &[u8], state: &BlockTermState<P::State>) {
        let already_there = self.term_exists
            && !self.eof
            && self.pending_seek.is_none()
            && self.term.as_slice() == target;
        if !already_there {
            self.current = 0;
            self.frames[0].state = state.clone();
            self.term.copy_from(target);
            self.valid_index_prefix = 0;
        }
        self.term_exists = true;
        self.eof = false;
        self.pending_seek = None;
    }
}
