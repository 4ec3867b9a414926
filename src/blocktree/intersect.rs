//! Enumeration of the terms a [`CompiledAutomaton`] accepts.
//!
//! The intersector walks the block tree depth first and runs the automaton
//! alongside. A sub-block is entered only if the automaton survives its
//! prefix. Floor siblings and trailing entries whose leading byte lies past
//! the automaton's last outgoing transition are skipped without decoding.

use std::fmt;

use log::trace;

use crate::automaton::{CompiledAutomaton, RunAutomaton};
use crate::blocktree::field_reader::FieldReader;
use crate::blocktree::frame::{Frame, TermBuffer};
use crate::blocktree::index::{IndexArc, read_block_pointer};
use crate::blocktree::terms::TermsEnum;
use crate::error::{BlockTreeError, Result};
use crate::postings::{BlockTermState, PostingsReader};
use crate::storage::{BytesReader, IndexInput};

/// A block frame plus the automaton state reached at its prefix.
#[derive(Debug)]
struct IntersectFrame<S> {
    block: Frame<S>,
    state: u32,
    transition_index: usize,
    // Largest byte of the transition being followed; `None` if the state
    // has no outgoing transitions.
    cur_transition_max: Option<u8>,
    arc: IndexArc,
}

impl<S: Default> IntersectFrame<S> {
    fn new(longs_size: usize, arc: IndexArc) -> Self {
        IntersectFrame {
            block: Frame::new(longs_size),
            state: 0,
            transition_index: 0,
            cur_transition_max: None,
            arc,
        }
    }
}

impl<S> IntersectFrame<S> {
    fn set_state(&mut self, automaton: &RunAutomaton, state: u32) {
        self.state = state;
        self.transition_index = 0;
        self.cur_transition_max = automaton.transitions(state).first().map(|t| t.max);
    }

    /// Load the frame's first block, skipping leading floor siblings the
    /// automaton cannot enter.
    fn load(
        &mut self,
        automaton: &RunAutomaton,
        code: &[u8],
        scratch: &mut BytesReader,
        input: &mut IndexInput,
    ) -> Result<()> {
        scratch.reset(code);
        let pointer = read_block_pointer(scratch)?;
        let block = &mut self.block;
        block.is_floor = pointer.is_floor;
        block.has_terms = pointer.has_terms;
        block.has_terms_orig = pointer.has_terms;
        if pointer.is_floor {
            block.set_floor_data(&code[scratch.position()..])?;

            // An accepting state needs the first block for a possible empty suffix.
            let transitions = automaton.transitions(self.state);
            if let Some(first) = transitions.first()
                && !automaton.is_accept(self.state)
            {
                while block.num_follow_floor_blocks != 0 && block.next_floor_label <= u16::from(first.min) {
                    let (fp, _) = block.read_floor_follower()?;
                    block.fp = fp;
                }
            }
        }
        block.read_block(input)
    }

    /// Load the next floor sibling that the current transition can reach.
    fn load_next_floor_block(&mut self, automaton: &RunAutomaton, input: &mut IndexInput) -> Result<()> {
        let transitions = automaton.transitions(self.state);
        let min = transitions.get(self.transition_index).map(|t| u16::from(t.min));
        let block = &mut self.block;
        loop {
            let (fp, _) = block.read_floor_follower()?;
            block.fp = fp;
            let skip_next = block.num_follow_floor_blocks != 0
                && min.is_some_and(|min| block.next_floor_label <= min);
            if !skip_next {
                break;
            }
        }
        block.read_block(input)
    }
}

/// Iterator over the terms of a field accepted by an automaton.
pub struct IntersectCursor<'a, P: PostingsReader> {
    field: &'a FieldReader<P>,
    automaton: &'a CompiledAutomaton,
    input: IndexInput,
    frames: Vec<IntersectFrame<P::State>>,
    current: usize,
    term: TermBuffer,
    scratch: BytesReader,
    positioned: bool,
}

impl<P: PostingsReader> fmt::Debug for IntersectCursor<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntersectCursor")
            .field("field", &self.field.info().name)
            .field("term", &String::from_utf8_lossy(self.term.as_slice()))
            .field("depth", &self.current)
            .field("positioned", &self.positioned)
            .finish()
    }
}

impl<'a, P: PostingsReader> IntersectCursor<'a, P> {
    pub(crate) fn new(
        field: &'a FieldReader<P>,
        automaton: &'a CompiledAutomaton,
        start_term: Option<&[u8]>,
    ) -> Result<Self> {
        let input = field.dict().clone_input()?;
        let arc = field.index().first_arc();
        let mut root = IntersectFrame::new(field.longs_size(), arc);
        root.block.fp = field.root_block_fp();
        root.block.fp_orig = field.root_block_fp();
        root.block.prefix = 0;
        root.set_state(automaton.run_automaton(), automaton.run_automaton().initial());

        let mut cursor = IntersectCursor {
            field,
            automaton,
            input,
            frames: vec![root],
            current: 0,
            term: TermBuffer::default(),
            scratch: BytesReader::new(),
            positioned: false,
        };
        cursor.frames[0].load(
            automaton.run_automaton(),
            field.root_code(),
            &mut cursor.scratch,
            &mut cursor.input,
        )?;

        if let Some(start) = start_term {
            cursor.seek_to_start_term(start)?;
        }
        Ok(cursor)
    }

    /// Copy the current entry of the current frame into the term buffer.
    fn copy_term(&mut self) {
        self.frames[self.current].block.fill_term(&mut self.term);
    }

    /// Enter the sub-block just visited in the current frame.
    fn push_frame(&mut self, state: u32) -> Result<()> {
        let field = self.field;
        let index = field.index();
        let compiled = self.automaton;
        let automaton = compiled.run_automaton();

        let parent = &self.frames[self.current];
        let sub_fp = parent
            .block
            .last_sub_fp
            .ok_or_else(|| BlockTreeError::corrupt("sub-block entry without a file pointer"))?;
        let start = parent.block.prefix;
        let prefix = start + parent.block.suffix_len();

        // Follow the index to the sub-block's prefix for its floor data.
        let mut arc = parent.arc;
        for &label in &self.term.as_slice()[start..prefix] {
            arc = index.find_target_arc(label, &arc).ok_or_else(|| {
                BlockTreeError::corrupt(format!("sub-block fp={sub_fp} has no entry in the terms index"))
            })?;
        }
        if !arc.is_final() {
            return Err(BlockTreeError::corrupt(format!(
                "sub-block fp={sub_fp} prefix is not a block in the terms index"
            )));
        }
        let code = index.code(&arc)?;
        self.scratch.reset(code);
        if read_block_pointer(&mut self.scratch)?.fp != sub_fp {
            return Err(BlockTreeError::corrupt(format!(
                "sub-block fp={sub_fp} disagrees with the terms index"
            )));
        }

        let idx = self.current + 1;
        if self.frames.len() <= idx {
            self.frames.push(IntersectFrame::new(field.longs_size(), arc));
        }
        let frame = &mut self.frames[idx];
        frame.arc = arc;
        frame.block.fp = sub_fp;
        frame.block.fp_orig = sub_fp;
        frame.block.prefix = prefix;
        frame.set_state(automaton, state);
        frame.load(automaton, code, &mut self.scratch, &mut self.input)?;
        self.current = idx;
        Ok(())
    }

    /// Automaton state after the current entry's suffix, if it survives.
    fn entry_state(&self) -> Option<u32> {
        let frame = &self.frames[self.current];
        self.automaton
            .run_automaton()
            .step_all(frame.state, frame.block.suffix())
    }

    fn ends_with_common_suffix(&self, common: &[u8]) -> bool {
        let block = &self.frames[self.current].block;
        let suffix = block.suffix();
        if block.prefix + suffix.len() < common.len() {
            return false;
        }
        if common.len() > suffix.len() {
            // Part of the common suffix lies in the block prefix.
            let in_prefix = common.len() - suffix.len();
            let prefix = self.term.head(block.prefix);
            prefix[block.prefix - in_prefix..] == common[..in_prefix] && suffix == &common[in_prefix..]
        } else {
            suffix.ends_with(common)
        }
    }

    /// Position just before the first term greater than `target`.
    fn seek_to_start_term(&mut self, target: &[u8]) -> Result<()> {
        debug_assert_eq!(self.current, 0);
        loop {
            let mark = self.frames[self.current].block.mark();
            let is_sub_block = self.frames[self.current].block.next_entry()?;
            self.copy_term();
            let prefix_len = self.frames[self.current].block.prefix + self.frames[self.current].block.suffix_len();

            if is_sub_block && target.starts_with(self.term.head(prefix_len)) {
                if let Some(state) = self.entry_state() {
                    self.push_frame(state)?;
                    continue;
                }
            }

            match self.term.as_slice().cmp(target) {
                std::cmp::Ordering::Less => {
                    let compiled = self.automaton;
                    let automaton = compiled.run_automaton();
                    let frame = &mut self.frames[self.current];
                    if frame.block.is_exhausted() {
                        if frame.block.is_last_in_floor {
                            return Ok(());
                        }
                        frame.load_next_floor_block(automaton, &mut self.input)?;
                    }
                }
                std::cmp::Ordering::Equal => return Ok(()),
                std::cmp::Ordering::Greater => {
                    // Step back so the first call to next() visits this entry.
                    let block = &mut self.frames[self.current].block;
                    block.reset_to(mark)?;
                    block.fill_term(&mut self.term);
                    return Ok(());
                }
            }
        }
    }

    fn move_next(&mut self) -> Result<bool> {
        let compiled = self.automaton;
        let automaton = compiled.run_automaton();
        'next_term: loop {
            // Pop finished frames.
            while self.frames[self.current].block.is_exhausted() {
                let frame = &mut self.frames[self.current];
                if !frame.block.is_last_in_floor {
                    frame.load_next_floor_block(automaton, &mut self.input)?;
                } else if self.current == 0 {
                    return Ok(false);
                } else {
                    self.current -= 1;
                }
            }

            let frame = &mut self.frames[self.current];
            let is_sub_block = frame.block.next_entry()?;

            if let Some(&label) = frame.block.suffix().first() {
                let transitions = automaton.transitions(frame.state);
                while frame.cur_transition_max.is_none_or(|max| label > max) {
                    if frame.transition_index + 1 >= transitions.len() {
                        // Past the last transition: nothing further in this floor group can match.
                        frame.block.is_last_in_floor = true;
                        frame.block.next_ent = frame.block.ent_count;
                        continue 'next_term;
                    }
                    frame.transition_index += 1;
                    frame.cur_transition_max = Some(transitions[frame.transition_index].max);
                }
            }

            if !is_sub_block
                && let Some(common) = compiled.common_suffix()
                && !self.ends_with_common_suffix(common)
            {
                continue;
            }

            let Some(state) = self.entry_state() else {
                continue;
            };

            if is_sub_block {
                self.copy_term();
                self.push_frame(state)?;
            } else if automaton.is_accept(state) {
                self.copy_term();
                return Ok(true);
            }
        }
    }

    fn decoded_state(&mut self) -> Result<&BlockTermState<P::State>> {
        if !self.positioned {
            return Err(BlockTreeError::invalid_operation(
                "cursor is not positioned on a term",
            ));
        }
        let field = self.field;
        let block = &mut self.frames[self.current].block;
        block.decode_meta_data(field.postings(), field.info())?;
        Ok(&block.state)
    }
}

impl<P: PostingsReader> TermsEnum for IntersectCursor<'_, P> {
    type State = P::State;

    fn next(&mut self) -> Result<Option<&[u8]>> {
        self.positioned = self.move_next()?;
        if self.positioned {
            trace!(
                "intersect in field {} accepted {:?}",
                self.field.info().name,
                String::from_utf8_lossy(self.term.as_slice())
            );
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
