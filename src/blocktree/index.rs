//! The per-field prefix index.
//!
//! Each field's index is an FST from block prefix to the position of that
//! block's *code* in a side arena. A code is the encoded block pointer:
//!
//! ```text
//! code   := vlong(fp << 2 | hasTerms << 1 | isFloor) [floor]
//! floor  := vint(numFollowers) { byte(leadByte) vlong((fp' - fp) << 1 | hasTerms) }*
//! ```
//!
//! The arena stores each code as `vint(len) bytes`. On disk a field's index
//! is `vlong(arenaLen) arena vlong(fstLen) fst` at the field's index start
//! pointer.

use ahash::AHashSet;
use fst::raw::{CompiledAddr, Fst};
use fst::{IntoStreamer, MapBuilder, Streamer};

use crate::blocktree::pending::PendingBlock;
use crate::error::{BlockTreeError, Result};
use crate::storage::{BytesReader, DataInput, DataOutput, IndexInput, IndexOutput};
use crate::util::varint;

/// The block holds at least one term (not only sub-blocks).
pub const OUTPUT_FLAG_HAS_TERMS: u64 = 0x2;

/// The block is the first of a floor group.
pub const OUTPUT_FLAG_IS_FLOOR: u64 = 0x1;

/// Number of flag bits below the file pointer in an encoded output.
pub const OUTPUT_FLAGS_NUM_BITS: u32 = 2;

/// Pack a block file pointer and its flags.
pub fn encode_output(fp: u64, has_terms: bool, is_floor: bool) -> u64 {
    debug_assert!(fp < (1 << 62));
    (fp << OUTPUT_FLAGS_NUM_BITS)
        | if has_terms { OUTPUT_FLAG_HAS_TERMS } else { 0 }
        | if is_floor { OUTPUT_FLAG_IS_FLOOR } else { 0 }
}

/// Build `block`'s index from its own code, its sub-indices and those of its
/// floor siblings. The code bytes go to `arena`.
pub(crate) fn compile_index(
    block: &mut PendingBlock,
    floor_blocks: &mut [PendingBlock],
    arena: &mut Vec<u8>,
) -> Result<()> {
    debug_assert_eq!(block.is_floor, !floor_blocks.is_empty());

    let mut code = Vec::new();
    code.write_vlong(encode_output(block.fp, block.has_terms, block.is_floor))?;
    if block.is_floor {
        code.write_vint(floor_blocks.len() as u32)?;
        for sub in floor_blocks.iter() {
            let lead = sub.floor_lead_byte.ok_or_else(|| {
                BlockTreeError::invalid_operation("floor sibling without a lead byte")
            })?;
            debug_assert!(sub.fp > block.fp);
            code.write_byte(lead)?;
            code.write_vlong(((sub.fp - block.fp) << 1) | u64::from(sub.has_terms))?;
        }
    }

    let offset = arena.len() as u64;
    arena.write_vint(code.len() as u32)?;
    arena.extend_from_slice(&code);

    let mut builder = MapBuilder::memory();
    builder.insert(&block.prefix, offset)?;

    // Sub-block prefixes all extend this block's prefix and follow each other
    // in term order, so appending keeps the builder's input sorted.
    for sub_index in block.sub_indices.drain(..) {
        append(&mut builder, &sub_index)?;
    }
    for sub in floor_blocks.iter_mut() {
        for sub_index in sub.sub_indices.drain(..) {
            append(&mut builder, &sub_index)?;
        }
    }

    block.index = Some(builder.into_map());
    block.code = code;
    Ok(())
}

fn append(builder: &mut MapBuilder<Vec<u8>>, index: &fst::Map<Vec<u8>>) -> Result<()> {
    let mut stream = index.into_stream();
    while let Some((key, value)) = stream.next() {
        builder.insert(key, value)?;
    }
    Ok(())
}

/// Serialize a field's finished index.
pub(crate) fn write_index(out: &mut IndexOutput, arena: &[u8], index: &fst::Map<Vec<u8>>) -> Result<()> {
    out.write_vlong(arena.len() as u64)?;
    out.write_bytes(arena)?;
    let fst_bytes = index.as_fst().as_bytes();
    out.write_vlong(fst_bytes.len() as u64)?;
    out.write_bytes(fst_bytes)
}

/// A position in the prefix index: the arc leading into `target`, with the
/// output accumulated along the path so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexArc {
    /// Label of the arc; `None` for the virtual arc into the root.
    pub label: Option<u8>,
    target: CompiledAddr,
    output: u64,
    is_final: bool,
    final_output: u64,
}

impl IndexArc {
    /// Returns true if a block prefix ends at this arc.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Arena offset of the code of the block ending here.
    fn code_offset(&self) -> u64 {
        self.output + self.final_output
    }
}

/// A field's prefix index, loaded in memory.
pub struct TermsIndex {
    fst: Fst<Vec<u8>>,
    arena: Vec<u8>,
}

impl std::fmt::Debug for TermsIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermsIndex")
            .field("keys", &self.fst.len())
            .field("fst_bytes", &self.fst.as_bytes().len())
            .field("arena_bytes", &self.arena.len())
            .finish()
    }
}

impl TermsIndex {
    /// Read a field's index at the current position of `input`.
    pub(crate) fn read(input: &mut IndexInput) -> Result<Self> {
        let arena_len = read_len(input, "index arena")?;
        let mut arena = vec![0u8; arena_len];
        input.read_bytes(&mut arena)?;

        let fst_len = read_len(input, "index fst")?;
        let mut fst_bytes = vec![0u8; fst_len];
        input.read_bytes(&mut fst_bytes)?;

        let fst = Fst::new(fst_bytes)?;
        Ok(TermsIndex { fst, arena })
    }

    /// The arc into the root node, for the empty prefix.
    pub fn first_arc(&self) -> IndexArc {
        let root = self.fst.root();
        IndexArc {
            label: None,
            target: root.addr(),
            output: 0,
            is_final: root.is_final(),
            final_output: root.final_output().value(),
        }
    }

    /// Follow the arc labeled `label` out of `follow`'s target, if any.
    pub fn find_target_arc(&self, label: u8, follow: &IndexArc) -> Option<IndexArc> {
        let node = self.fst.node(follow.target);
        let transition = node.transition(node.find_input(label)?);
        let target = self.fst.node(transition.addr);
        Some(IndexArc {
            label: Some(label),
            target: transition.addr,
            output: follow.output + transition.out.value(),
            is_final: target.is_final(),
            final_output: target.final_output().value(),
        })
    }

    /// The code of the block whose prefix ends at `arc`.
    pub fn code(&self, arc: &IndexArc) -> Result<&[u8]> {
        debug_assert!(arc.is_final);
        let offset = usize::try_from(arc.code_offset())
            .ok()
            .filter(|&offset| offset < self.arena.len())
            .ok_or_else(|| BlockTreeError::corrupt("index output points outside the code arena"))?;
        let (len, read) = varint::decode_u32(&self.arena[offset..])?;
        let start = offset + read;
        self.arena
            .get(start..start + len as usize)
            .ok_or_else(|| BlockTreeError::corrupt("truncated code in index arena"))
    }

    /// Look up the code stored for an exact prefix.
    pub fn get(&self, prefix: &[u8]) -> Result<Option<&[u8]>> {
        let mut arc = self.first_arc();
        for &label in prefix {
            match self.find_target_arc(label, &arc) {
                Some(next) => arc = next,
                None => return Ok(None),
            }
        }
        if arc.is_final {
            Ok(Some(self.code(&arc)?))
        } else {
            Ok(None)
        }
    }

    /// Number of block prefixes in the index.
    pub fn num_prefixes(&self) -> usize {
        self.fst.len()
    }

    /// Size of the index in memory.
    pub fn size_in_bytes(&self) -> usize {
        self.fst.as_bytes().len() + self.arena.len()
    }

    /// Count the FST's nodes and arcs.
    pub fn node_and_arc_counts(&self) -> (usize, usize) {
        let mut seen = AHashSet::new();
        let mut stack = vec![self.fst.root().addr()];
        let mut arcs = 0;
        while let Some(addr) = stack.pop() {
            if !seen.insert(addr) {
                continue;
            }
            let node = self.fst.node(addr);
            arcs += node.len();
            stack.extend(node.transitions().map(|t| t.addr));
        }
        (seen.len(), arcs)
    }
}

fn read_len(input: &mut IndexInput, what: &str) -> Result<usize> {
    let len = input.read_vlong()?;
    let remaining = input.len().saturating_sub(input.position());
    if len > remaining {
        return Err(BlockTreeError::corrupt(format!(
            "{what} length {len} exceeds remaining {remaining} bytes (resource={})",
            input.name()
        )));
    }
    Ok(len as usize)
}

/// Decoded block pointer of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockPointer {
    pub(crate) fp: u64,
    pub(crate) has_terms: bool,
    pub(crate) is_floor: bool,
}

/// Read the pointer at the start of a code, leaving `reader` on the floor data.
pub(crate) fn read_block_pointer(reader: &mut BytesReader) -> Result<BlockPointer> {
    let code = reader.read_vlong()?;
    Ok(BlockPointer {
        fp: code >> OUTPUT_FLAGS_NUM_BITS,
        has_terms: code & OUTPUT_FLAG_HAS_TERMS != 0,
        is_floor: code & OUTPUT_FLAG_IS_FLOOR != 0,
    })
}
