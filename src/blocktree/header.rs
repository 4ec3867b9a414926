//! Per-version header and trailer handling of the two block-tree files.
//!
//! Every on-disk version shares the codec header; they differ in where the
//! directory offset lives and in what follows it:
//!
//! | version       | directory offset                  | footer | metadata arity |
//! |---------------|-----------------------------------|--------|----------------|
//! | `START`       | u64 right after the codec header  | no     | no             |
//! | `APPEND_ONLY` | last 8 bytes of the file          | no     | no             |
//! | `META_ARRAY`  | last 8 bytes of the file          | no     | yes            |
//! | `CHECKSUM`    | 8 bytes before the footer         | yes    | yes            |

use std::fmt::Debug;

use crate::error::{BlockTreeError, Result};
use crate::storage::codec;
use crate::storage::{DataInput, DataOutput, IndexInput, IndexOutput};

/// Codec name of the terms dictionary (`.tim`).
pub const TERMS_CODEC_NAME: &str = "BLOCK_TREE_TERMS_DICT";

/// Codec name of the terms index (`.tip`).
pub const TERMS_INDEX_CODEC_NAME: &str = "BLOCK_TREE_TERMS_INDEX";

/// Initial version: the directory offset is patched into the header.
pub const VERSION_START: u32 = 0;

/// The directory offset is appended at the end of the file.
pub const VERSION_APPEND_ONLY: u32 = 1;

/// The field directory records the metadata arity of each field.
pub const VERSION_META_ARRAY: u32 = 2;

/// Files end with a checksum footer.
pub const VERSION_CHECKSUM: u32 = 3;

/// The version written by this crate.
pub const VERSION_CURRENT: u32 = VERSION_CHECKSUM;

/// Header and trailer strategy of one on-disk version.
pub trait HeaderCodec: Debug + Send + Sync {
    /// The version number stored in the codec header.
    fn version(&self) -> u32;

    /// Write the codec header, plus whatever this version reserves after it.
    fn write_header(&self, out: &mut IndexOutput, codec_name: &str) -> Result<()> {
        codec::write_header(out, codec_name, self.version())
    }

    /// Record where the directory starts, then close off the file body.
    fn write_trailer(&self, out: &mut IndexOutput, codec_name: &str, dir_start: u64) -> Result<()>;

    /// Read what follows the codec header; returns a directory offset if the
    /// header carries one.
    fn read_header_tail(&self, _input: &mut IndexInput) -> Result<Option<u64>> {
        Ok(None)
    }

    /// Position `input` at the start of the directory.
    fn seek_dir(&self, input: &mut IndexInput, header_dir_offset: Option<u64>) -> Result<()>;

    /// Bytes that follow the directory: the trailing offset and footer.
    fn trailer_length(&self) -> u64 {
        8
    }

    /// Returns true if files end with a checksum footer.
    fn has_footer(&self) -> bool {
        false
    }

    /// Returns true if the field directory stores the metadata arity.
    fn has_metadata_arity(&self) -> bool {
        false
    }
}

/// [`VERSION_START`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StartHeader;

/// [`VERSION_APPEND_ONLY`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOnlyHeader;

/// [`VERSION_META_ARRAY`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaArrayHeader;

/// [`VERSION_CHECKSUM`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumHeader;

impl HeaderCodec for StartHeader {
    fn version(&self) -> u32 {
        VERSION_START
    }

    fn write_header(&self, out: &mut IndexOutput, codec_name: &str) -> Result<()> {
        codec::write_header(out, codec_name, self.version())?;
        // Placeholder for the directory offset.
        out.write_u64(0)
    }

    fn write_trailer(&self, out: &mut IndexOutput, codec_name: &str, dir_start: u64) -> Result<()> {
        out.patch_u64(codec::header_length(codec_name), dir_start)
    }

    fn read_header_tail(&self, input: &mut IndexInput) -> Result<Option<u64>> {
        Ok(Some(input.read_u64()?))
    }

    fn seek_dir(&self, input: &mut IndexInput, header_dir_offset: Option<u64>) -> Result<()> {
        let offset = header_dir_offset
            .ok_or_else(|| BlockTreeError::corrupt("missing directory offset in header"))?;
        input.seek(offset)
    }

    fn trailer_length(&self) -> u64 {
        0
    }
}

impl HeaderCodec for AppendOnlyHeader {
    fn version(&self) -> u32 {
        VERSION_APPEND_ONLY
    }

    fn write_trailer(&self, out: &mut IndexOutput, _codec_name: &str, dir_start: u64) -> Result<()> {
        out.write_u64(dir_start)
    }

    fn seek_dir(&self, input: &mut IndexInput, _header_dir_offset: Option<u64>) -> Result<()> {
        seek_trailing_offset(input, 8)
    }
}

impl HeaderCodec for MetaArrayHeader {
    fn version(&self) -> u32 {
        VERSION_META_ARRAY
    }

    fn write_trailer(&self, out: &mut IndexOutput, _codec_name: &str, dir_start: u64) -> Result<()> {
        out.write_u64(dir_start)
    }

    fn seek_dir(&self, input: &mut IndexInput, _header_dir_offset: Option<u64>) -> Result<()> {
        seek_trailing_offset(input, 8)
    }

    fn has_metadata_arity(&self) -> bool {
        true
    }
}

impl HeaderCodec for ChecksumHeader {
    fn version(&self) -> u32 {
        VERSION_CHECKSUM
    }

    fn write_trailer(&self, out: &mut IndexOutput, _codec_name: &str, dir_start: u64) -> Result<()> {
        out.write_u64(dir_start)?;
        codec::write_footer(out)
    }

    fn seek_dir(&self, input: &mut IndexInput, _header_dir_offset: Option<u64>) -> Result<()> {
        seek_trailing_offset(input, codec::FOOTER_LENGTH + 8)
    }

    fn trailer_length(&self) -> u64 {
        8 + codec::FOOTER_LENGTH
    }

    fn has_footer(&self) -> bool {
        true
    }

    fn has_metadata_arity(&self) -> bool {
        true
    }
}

/// Read the u64 directory offset stored `from_end` bytes before EOF and seek there.
fn seek_trailing_offset(input: &mut IndexInput, from_end: u64) -> Result<()> {
    let at = input.len().checked_sub(from_end).ok_or_else(|| {
        BlockTreeError::corrupt(format!(
            "file too short for a directory offset: length={} (resource={})",
            input.len(),
            input.name()
        ))
    })?;
    input.seek(at)?;
    let dir_offset = input.read_u64()?;
    input.seek(dir_offset)
}

static START: StartHeader = StartHeader;
static APPEND_ONLY: AppendOnlyHeader = AppendOnlyHeader;
static META_ARRAY: MetaArrayHeader = MetaArrayHeader;
static CHECKSUM: ChecksumHeader = ChecksumHeader;

/// The header strategy for a version read from disk.
pub fn header_codec(version: u32) -> Result<&'static dyn HeaderCodec> {
    match version {
        VERSION_START => Ok(&START),
        VERSION_APPEND_ONLY => Ok(&APPEND_ONLY),
        VERSION_META_ARRAY => Ok(&META_ARRAY),
        VERSION_CHECKSUM => Ok(&CHECKSUM),
        other => Err(BlockTreeError::index_format(format!(
            "unsupported block-tree version: {other}"
        ))),
    }
}

/// Read a codec header of either block-tree file and select its strategy.
///
/// Returns the strategy and the directory offset stored in the header, if any.
pub fn read_header(
    input: &mut IndexInput,
    codec_name: &str,
) -> Result<(&'static dyn HeaderCodec, Option<u64>)> {
    let version = codec::check_header(input, codec_name, VERSION_START, VERSION_CURRENT)?;
    let header = header_codec(version)?;
    let dir_offset = header.read_header_tail(input)?;
    Ok((header, dir_offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};

    fn write_file(storage: &MemoryStorage, header: &dyn HeaderCodec) {
        let mut out = IndexOutput::new("f", storage.create_output("f").unwrap());
        header.write_header(&mut out, TERMS_CODEC_NAME).unwrap();
        out.write_bytes(b"blocks").unwrap();
        let dir_start = out.position();
        out.write_vint(42).unwrap();
        header.write_trailer(&mut out, TERMS_CODEC_NAME, dir_start).unwrap();
        out.close().unwrap();
    }

    #[test]
    fn test_every_version_finds_its_directory() {
        for version in [VERSION_START, VERSION_APPEND_ONLY, VERSION_META_ARRAY, VERSION_CHECKSUM] {
            let storage = MemoryStorage::new();
            write_file(&storage, header_codec(version).unwrap());

            let mut input = IndexInput::new("f", storage.open_input("f").unwrap()).unwrap();
            let (header, dir_offset) = read_header(&mut input, TERMS_CODEC_NAME).unwrap();
            assert_eq!(header.version(), version);
            header.seek_dir(&mut input, dir_offset).unwrap();
            assert_eq!(input.read_vint().unwrap(), 42, "version {version}");
        }
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert!(header_codec(VERSION_CURRENT + 1).unwrap_err().is_corruption());
    }
}
