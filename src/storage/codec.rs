//! Header and footer framing for dictionary files.
//!
//! Every file starts with `u32 magic`, the codec name and a `u32` version, and
//! ends (from the checksum version on) with a 16-byte footer: the inverted
//! magic, an algorithm id (always 0) and the CRC32 of everything before the
//! checksum field, stored as a u64.

use crc32fast::Hasher;

use crate::error::{BlockTreeError, Result};
use crate::storage::data::{DataInput, DataOutput};
use crate::storage::index_io::{IndexInput, IndexOutput};

/// Magic number opening every header.
pub const CODEC_MAGIC: u32 = 0x3fd7_6c17;

/// Magic number opening every footer.
pub const FOOTER_MAGIC: u32 = !CODEC_MAGIC;

/// Length in bytes of a footer.
pub const FOOTER_LENGTH: u64 = 16;

const CHECKSUM_BUFFER: usize = 8192;

/// Write a codec header.
pub fn write_header<O: DataOutput + ?Sized>(out: &mut O, codec: &str, version: u32) -> Result<()> {
    if codec.len() >= 128 || !codec.is_ascii() {
        return Err(BlockTreeError::invalid_argument(format!(
            "codec name must be simple ASCII shorter than 128 bytes: {codec}"
        )));
    }
    out.write_u32(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_u32(version)
}

/// Length in bytes of a header written for `codec`.
pub fn header_length(codec: &str) -> u64 {
    9 + codec.len() as u64
}

/// Read and validate a codec header, returning its version.
pub fn check_header<I: DataInput + ?Sized>(
    input: &mut I,
    codec: &str,
    min_version: u32,
    max_version: u32,
) -> Result<u32> {
    let actual = input.read_u32()?;
    if actual != CODEC_MAGIC {
        return Err(BlockTreeError::corrupt(format!(
            "codec header mismatch: actual header={actual:#x} vs expected header={CODEC_MAGIC:#x}"
        )));
    }
    check_header_no_magic(input, codec, min_version, max_version)
}

/// Validate the rest of a header once the magic has been consumed.
pub fn check_header_no_magic<I: DataInput + ?Sized>(
    input: &mut I,
    codec: &str,
    min_version: u32,
    max_version: u32,
) -> Result<u32> {
    let actual_codec = input.read_string()?;
    if actual_codec != codec {
        return Err(BlockTreeError::corrupt(format!(
            "codec mismatch: actual codec={actual_codec} vs expected codec={codec}"
        )));
    }

    let version = input.read_u32()?;
    if version < min_version {
        return Err(BlockTreeError::index_format(format!(
            "{codec}: version {version} is too old (min {min_version})"
        )));
    }
    if version > max_version {
        return Err(BlockTreeError::index_format(format!(
            "{codec}: version {version} is too new (max {max_version})"
        )));
    }

    Ok(version)
}

/// Write a footer carrying the checksum of everything written so far.
pub fn write_footer(out: &mut IndexOutput) -> Result<()> {
    out.write_u32(FOOTER_MAGIC)?;
    out.write_u32(0)?;
    let checksum = out.checksum();
    out.write_u64(checksum)
}

/// Read the footer at the current position and return the stored checksum.
///
/// The input must be positioned exactly [`FOOTER_LENGTH`] bytes before EOF.
pub fn check_footer(input: &mut IndexInput) -> Result<u64> {
    let remaining = input.len().saturating_sub(input.position());
    if remaining != FOOTER_LENGTH {
        return Err(BlockTreeError::corrupt(format!(
            "did not read all file data before the footer: remaining={remaining} (resource={})",
            input.name()
        )));
    }
    validate_footer(input)
}

/// Seek to the footer and return the stored checksum without verifying it.
pub fn retrieve_checksum(input: &mut IndexInput) -> Result<u64> {
    if input.len() < FOOTER_LENGTH {
        return Err(BlockTreeError::corrupt(format!(
            "file too short to hold a footer: length={} (resource={})",
            input.len(),
            input.name()
        )));
    }
    input.seek(input.len() - FOOTER_LENGTH)?;
    validate_footer(input)
}

fn validate_footer(input: &mut IndexInput) -> Result<u64> {
    let magic = input.read_u32()?;
    if magic != FOOTER_MAGIC {
        return Err(BlockTreeError::corrupt(format!(
            "codec footer mismatch: actual footer={magic:#x} vs expected footer={FOOTER_MAGIC:#x} (resource={})",
            input.name()
        )));
    }

    let algorithm = input.read_u32()?;
    if algorithm != 0 {
        return Err(BlockTreeError::corrupt(format!(
            "codec footer mismatch: unknown algorithmID: {algorithm} (resource={})",
            input.name()
        )));
    }

    let checksum = input.read_u64()?;
    if checksum > u32::MAX as u64 {
        return Err(BlockTreeError::corrupt(format!(
            "illegal checksum: {checksum} (resource={})",
            input.name()
        )));
    }
    Ok(checksum)
}

/// Hash the whole file and compare against the stored footer checksum.
///
/// Works on a clone, so `input` keeps its position.
pub fn checksum_entire_file(input: &IndexInput) -> Result<u64> {
    let mut clone = input.clone_input()?;
    let expected = retrieve_checksum(&mut clone)?;

    clone.seek(0)?;
    let mut hasher = Hasher::new();
    let mut remaining = clone.len() - 8;
    let mut buf = vec![0u8; CHECKSUM_BUFFER];
    while remaining > 0 {
        let n = remaining.min(CHECKSUM_BUFFER as u64) as usize;
        clone.read_bytes(&mut buf[..n])?;
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    let actual = hasher.finalize() as u64;
    if actual != expected {
        return Err(BlockTreeError::corrupt(format!(
            "checksum failed (hardware problem?): expected={expected:#x} actual={actual:#x} (resource={})",
            input.name()
        )));
    }

    log::debug!("verified checksum of {}", input.name());
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::Storage;

    fn write_framed(storage: &MemoryStorage, name: &str, body: &[u8]) {
        let mut out = IndexOutput::new(name, storage.create_output(name).unwrap());
        write_header(&mut out, "TEST_CODEC", 3).unwrap();
        out.write_bytes(body).unwrap();
        write_footer(&mut out).unwrap();
        out.close().unwrap();
    }

    fn open(storage: &MemoryStorage, name: &str) -> IndexInput {
        IndexInput::new(name, storage.open_input(name).unwrap()).unwrap()
    }

    #[test]
    fn test_header_round_trip() {
        let storage = MemoryStorage::new();
        write_framed(&storage, "f", b"payload");

        let mut input = open(&storage, "f");
        assert_eq!(check_header(&mut input, "TEST_CODEC", 0, 3).unwrap(), 3);
        assert_eq!(input.position(), header_length("TEST_CODEC"));

        let mut input = open(&storage, "f");
        let err = check_header(&mut input, "OTHER", 0, 3).unwrap_err();
        assert!(matches!(err, BlockTreeError::CorruptIndex(_)));

        let mut input = open(&storage, "f");
        let err = check_header(&mut input, "TEST_CODEC", 0, 2).unwrap_err();
        assert!(matches!(err, BlockTreeError::IndexFormat(_)));
    }

    #[test]
    fn test_footer_checksum() {
        let storage = MemoryStorage::new();
        write_framed(&storage, "f", b"payload");

        let mut input = open(&storage, "f");
        let stored = retrieve_checksum(&mut input).unwrap();
        assert_eq!(checksum_entire_file(&input).unwrap(), stored);

        input.seek(input.len() - FOOTER_LENGTH).unwrap();
        assert_eq!(check_footer(&mut input).unwrap(), stored);
    }

    #[test]
    fn test_flipped_byte_is_detected() {
        let storage = MemoryStorage::new();
        write_framed(&storage, "f", b"payload");

        let mut bytes = storage.read_file("f").unwrap();
        let at = bytes.len() - 20;
        bytes[at] ^= 0xFF;
        storage.write_file("f", bytes);

        let err = checksum_entire_file(&open(&storage, "f")).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_truncated_file_is_detected() {
        let storage = MemoryStorage::new();
        write_framed(&storage, "f", b"a longer payload for truncation");

        let bytes = storage.read_file("f").unwrap();
        storage.write_file("f", bytes[..bytes.len() - 5].to_vec());

        let mut input = open(&storage, "f");
        assert!(retrieve_checksum(&mut input).unwrap_err().is_corruption());

        storage.write_file("g", vec![1, 2, 3]);
        assert!(checksum_entire_file(&open(&storage, "g")).unwrap_err().is_corruption());
    }
}
