//! Damaged and truncated segments, on memory and file storage.

mod common;

use blocktree::blocktree::header::{TERMS_CODEC_NAME, TERMS_INDEX_CODEC_NAME};
use blocktree::blocktree::{BlockTreeConfig, BlockTreeTermsReader, SeekTermsEnum, Terms, TermsEnum};
use blocktree::error::Result;
use blocktree::postings::SequentialPostingsReader;
use blocktree::segment::{FieldInfos, TERMS_EXTENSION, TERMS_INDEX_EXTENSION};
use blocktree::storage::{FileStorage, MemoryStorage, StorageConfig, codec};
use tempfile::TempDir;

use common::*;

fn body_terms() -> Vec<Vec<u8>> {
    sorted((0..2000).map(|i| format!("doc-{i:06}")))
}

fn open_with(
    storage: &dyn blocktree::storage::Storage,
    infos: &FieldInfos,
    config: &BlockTreeConfig,
) -> Result<BlockTreeTermsReader<SequentialPostingsReader>> {
    BlockTreeTermsReader::open(storage, &segment(), infos, SequentialPostingsReader::new(), config)
}

fn lenient() -> BlockTreeConfig {
    BlockTreeConfig {
        verify_checksums_on_open: false,
        ..Default::default()
    }
}

#[test]
fn test_flipped_byte_in_either_file_is_corrupt() -> Result<()> {
    init_logger();
    for ext in [TERMS_EXTENSION, TERMS_INDEX_EXTENSION] {
        let storage = MemoryStorage::new();
        let infos = write_body(&storage, BlockTreeConfig::default(), &body_terms())?;
        let name = segment().file_name(ext);

        let mut bytes = storage.read_file(&name)?;
        let at = bytes.len() - codec::FOOTER_LENGTH as usize - 3;
        bytes[at] ^= 0x40;
        storage.write_file(&name, bytes);

        let err = open(&storage, &infos).unwrap_err();
        assert!(err.is_corruption(), "{name}: {err}");
    }
    Ok(())
}

#[test]
fn test_index_is_verified_even_when_lenient() -> Result<()> {
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::default(), &body_terms())?;
    let name = segment().file_name(TERMS_INDEX_EXTENSION);

    let mut bytes = storage.read_file(&name)?;
    let at = codec::header_length(TERMS_INDEX_CODEC_NAME) as usize + 1;
    bytes[at] ^= 0x01;
    storage.write_file(&name, bytes);

    let err = open_with(&storage, &infos, &lenient()).unwrap_err();
    assert!(err.is_corruption());
    Ok(())
}

#[test]
fn test_lenient_open_defers_dictionary_check() -> Result<()> {
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::default(), &body_terms())?;
    let name = segment().file_name(TERMS_EXTENSION);

    let mut bytes = storage.read_file(&name)?;
    let at = codec::header_length(TERMS_CODEC_NAME) as usize + 4;
    bytes[at] ^= 0x01;
    storage.write_file(&name, bytes);

    let reader = open_with(&storage, &infos, &lenient())?;
    assert_eq!(reader.len(), 1);
    assert!(reader.check_integrity().unwrap_err().is_corruption());
    Ok(())
}

#[test]
fn test_truncated_files_are_corrupt() -> Result<()> {
    for ext in [TERMS_EXTENSION, TERMS_INDEX_EXTENSION] {
        for keep in [0.5, 0.9] {
            let storage = MemoryStorage::new();
            let infos = write_body(&storage, BlockTreeConfig::default(), &body_terms())?;
            let name = segment().file_name(ext);

            let mut bytes = storage.read_file(&name)?;
            let len = (bytes.len() as f64 * keep) as usize;
            bytes.truncate(len);
            storage.write_file(&name, bytes);

            for config in [BlockTreeConfig::default(), lenient()] {
                let err = open_with(&storage, &infos, &config).unwrap_err();
                assert!(err.is_corruption(), "{name} cut to {len} bytes: {err}");
            }
        }
    }
    Ok(())
}

#[test]
fn test_missing_file_is_not_corruption() -> Result<()> {
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::default(), &body_terms())?;
    let other = MemoryStorage::new();
    other.write_file(
        &segment().file_name(TERMS_EXTENSION),
        storage.read_file(&segment().file_name(TERMS_EXTENSION))?,
    );

    let err = open(&other, &infos).unwrap_err();
    assert!(!err.is_corruption());
    Ok(())
}

#[test]
fn test_file_storage_round_trip() -> Result<()> {
    init_logger();
    let terms = body_terms();

    for use_mmap in [true, false] {
        let dir = TempDir::new()?;
        let config = StorageConfig {
            use_mmap,
            ..Default::default()
        };
        let storage = FileStorage::new(dir.path(), config)?;
        let infos = write_body(&storage, BlockTreeConfig::with_block_sizes(4, 8), &terms)?;

        let reader = open(&storage, &infos)?;
        reader.check_integrity()?;
        let body = reader.field("body").unwrap();
        assert_eq!(body.size(), terms.len() as u64);

        let mut cursor = body.iterator();
        for term in terms.iter().step_by(37) {
            assert!(cursor.seek_exact(term)?);
        }
        assert!(!cursor.seek_exact(b"doc-")?);
        assert_eq!(cursor.next()?, Some(&terms[0][..]));
    }
    Ok(())
}

#[test]
fn test_file_storage_detects_damage() -> Result<()> {
    let dir = TempDir::new()?;
    let storage = FileStorage::new(dir.path(), StorageConfig::default())?;
    let infos = write_body(&storage, BlockTreeConfig::default(), &body_terms())?;
    drop(storage);

    let path = dir.path().join(segment().file_name(TERMS_EXTENSION));
    let mut bytes = std::fs::read(&path)?;
    let at = bytes.len() / 2;
    bytes[at] ^= 0xff;
    std::fs::write(&path, bytes)?;

    let storage = FileStorage::new(dir.path(), StorageConfig::default())?;
    let err = open(&storage, &infos).unwrap_err();
    assert!(err.is_corruption());
    Ok(())
}
