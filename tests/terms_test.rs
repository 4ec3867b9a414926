//! Integration tests for writing a dictionary and reading it back.

mod common;

use blocktree::blocktree::{BlockTreeConfig, SeekStatus, SeekTermsEnum, Terms, TermsEnum};
use blocktree::error::Result;
use blocktree::segment::{FieldInfo, FieldInfos, IndexOptions};
use blocktree::storage::MemoryStorage;

use common::*;

fn read_all<T: TermsEnum>(cursor: &mut T) -> Result<Vec<Vec<u8>>> {
    let mut terms = Vec::new();
    while let Some(term) = cursor.next()? {
        terms.push(term.to_vec());
    }
    Ok(terms)
}

#[test]
fn test_round_trip_every_block_shape() -> Result<()> {
    init_logger();
    let terms = all_words(5, 3);

    for config in block_shapes() {
        let storage = MemoryStorage::new();
        let infos = write_body(&storage, config.clone(), &terms)?;
        let reader = open(&storage, &infos)?;
        let body = reader.field("body").unwrap();

        assert_eq!(body.size(), terms.len() as u64);
        let mut cursor = body.iterator();
        let mut ord = 0;
        while let Some(term) = cursor.next()? {
            assert_eq!(term, &terms[ord][..], "config {config:?}");
            let expected = stats_for(ord, IndexOptions::DocsAndFreqs);
            assert_eq!(cursor.doc_freq()?, expected.doc_freq);
            assert_eq!(cursor.total_term_freq()?, expected.total_term_freq);
            ord += 1;
        }
        assert_eq!(ord, terms.len());

        // Exhausted cursors stay exhausted.
        assert!(cursor.next()?.is_none());
    }
    Ok(())
}

#[test]
fn test_seek_exact_finds_every_term() -> Result<()> {
    let terms = sorted((0..500).map(|i| format!("term{:05}", i * 7)));

    for config in block_shapes() {
        let storage = MemoryStorage::new();
        let infos = write_body(&storage, config, &terms)?;
        let reader = open(&storage, &infos)?;
        let body = reader.field("body").unwrap();

        let mut cursor = body.iterator();
        // Forward, then backward, on one cursor.
        for (ord, term) in terms.iter().enumerate().chain(terms.iter().enumerate().rev()) {
            assert!(cursor.seek_exact(term)?, "missing {:?}", String::from_utf8_lossy(term));
            assert_eq!(cursor.term(), &term[..]);
            assert_eq!(cursor.doc_freq()?, stats_for(ord, IndexOptions::DocsAndFreqs).doc_freq);
        }
    }
    Ok(())
}

#[test]
fn test_seek_exact_absent_then_next() -> Result<()> {
    let terms = sorted((0..300).map(|i| format!("k{:04}", i * 2)));

    for config in block_shapes() {
        let storage = MemoryStorage::new();
        let infos = write_body(&storage, config, &terms)?;
        let reader = open(&storage, &infos)?;
        let body = reader.field("body").unwrap();
        let mut cursor = body.iterator();

        for i in 0..300 {
            let absent = format!("k{:04}", i * 2 + 1).into_bytes();
            assert!(!cursor.seek_exact(&absent)?);
            assert!(cursor.doc_freq().is_err());

            let next = cursor.next()?.map(<[u8]>::to_vec);
            let expected = terms.iter().find(|t| t.as_slice() > absent.as_slice()).cloned();
            assert_eq!(next, expected, "after {:?}", String::from_utf8_lossy(&absent));
        }

        // Shorter and longer than any stored term.
        assert!(!cursor.seek_exact(b"k")?);
        assert_eq!(cursor.next()?, Some(&b"k0000"[..]));
        assert!(!cursor.seek_exact(b"k00000")?);
        assert_eq!(cursor.next()?, Some(&b"k0002"[..]));
        assert!(!cursor.seek_exact(b"z")?);
        assert_eq!(cursor.next()?, None);
    }
    Ok(())
}

#[test]
fn test_seek_ceil_is_monotonic() -> Result<()> {
    let terms = sorted(all_words(4, 4).into_iter().step_by(3));
    let targets = all_words(5, 3);

    for config in block_shapes() {
        let storage = MemoryStorage::new();
        let infos = write_body(&storage, config, &terms)?;
        let reader = open(&storage, &infos)?;
        let body = reader.field("body").unwrap();
        let mut cursor = body.iterator();

        let mut last: Option<Vec<u8>> = None;
        for target in &targets {
            let expected = terms.iter().find(|t| t.as_slice() >= target.as_slice());
            let status = cursor.seek_ceil(target)?;
            match expected {
                None => assert_eq!(status, SeekStatus::End),
                Some(term) if term == target => {
                    assert_eq!(status, SeekStatus::Found);
                    assert_eq!(cursor.term(), &target[..]);
                }
                Some(term) => {
                    assert_eq!(status, SeekStatus::NotFound);
                    assert_eq!(cursor.term(), &term[..]);
                }
            }
            if status != SeekStatus::End {
                if let Some(last) = &last {
                    assert!(cursor.term() >= last.as_slice());
                }
                last = Some(cursor.term().to_vec());
            }
        }
    }
    Ok(())
}

#[test]
fn test_seek_ceil_then_iterate() -> Result<()> {
    let terms = sorted(all_words(6, 3));
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::with_block_sizes(2, 4), &terms)?;
    let reader = open(&storage, &infos)?;
    let body = reader.field("body").unwrap();

    let mut cursor = body.iterator();
    assert_eq!(cursor.seek_ceil(b"cc")?, SeekStatus::NotFound);
    assert_eq!(cursor.term(), b"cca");
    let rest = read_all(&mut cursor)?;
    let start = terms.iter().position(|t| t.as_slice() == b"cca").unwrap();
    assert_eq!(rest, terms[start + 1..].to_vec());

    assert_eq!(cursor.seek_ceil(b"fff")?, SeekStatus::Found);
    assert_eq!(cursor.next()?, None);
    assert_eq!(cursor.seek_ceil(b"fffa")?, SeekStatus::End);
    assert_eq!(cursor.seek_ceil(b"")?, SeekStatus::NotFound);
    assert_eq!(cursor.term(), b"aaa");
    Ok(())
}

#[test]
fn test_floor_blocks_read_back_in_order() -> Result<()> {
    init_logger();
    let terms = sorted(["aa", "ab", "ac", "ad", "ae", "af", "ag"]);
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::with_block_sizes(2, 4), &terms)?;
    let reader = open(&storage, &infos)?;
    let body = reader.field("body").unwrap();

    let mut cursor = body.iterator();
    for (ord, term) in terms.iter().enumerate() {
        assert_eq!(cursor.next()?, Some(&term[..]));
        assert_eq!(cursor.doc_freq()?, stats_for(ord, IndexOptions::DocsAndFreqs).doc_freq);
    }
    assert_eq!(cursor.next()?, None);

    for term in terms.iter().rev() {
        assert!(cursor.seek_exact(term)?);
    }

    let stats = body.compute_stats()?;
    assert_eq!(stats.total_term_count, 7);
    assert!(stats.floor_block_count >= 1, "{stats}");
    assert!(stats.floor_sub_block_count >= 2, "{stats}");
    Ok(())
}

#[test]
fn test_field_aggregates() -> Result<()> {
    let terms = sorted((0..200).map(|i| format!("{i:03}")));
    let fields = vec![
        (FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions), terms.clone()),
        (FieldInfo::new("id", 1, IndexOptions::DocsOnly), terms.clone()),
        (FieldInfo::new("empty", 2, IndexOptions::DocsAndFreqs), Vec::new()),
    ];
    let storage = MemoryStorage::new();
    write_fields(&storage, BlockTreeConfig::default(), &fields)?;
    let infos = FieldInfos::new(fields.iter().map(|(info, _)| info.clone()).collect())?;
    let reader = open(&storage, &infos)?;

    // A field without terms is not stored.
    assert_eq!(reader.fields().collect::<Vec<_>>(), vec!["body", "id"]);
    assert!(reader.field("empty").is_none());

    for name in ["body", "id"] {
        let field = reader.field(name).unwrap();
        let options = field.info().index_options;

        let mut sum_df = 0u64;
        let mut cursor = field.iterator();
        while cursor.next()?.is_some() {
            sum_df += cursor.doc_freq()? as u64;
            if options.has_freqs() {
                assert!(cursor.total_term_freq()? >= cursor.doc_freq()? as i64);
            } else {
                assert_eq!(cursor.total_term_freq()?, -1);
            }
        }
        assert_eq!(field.sum_doc_freq(), sum_df);
        assert!(field.doc_count() <= MAX_DOC);
        if options.has_freqs() {
            assert!(field.sum_total_term_freq() >= field.sum_doc_freq() as i64);
        } else {
            assert_eq!(field.sum_total_term_freq(), -1);
        }
    }

    let body = reader.field("body").unwrap();
    assert!(body.has_positions());
    assert!(!body.has_offsets());
    assert!(!body.has_payloads());
    assert_eq!(body.longs_size(), 2);
    Ok(())
}

#[test]
fn test_seek_by_saved_state() -> Result<()> {
    let terms = sorted(all_words(4, 3));
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::with_block_sizes(2, 4), &terms)?;
    let reader = open(&storage, &infos)?;
    let body = reader.field("body").unwrap();

    let mut cursor = body.iterator();
    assert!(cursor.seek_exact(b"bcd")?);
    let saved = cursor.term_state()?;
    assert_eq!(saved.doc_freq, cursor.doc_freq()?);

    let mut other = body.iterator();
    other.seek_exact_with_state(b"bcd", &saved);
    assert_eq!(other.term(), b"bcd");
    assert_eq!(other.term_state()?, saved);
    assert_eq!(other.next()?, Some(&b"bda"[..]));
    assert_eq!(other.next()?, Some(&b"bdb"[..]));

    // Saved states also let a positioned cursor jump backwards.
    other.seek_exact_with_state(b"bcd", &saved);
    assert_eq!(other.doc_freq()?, saved.doc_freq);
    assert!(other.seek_exact(b"aaa")?);
    Ok(())
}

#[test]
fn test_unpositioned_cursor_rejects_metadata() -> Result<()> {
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::default(), &sorted(["x", "y"]))?;
    let reader = open(&storage, &infos)?;
    let mut cursor = reader.field("body").unwrap().iterator();

    let err = cursor.doc_freq().unwrap_err();
    assert!(!err.is_corruption());
    assert!(cursor.term_state().is_err());
    Ok(())
}

#[test]
fn test_block_stats() -> Result<()> {
    let terms = sorted(all_words(8, 3));
    let storage = MemoryStorage::new();
    let infos = write_body(&storage, BlockTreeConfig::with_block_sizes(4, 8), &terms)?;
    let reader = open(&storage, &infos)?;
    let body = reader.field("body").unwrap();

    let stats = body.compute_stats()?;
    assert_eq!(stats.total_term_count, terms.len() as u64);
    assert_eq!(stats.total_term_bytes, 3 * terms.len() as u64);
    assert_eq!(
        stats.total_block_count,
        stats.non_floor_block_count + stats.floor_sub_block_count
    );
    assert_eq!(
        stats.total_block_count,
        stats.terms_only_block_count + stats.sub_blocks_only_block_count + stats.mixed_block_count
    );
    assert_eq!(stats.block_count_by_prefix_len.iter().sum::<u64>(), stats.total_block_count);
    assert!(stats.index_num_bytes > 0);

    let json: serde_json::Value = serde_json::from_str(&stats.to_json()?)?;
    assert_eq!(json["total_term_count"], terms.len() as u64);
    assert!(stats.to_string().contains("field=body"));
    Ok(())
}
