//! Helpers shared by the integration tests.

#![allow(dead_code)]

use blocktree::blocktree::{BlockTreeConfig, BlockTreeTermsReader, BlockTreeTermsWriter};
use blocktree::error::Result;
use blocktree::postings::{SequentialPostingsReader, SequentialPostingsWriter, TermStats};
use blocktree::segment::{FieldInfo, FieldInfos, IndexOptions, SegmentInfo};
use blocktree::storage::Storage;

/// Documents in every test segment.
pub const MAX_DOC: u32 = 1000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic statistics of the `ord`-th term of a field.
pub fn stats_for(ord: usize, options: IndexOptions) -> TermStats {
    let doc_freq = (ord % 7) as u32 + 1;
    if options.has_freqs() {
        TermStats::new(doc_freq, doc_freq as i64 + (ord % 3) as i64)
    } else {
        TermStats::new(doc_freq, -1)
    }
}

/// Field aggregates matching [`stats_for`].
pub fn aggregates(num_terms: usize, options: IndexOptions) -> (i64, u64, u32) {
    let mut sum_ttf = 0i64;
    let mut sum_df = 0u64;
    for ord in 0..num_terms {
        let stats = stats_for(ord, options);
        sum_df += stats.doc_freq as u64;
        sum_ttf += stats.total_term_freq;
    }
    if !options.has_freqs() {
        sum_ttf = -1;
    }
    let doc_count = sum_df.min(MAX_DOC as u64) as u32;
    (sum_ttf, sum_df, doc_count)
}

/// Sort and deduplicate byte strings.
pub fn sorted<I, T>(terms: I) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut terms: Vec<Vec<u8>> = terms.into_iter().map(|t| t.as_ref().to_vec()).collect();
    terms.sort();
    terms.dedup();
    terms
}

pub fn segment() -> SegmentInfo {
    SegmentInfo::new("_0", MAX_DOC)
}

/// Write one segment holding `fields`, each with its sorted terms.
pub fn write_fields(storage: &dyn Storage, config: BlockTreeConfig, fields: &[(FieldInfo, Vec<Vec<u8>>)]) -> Result<()> {
    let mut writer = BlockTreeTermsWriter::new(storage, &segment(), SequentialPostingsWriter::new(), config)?;
    for (info, terms) in fields {
        let mut field = writer.add_field(info)?;
        for (ord, term) in terms.iter().enumerate() {
            field.add_term(term, stats_for(ord, info.index_options))?;
        }
        let (sum_ttf, sum_df, doc_count) = aggregates(terms.len(), info.index_options);
        field.finish(sum_ttf, sum_df, doc_count)?;
    }
    writer.close()
}

/// Write a single `body` field.
pub fn write_body(storage: &dyn Storage, config: BlockTreeConfig, terms: &[Vec<u8>]) -> Result<FieldInfos> {
    let info = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    write_fields(storage, config, &[(info.clone(), terms.to_vec())])?;
    FieldInfos::new(vec![info])
}

pub fn open(storage: &dyn Storage, infos: &FieldInfos) -> Result<BlockTreeTermsReader<SequentialPostingsReader>> {
    BlockTreeTermsReader::open(
        storage,
        &segment(),
        infos,
        SequentialPostingsReader::new(),
        &BlockTreeConfig::default(),
    )
}

/// Terms made of `len` letters from `a..=a+alphabet-1`, every combination.
pub fn all_words(alphabet: u8, len: usize) -> Vec<Vec<u8>> {
    let mut words = vec![Vec::new()];
    for _ in 0..len {
        words = words
            .into_iter()
            .flat_map(|w: Vec<u8>| {
                (0..alphabet).map(move |c| {
                    let mut next = w.clone();
                    next.push(b'a' + c);
                    next
                })
            })
            .collect();
    }
    words
}

/// The block shapes every layout-sensitive test runs against.
pub fn block_shapes() -> Vec<BlockTreeConfig> {
    vec![
        BlockTreeConfig::with_block_sizes(2, 3),
        BlockTreeConfig::with_block_sizes(2, 4),
        BlockTreeConfig::with_block_sizes(4, 8),
        BlockTreeConfig::default(),
    ]
}
