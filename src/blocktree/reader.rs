//! Reader of a segment's terms dictionary and index.
//!
//! Opening reads both headers, the field directory and every field's prefix
//! index. Blocks are read lazily by the cursors of each [`FieldReader`].

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::blocktree::config::BlockTreeConfig;
use crate::blocktree::field_reader::{FieldMeta, FieldReader};
use crate::blocktree::header::{HeaderCodec, TERMS_CODEC_NAME, TERMS_INDEX_CODEC_NAME, read_header};
use crate::error::{BlockTreeError, Result};
use crate::postings::PostingsReader;
use crate::segment::{FieldInfos, IndexOptions, SegmentInfo, TERMS_EXTENSION, TERMS_INDEX_EXTENSION};
use crate::storage::codec;
use crate::storage::{DataInput, IndexInput, Storage};

/// Read access to every field of a segment's terms dictionary.
#[derive(Debug)]
pub struct BlockTreeTermsReader<P: PostingsReader> {
    segment: String,
    version: u32,
    has_footer: bool,
    dict: Arc<IndexInput>,
    postings: Arc<P>,
    fields: BTreeMap<String, FieldReader<P>>,
}

impl<P: PostingsReader> BlockTreeTermsReader<P> {
    /// Open the `.tim` and `.tip` files of `segment`.
    ///
    /// `field_infos` resolves the field numbers stored in the directory;
    /// `postings` is initialized from the dictionary stream.
    pub fn open(
        storage: &dyn Storage,
        segment: &SegmentInfo,
        field_infos: &FieldInfos,
        mut postings: P,
        config: &BlockTreeConfig,
    ) -> Result<Self> {
        let terms_name = segment.file_name(TERMS_EXTENSION);
        let mut dict = IndexInput::new(&terms_name, storage.open_input(&terms_name)?)?;
        let (header, dir_offset) = read_header(&mut dict, TERMS_CODEC_NAME)?;

        let index_name = segment.file_name(TERMS_INDEX_EXTENSION);
        let mut index_in = IndexInput::new(&index_name, storage.open_input(&index_name)?)?;
        let (index_header, index_dir_offset) = read_header(&mut index_in, TERMS_INDEX_CODEC_NAME)?;

        if index_header.version() != header.version() {
            return Err(BlockTreeError::corrupt(format!(
                "mixmatched version files: {terms_name}={} {index_name}={}",
                header.version(),
                index_header.version()
            )));
        }

        if header.has_footer() {
            // The index is loaded whole, so it is always verified.
            codec::checksum_entire_file(&index_in)?;
            if config.verify_checksums_on_open {
                codec::checksum_entire_file(&dict)?;
            } else {
                codec::retrieve_checksum(&mut dict.clone_input()?)?;
            }
        }

        postings.init(&mut dict)?;

        header.seek_dir(&mut dict, dir_offset)?;
        index_header.seek_dir(&mut index_in, index_dir_offset)?;
        let metas = read_directory(&mut dict, &mut index_in, header, field_infos, segment)?;
        check_fully_read(&dict, header)?;
        check_fully_read(&index_in, index_header)?;

        let dict = Arc::new(dict);
        let postings = Arc::new(postings);
        let mut fields = BTreeMap::new();
        for meta in metas {
            let name = meta.info.name.clone();
            let reader = FieldReader::new(meta, &segment.name, &index_in, Arc::clone(&dict), Arc::clone(&postings))?;
            fields.insert(name, reader);
        }

        debug!(
            "opened terms dictionary {terms_name} (version {}): {} fields",
            header.version(),
            fields.len()
        );

        Ok(BlockTreeTermsReader {
            segment: segment.name.clone(),
            version: header.version(),
            has_footer: header.has_footer(),
            dict,
            postings,
            fields,
        })
    }

    /// Name of the segment.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// On-disk version of the files.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The terms of `name`, if the field has any.
    pub fn field(&self, name: &str) -> Option<&FieldReader<P>> {
        self.fields.get(name)
    }

    /// Names of the fields with terms, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields with terms.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field has terms.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The postings reader shared by all fields.
    pub fn postings(&self) -> &P {
        &self.postings
    }

    /// Verify the dictionary checksum and the postings codec's files.
    pub fn check_integrity(&self) -> Result<()> {
        if self.has_footer {
            codec::checksum_entire_file(&self.dict)?;
        }
        self.postings.check_integrity()
    }
}

fn read_directory(
    dict: &mut IndexInput,
    index_in: &mut IndexInput,
    header: &dyn HeaderCodec,
    field_infos: &FieldInfos,
    segment: &SegmentInfo,
) -> Result<Vec<FieldMeta>> {
    let num_fields = dict.read_vint()? as usize;
    if num_fields > field_infos.len() {
        return Err(BlockTreeError::corrupt(format!(
            "invalid numFields: {num_fields} (resource={})",
            dict.name()
        )));
    }

    let mut metas: Vec<FieldMeta> = Vec::with_capacity(num_fields);
    for _ in 0..num_fields {
        let number = dict.read_vint()?;
        let num_terms = dict.read_vlong()?;
        if num_terms == 0 {
            return Err(BlockTreeError::corrupt(format!(
                "illegal numTerms for field number: {number} (resource={})",
                dict.name()
            )));
        }

        let root_code_len = dict.read_vint()? as usize;
        if root_code_len == 0 || root_code_len as u64 > dict.len() - dict.position() {
            return Err(BlockTreeError::corrupt(format!(
                "invalid root code length {root_code_len} for field number {number} (resource={})",
                dict.name()
            )));
        }
        let mut root_code = vec![0u8; root_code_len];
        dict.read_bytes(&mut root_code)?;

        let info = field_infos.by_number(number).ok_or_else(|| {
            BlockTreeError::corrupt(format!("unknown field number {number} (resource={})", dict.name()))
        })?;

        let sum_total_term_freq = if info.index_options == IndexOptions::DocsOnly {
            -1
        } else {
            dict.read_vlong()? as i64
        };
        let sum_doc_freq = dict.read_vlong()?;
        let doc_count = dict.read_vint()?;
        let longs_size = if header.has_metadata_arity() {
            dict.read_vint()? as usize
        } else {
            0
        };

        if doc_count > segment.doc_count {
            return Err(BlockTreeError::corrupt(format!(
                "invalid docCount: {doc_count} maxDoc: {} (resource={})",
                segment.doc_count,
                dict.name()
            )));
        }
        if sum_doc_freq < doc_count as u64 {
            return Err(BlockTreeError::corrupt(format!(
                "invalid sumDocFreq: {sum_doc_freq} docCount: {doc_count} (resource={})",
                dict.name()
            )));
        }
        if sum_total_term_freq != -1 && sum_total_term_freq < sum_doc_freq as i64 {
            return Err(BlockTreeError::corrupt(format!(
                "invalid sumTotalTermFreq: {sum_total_term_freq} sumDocFreq: {sum_doc_freq} (resource={})",
                dict.name()
            )));
        }

        let index_start_fp = index_in.read_vlong()?;

        if metas.iter().any(|m| m.info.number == number) {
            return Err(BlockTreeError::corrupt(format!(
                "duplicate field: {} (resource={})",
                info.name,
                dict.name()
            )));
        }
        metas.push(FieldMeta {
            info: info.clone(),
            num_terms,
            root_code,
            sum_total_term_freq,
            sum_doc_freq,
            doc_count,
            index_start_fp,
            longs_size,
        });
    }
    Ok(metas)
}

/// Fail unless exactly the version's trailer follows the directory.
fn check_fully_read(input: &IndexInput, header: &dyn HeaderCodec) -> Result<()> {
    let remaining = input.len().saturating_sub(input.position());
    if remaining != header.trailer_length() {
        return Err(BlockTreeError::corrupt(format!(
            "unread bytes after the field directory: {} (resource={})",
            remaining as i64 - header.trailer_length() as i64,
            input.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocktree::header::{
        VERSION_APPEND_ONLY, VERSION_CHECKSUM, VERSION_META_ARRAY, VERSION_START, header_codec,
    };
    use crate::blocktree::terms::{Terms, TermsEnum};
    use crate::blocktree::writer::BlockTreeTermsWriter;
    use crate::postings::{
        BlockTermState, PostingsWriter, SequentialPostingsReader, SequentialPostingsWriter, TermStats,
    };
    use crate::segment::FieldInfo;
    use crate::storage::{BytesReader, IndexOutput, MemoryStorage};

    /// A codec without metadata, writable by every on-disk version.
    #[derive(Debug, Default)]
    struct NoMetadata;

    impl PostingsWriter for NoMetadata {
        type State = ();

        fn init(&mut self, _terms_out: &mut IndexOutput) -> Result<()> {
            Ok(())
        }

        fn set_field(&mut self, _field: &FieldInfo) -> usize {
            0
        }

        fn start_term(&mut self) {}

        fn finish_term(&mut self, _state: &mut BlockTermState<()>) -> Result<()> {
            Ok(())
        }

        fn encode_term(
            &mut self,
            _longs: &mut [u64],
            _out: &mut Vec<u8>,
            _field: &FieldInfo,
            _state: &BlockTermState<()>,
            _absolute: bool,
        ) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl PostingsReader for NoMetadata {
        type State = ();

        fn init(&mut self, _terms_in: &mut IndexInput) -> Result<()> {
            Ok(())
        }

        fn decode_term(
            &self,
            _longs: &[u64],
            _input: &mut BytesReader,
            _field: &FieldInfo,
            _state: &mut BlockTermState<()>,
            _absolute: bool,
        ) -> Result<()> {
            Ok(())
        }

        fn check_integrity(&self) -> Result<()> {
            Ok(())
        }
    }

    fn field_infos() -> FieldInfos {
        FieldInfos::new(vec![
            FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs),
            FieldInfo::new("id", 1, IndexOptions::DocsOnly),
        ])
        .unwrap()
    }

    fn terms(n: usize) -> Vec<Vec<u8>> {
        let mut terms: Vec<Vec<u8>> = (0..n).map(|i| format!("t{i:04}").into_bytes()).collect();
        terms.sort();
        terms
    }

    fn write_segment<W: PostingsWriter>(
        storage: &MemoryStorage,
        segment: &SegmentInfo,
        postings: W,
        header: &'static dyn HeaderCodec,
    ) {
        let infos = field_infos();
        let config = BlockTreeConfig::with_block_sizes(4, 8);
        let mut writer = BlockTreeTermsWriter::with_header(storage, segment, postings, config, header).unwrap();

        let body = infos.by_name("body").unwrap();
        let mut field = writer.add_field(body).unwrap();
        for term in terms(100) {
            field.add_term(&term, TermStats::new(2, 5)).unwrap();
        }
        field.finish(500, 200, 10).unwrap();

        let id = infos.by_name("id").unwrap();
        let mut field = writer.add_field(id).unwrap();
        field.add_term(b"only", TermStats::new(1, -1)).unwrap();
        field.finish(-1, 1, 1).unwrap();

        writer.close().unwrap();
    }

    #[test]
    fn test_open_reads_directory() {
        let storage = MemoryStorage::new();
        let segment = SegmentInfo::new("_0", 10);
        write_segment(&storage, &segment, SequentialPostingsWriter::new(), header_codec(VERSION_CHECKSUM).unwrap());

        let reader = BlockTreeTermsReader::open(
            &storage,
            &segment,
            &field_infos(),
            SequentialPostingsReader::new(),
            &BlockTreeConfig::default(),
        )
        .unwrap();
        assert_eq!(reader.version(), VERSION_CHECKSUM);
        assert_eq!(reader.fields().collect::<Vec<_>>(), vec!["body", "id"]);

        let body = reader.field("body").unwrap();
        assert_eq!(body.size(), 100);
        assert_eq!(body.sum_doc_freq(), 200);
        assert_eq!(body.sum_total_term_freq(), 500);
        assert_eq!(body.doc_count(), 10);
        assert!(body.has_freqs());
        assert!(!body.has_positions());
        assert_eq!(body.longs_size(), 1);

        let id = reader.field("id").unwrap();
        assert_eq!(id.sum_total_term_freq(), -1);
        assert!(!id.has_freqs());
        assert!(reader.field("missing").is_none());

        reader.check_integrity().unwrap();
    }

    #[test]
    fn test_every_version_reads_back() {
        for version in [VERSION_START, VERSION_APPEND_ONLY, VERSION_META_ARRAY, VERSION_CHECKSUM] {
            let storage = MemoryStorage::new();
            let segment = SegmentInfo::new("_0", 10);
            write_segment(&storage, &segment, NoMetadata, header_codec(version).unwrap());

            let reader =
                BlockTreeTermsReader::open(&storage, &segment, &field_infos(), NoMetadata, &BlockTreeConfig::default())
                    .unwrap();
            assert_eq!(reader.version(), version);

            let body = reader.field("body").unwrap();
            let mut cursor = body.iterator();
            let mut read = Vec::new();
            while let Some(term) = cursor.next().unwrap() {
                read.push(term.to_vec());
                assert_eq!(cursor.doc_freq().unwrap(), 2, "version {version}");
            }
            assert_eq!(read, terms(100), "version {version}");
        }
    }

    #[test]
    fn test_mismatched_versions_are_corrupt() {
        let storage = MemoryStorage::new();
        let current = SegmentInfo::new("_0", 10);
        let old = SegmentInfo::new("_1", 10);
        write_segment(&storage, &current, NoMetadata, header_codec(VERSION_CHECKSUM).unwrap());
        write_segment(&storage, &old, NoMetadata, header_codec(VERSION_APPEND_ONLY).unwrap());

        let old_index = storage.read_file(&old.file_name(TERMS_INDEX_EXTENSION)).unwrap();
        storage.write_file(&current.file_name(TERMS_INDEX_EXTENSION), old_index);

        let err = BlockTreeTermsReader::open(&storage, &current, &field_infos(), NoMetadata, &BlockTreeConfig::default())
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_unknown_field_is_corrupt() {
        let storage = MemoryStorage::new();
        let segment = SegmentInfo::new("_0", 10);
        write_segment(&storage, &segment, NoMetadata, header_codec(VERSION_CHECKSUM).unwrap());

        let infos = FieldInfos::new(vec![FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs)]).unwrap();
        let err = BlockTreeTermsReader::open(&storage, &segment, &infos, NoMetadata, &BlockTreeConfig::default())
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_too_small_max_doc_is_corrupt() {
        let storage = MemoryStorage::new();
        let segment = SegmentInfo::new("_0", 10);
        write_segment(&storage, &segment, NoMetadata, header_codec(VERSION_CHECKSUM).unwrap());

        let smaller = SegmentInfo::new("_0", 5);
        let err = BlockTreeTermsReader::open(&storage, &smaller, &field_infos(), NoMetadata, &BlockTreeConfig::default())
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_check_integrity_catches_damage_skipped_at_open() {
        let storage = MemoryStorage::new();
        let segment = SegmentInfo::new("_0", 10);
        write_segment(&storage, &segment, NoMetadata, header_codec(VERSION_CHECKSUM).unwrap());

        // Damage a suffix byte inside the first block.
        let name = segment.file_name(TERMS_EXTENSION);
        let mut bytes = storage.read_file(&name).unwrap();
        let at = codec::header_length(TERMS_CODEC_NAME) as usize + 4;
        bytes[at] ^= 0x01;
        storage.write_file(&name, bytes);

        let lenient = BlockTreeConfig {
            verify_checksums_on_open: false,
            ..Default::default()
        };
        let reader = BlockTreeTermsReader::open(&storage, &segment, &field_infos(), NoMetadata, &lenient).unwrap();
        assert!(reader.check_integrity().unwrap_err().is_corruption());

        let err = BlockTreeTermsReader::open(&storage, &segment, &field_infos(), NoMetadata, &BlockTreeConfig::default())
            .unwrap_err();
        assert!(err.is_corruption());
    }
}
