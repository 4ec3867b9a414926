//! Segment and field descriptors consumed by the term dictionary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{BlockTreeError, Result};

/// File extension of the block-tree terms dictionary.
pub const TERMS_EXTENSION: &str = "tim";

/// File extension of the block-tree terms index.
pub const TERMS_INDEX_EXTENSION: &str = "tip";

/// What is recorded in the postings of a field.
///
/// Variants are ordered: each one records everything the previous one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexOptions {
    /// Only document ids; term frequencies are omitted.
    DocsOnly,
    /// Documents and term frequencies.
    DocsAndFreqs,
    /// Documents, frequencies and positions.
    DocsAndFreqsAndPositions,
    /// Documents, frequencies, positions and character offsets.
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    /// Returns true if term frequencies are tracked.
    pub fn has_freqs(self) -> bool {
        self >= IndexOptions::DocsAndFreqs
    }

    /// Returns true if positions are tracked.
    pub fn has_positions(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositions
    }

    /// Returns true if offsets are tracked.
    pub fn has_offsets(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }
}

/// Per-field metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Field number, unique within a segment.
    pub number: u32,
    /// What the postings of this field record.
    pub index_options: IndexOptions,
    /// Whether positions carry payloads.
    pub has_payloads: bool,
}

impl FieldInfo {
    /// Create a field without payloads.
    pub fn new(name: impl Into<String>, number: u32, index_options: IndexOptions) -> Self {
        FieldInfo {
            name: name.into(),
            number,
            index_options,
            has_payloads: false,
        }
    }

    /// Mark the field as carrying payloads.
    pub fn with_payloads(mut self) -> Self {
        self.has_payloads = true;
        self
    }
}

/// The set of fields of one segment, addressable by number and by name.
#[derive(Debug, Clone, Default)]
pub struct FieldInfos {
    fields: Vec<FieldInfo>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl FieldInfos {
    /// Build from a list of fields; names and numbers must be unique.
    pub fn new(fields: Vec<FieldInfo>) -> Result<Self> {
        let mut infos = FieldInfos::default();
        for field in fields {
            infos.add(field)?;
        }
        Ok(infos)
    }

    /// Add a field.
    pub fn add(&mut self, field: FieldInfo) -> Result<()> {
        if self.by_number.contains_key(&field.number) {
            return Err(BlockTreeError::invalid_argument(format!(
                "duplicate field number: {}",
                field.number
            )));
        }
        if self.by_name.contains_key(&field.name) {
            return Err(BlockTreeError::invalid_argument(format!(
                "duplicate field name: {}",
                field.name
            )));
        }

        let idx = self.fields.len();
        self.by_number.insert(field.number, idx);
        self.by_name.insert(field.name.clone(), idx);
        self.fields.push(field);
        Ok(())
    }

    /// Look up a field by number.
    pub fn by_number(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&number).map(|&idx| &self.fields[idx])
    }

    /// Look up a field by name.
    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter()
    }
}

/// Identity and size of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Segment name, the prefix of all its files.
    pub name: String,
    /// Optional suffix distinguishing several dictionaries in one segment.
    pub suffix: String,
    /// Number of documents in the segment.
    pub doc_count: u32,
}

impl SegmentInfo {
    /// Create a segment descriptor without a suffix.
    pub fn new(name: impl Into<String>, doc_count: u32) -> Self {
        SegmentInfo {
            name: name.into(),
            suffix: String::new(),
            doc_count,
        }
    }

    /// Set the file suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Name of this segment's file with the given extension.
    pub fn file_name(&self, ext: &str) -> String {
        segment_file_name(&self.name, &self.suffix, ext)
    }
}

/// Build a per-segment file name: `name[_suffix][.ext]`.
pub fn segment_file_name(name: &str, suffix: &str, ext: &str) -> String {
    let mut file_name = String::with_capacity(name.len() + suffix.len() + ext.len() + 2);
    file_name.push_str(name);
    if !suffix.is_empty() {
        file_name.push('_');
        file_name.push_str(suffix);
    }
    if !ext.is_empty() {
        file_name.push('.');
        file_name.push_str(ext);
    }
    file_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_options_ordering() {
        assert!(!IndexOptions::DocsOnly.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(!IndexOptions::DocsAndFreqs.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositions.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositionsAndOffsets.has_offsets());
    }

    #[test]
    fn test_field_infos_lookup() {
        let infos = FieldInfos::new(vec![
            FieldInfo::new("title", 0, IndexOptions::DocsAndFreqs),
            FieldInfo::new("body", 1, IndexOptions::DocsAndFreqsAndPositions),
        ])
        .unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos.by_number(1).unwrap().name, "body");
        assert_eq!(infos.by_name("title").unwrap().number, 0);
        assert!(infos.by_number(7).is_none());
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let mut infos = FieldInfos::default();
        infos.add(FieldInfo::new("a", 0, IndexOptions::DocsOnly)).unwrap();
        assert!(infos.add(FieldInfo::new("b", 0, IndexOptions::DocsOnly)).is_err());
        assert!(infos.add(FieldInfo::new("a", 1, IndexOptions::DocsOnly)).is_err());
    }

    #[test]
    fn test_segment_file_name() {
        assert_eq!(segment_file_name("_0", "", TERMS_EXTENSION), "_0.tim");
        assert_eq!(segment_file_name("_0", "BlockTree_0", "tip"), "_0_BlockTree_0.tip");
        assert_eq!(segment_file_name("_0", "", ""), "_0");

        let info = SegmentInfo::new("_3", 10).with_suffix("x");
        assert_eq!(info.file_name(TERMS_INDEX_EXTENSION), "_3_x.tip");
    }
}
