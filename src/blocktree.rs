//! Block-tree terms dictionary.
//!
//! Terms of each field are stored in sorted order, grouped into blocks that
//! share a prefix. Blocks nest: an entry of a block is either a term suffix
//! or a pointer to a sub-block with a longer prefix. A per-field FST maps
//! every block prefix to the block's file pointer, so a lookup follows the
//! index as far as the target matches a prefix and then scans one block.
//!
//! # Example
//!
//! ```
//! use blocktree::blocktree::{BlockTreeConfig, BlockTreeTermsReader, BlockTreeTermsWriter};
//! use blocktree::blocktree::{SeekTermsEnum, Terms, TermsEnum};
//! use blocktree::postings::{SequentialPostingsReader, SequentialPostingsWriter, TermStats};
//! use blocktree::segment::{FieldInfo, FieldInfos, IndexOptions, SegmentInfo};
//! use blocktree::storage::MemoryStorage;
//!
//! # fn main() -> blocktree::error::Result<()> {
//! let storage = MemoryStorage::new();
//! let segment = SegmentInfo::new("_0", 3);
//! let infos = FieldInfos::new(vec![FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs)])?;
//!
//! let mut writer = BlockTreeTermsWriter::new(
//!     &storage,
//!     &segment,
//!     SequentialPostingsWriter::new(),
//!     BlockTreeConfig::default(),
//! )?;
//! let mut field = writer.add_field(infos.by_name("body").unwrap())?;
//! for term in ["apple", "banana", "cherry"] {
//!     field.add_term(term.as_bytes(), TermStats::new(1, 1))?;
//! }
//! field.finish(3, 3, 3)?;
//! writer.close()?;
//!
//! let reader = BlockTreeTermsReader::open(
//!     &storage,
//!     &segment,
//!     &infos,
//!     SequentialPostingsReader::new(),
//!     &BlockTreeConfig::default(),
//! )?;
//! let body = reader.field("body").unwrap();
//! let mut cursor = body.iterator();
//! assert!(cursor.seek_exact(b"banana")?);
//! assert_eq!(cursor.next()?, Some(&b"cherry"[..]));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod field_reader;
mod frame;
mod frontier;
pub mod header;
pub mod index;
pub mod intersect;
mod pending;
pub mod reader;
pub mod stats;
pub mod terms;
pub mod writer;

pub use config::BlockTreeConfig;
pub use cursor::TermCursor;
pub use field_reader::FieldReader;
pub use header::{HeaderCodec, VERSION_CURRENT};
pub use index::TermsIndex;
pub use intersect::IntersectCursor;
pub use reader::BlockTreeTermsReader;
pub use stats::Stats;
pub use terms::{SeekStatus, SeekTermsEnum, Terms, TermsEnum};
pub use writer::{BlockTreeTermsWriter, TermsWriter};
