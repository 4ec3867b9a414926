//! # BlockTree
//!
//! A block-based term dictionary for inverted indexes.
//!
//! ## Features
//!
//! - Sorted terms grouped into prefix-sharing blocks, with floor blocks for
//!   large prefixes
//! - An FST prefix index per field for one-block lookups
//! - Seekable term cursors with exact and ceiling seeks
//! - Automaton intersection (term sets, prefixes, wildcards, fuzzy terms)
//! - Pluggable postings codecs and storage backends
//! - Checksummed files, with read support for every older on-disk version

pub mod automaton;
pub mod blocktree;
pub mod error;
pub mod postings;
pub mod segment;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::automaton::CompiledAutomaton;
    pub use crate::blocktree::{
        BlockTreeConfig, BlockTreeTermsReader, BlockTreeTermsWriter, FieldReader, SeekStatus, SeekTermsEnum,
        Terms, TermsEnum,
    };
    pub use crate::error::{BlockTreeError, Result};
    pub use crate::postings::{
        BlockTermState, PostingsReader, PostingsWriter, SequentialPostingsReader, SequentialPostingsWriter,
        TermStats,
    };
    pub use crate::segment::{FieldInfo, FieldInfos, IndexOptions, SegmentInfo};
    pub use crate::storage::{FileStorage, MemoryStorage, Storage, StorageConfig};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
