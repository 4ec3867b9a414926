//! Storage abstraction layer for the term dictionary.
//!
//! The dictionary writes two append-only files per segment and reads them
//! back through cloneable, random-access inputs. Backends are pluggable, so
//! the same writer and reader run against memory (tests) or the file system.
//!
//! # Architecture
//!
//! - **Storage trait**: unified interface for all storage backends
//! - **IndexOutput / IndexInput**: positioned streams with running checksums
//! - **DataOutput / DataInput**: little-endian and variable-length primitives
//! - **codec**: header and footer framing shared by every file
//!
//! # Example
//!
//! ```
//! use blocktree::storage::{DataInput, DataOutput, IndexInput, IndexOutput, MemoryStorage, Storage};
//!
//! # fn main() -> blocktree::error::Result<()> {
//! let storage = MemoryStorage::new();
//!
//! let mut out = IndexOutput::new("_0.tim", storage.create_output("_0.tim")?);
//! out.write_vint(300)?;
//! out.write_string("term")?;
//! out.close()?;
//!
//! let mut input = IndexInput::new("_0.tim", storage.open_input("_0.tim")?)?;
//! assert_eq!(input.read_vint()?, 300);
//! assert_eq!(input.read_string()?, "term");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod data;
pub mod file;
pub mod index_io;
pub mod memory;
pub mod traits;

pub use data::{BytesReader, DataInput, DataOutput};
pub use file::FileStorage;
pub use index_io::{IndexInput, IndexOutput};
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};
