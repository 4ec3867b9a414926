//! Configuration for the block-tree writer and reader.

use serde::{Deserialize, Serialize};

use crate::error::{BlockTreeError, Result};

/// Suggested default for `min_items_in_block`.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 25;

/// Suggested default for `max_items_in_block`.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 48;

/// Block shape and open-time verification settings.
///
/// The block sizes only affect writing; a reader accepts dictionaries
/// written with any valid shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockTreeConfig {
    /// Minimum number of entries a block is flushed with.
    ///
    /// Prefixes shared by fewer entries are folded into the parent block.
    /// Only the last block of a floor group may be smaller.
    pub min_items_in_block: usize,

    /// Maximum number of entries in one block.
    ///
    /// Larger groups are split into floor blocks keyed by their first
    /// suffix byte.
    pub max_items_in_block: usize,

    /// Whether to verify the checksum of both files when a reader opens.
    ///
    /// When disabled only the small terms index is fully verified; the
    /// dictionary's footer is still structurally checked.
    pub verify_checksums_on_open: bool,
}

impl Default for BlockTreeConfig {
    fn default() -> Self {
        BlockTreeConfig {
            min_items_in_block: DEFAULT_MIN_BLOCK_SIZE,
            max_items_in_block: DEFAULT_MAX_BLOCK_SIZE,
            verify_checksums_on_open: true,
        }
    }
}

impl BlockTreeConfig {
    /// Create a config with the given block sizes.
    pub fn with_block_sizes(min_items_in_block: usize, max_items_in_block: usize) -> Self {
        BlockTreeConfig {
            min_items_in_block,
            max_items_in_block,
            ..Default::default()
        }
    }

    /// Check the block-size constraints.
    pub fn validate(&self) -> Result<()> {
        let min = self.min_items_in_block;
        let max = self.max_items_in_block;

        if min <= 1 {
            return Err(BlockTreeError::invalid_argument(format!(
                "minItemsInBlock must be >= 2; got {min}"
            )));
        }
        if max == 0 {
            return Err(BlockTreeError::invalid_argument(format!(
                "maxItemsInBlock must be >= 1; got {max}"
            )));
        }
        if min > max {
            return Err(BlockTreeError::invalid_argument(format!(
                "maxItemsInBlock must be >= minItemsInBlock; got maxItemsInBlock={max} minItemsInBlock={min}"
            )));
        }
        if 2 * (min - 1) > max {
            return Err(BlockTreeError::invalid_argument(format!(
                "maxItemsInBlock must be at least 2*(minItemsInBlock-1); got maxItemsInBlock={max} minItemsInBlock={min}"
            )));
        }
        Ok(())
    }
}
