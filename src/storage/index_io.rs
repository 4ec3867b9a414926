//! Positioned, checksummed streams over storage files.

use std::io::{Read, Seek, SeekFrom, Write};

use crc32fast::Hasher;

use crate::error::{BlockTreeError, Result};
use crate::storage::data::{DataInput, DataOutput};
use crate::storage::traits::{StorageInput, StorageOutput};

/// An append-only output that tracks its position and a running CRC32 of
/// everything written.
#[derive(Debug)]
pub struct IndexOutput {
    name: String,
    out: Box<dyn StorageOutput>,
    hasher: Hasher,
    position: u64,
}

impl IndexOutput {
    /// Wrap a storage output.
    pub fn new(name: impl Into<String>, out: Box<dyn StorageOutput>) -> Self {
        IndexOutput {
            name: name.into(),
            out,
            hasher: Hasher::new(),
            position: 0,
        }
    }

    /// The file name this output writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// CRC32 of every byte written so far.
    pub fn checksum(&self) -> u64 {
        self.hasher.clone().finalize() as u64
    }

    /// Overwrite a u64 at an earlier offset, then return to the end.
    ///
    /// The running checksum does not cover the patched bytes, so this is only
    /// usable for layouts without a footer.
    pub(crate) fn patch_u64(&mut self, at: u64, value: u64) -> Result<()> {
        if at + 8 > self.position {
            return Err(BlockTreeError::invalid_argument(format!(
                "patch offset {at} is past the end of {}",
                self.name
            )));
        }
        self.out.seek(SeekFrom::Start(at))?;
        self.out.write_all(&value.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    /// Flush and publish the file.
    pub fn close(&mut self) -> Result<()> {
        self.out.flush()?;
        self.out.close()
    }
}

impl DataOutput for IndexOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.hasher.update(bytes);
        self.position += bytes.len() as u64;
        Ok(())
    }
}

/// A random-access input over one storage file.
#[derive(Debug)]
pub struct IndexInput {
    name: String,
    input: Box<dyn StorageInput>,
    position: u64,
    len: u64,
}

impl IndexInput {
    /// Wrap a storage input positioned at the start of the file.
    pub fn new(name: impl Into<String>, input: Box<dyn StorageInput>) -> Result<Self> {
        let len = input.size()?;
        Ok(IndexInput {
            name: name.into(),
            input,
            position: 0,
            len,
        })
    }

    /// The file name this input reads.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// File length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the file is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(BlockTreeError::corrupt(format!(
                "seek past EOF: pos={pos} length={} (resource={})",
                self.len, self.name
            )));
        }
        self.input.seek(SeekFrom::Start(pos))?;
        self.position = pos;
        Ok(())
    }

    /// Open an independent stream over the same bytes at the same position.
    pub fn clone_input(&self) -> Result<IndexInput> {
        Ok(IndexInput {
            name: self.name.clone(),
            input: self.input.clone_input()?,
            position: self.position,
            len: self.len,
        })
    }
}

impl DataInput for IndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_bytes(&mut b)?;
        Ok(b[0])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.position + buf.len() as u64 > self.len {
            return Err(BlockTreeError::corrupt(format!(
                "read past EOF: pos={} len={} length={} (resource={})",
                self.position,
                buf.len(),
                self.len,
                self.name
            )));
        }
        self.input.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }
}
