//! Primitive encoders shared by every stream in the dictionary layout.
//!
//! Fixed-width integers are little-endian; `vint`/`vlong` use the 7-bit
//! continuation encoding from [`crate::util::varint`].

use std::io;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{BlockTreeError, Result};
use crate::util::varint::{self, MAX_VARINT32_LEN, MAX_VARINT64_LEN};

/// A sink for encoded primitives.
pub trait DataOutput {
    /// Write a single byte.
    fn write_byte(&mut self, b: u8) -> Result<()>;

    /// Write a run of raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write a u32 value (little-endian).
    fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_bytes(&buf)
    }

    /// Write a u64 value (little-endian).
    fn write_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write_bytes(&buf)
    }

    /// Write a variable-length u32.
    fn write_vint(&mut self, value: u32) -> Result<()> {
        self.write_vlong(value as u64)
    }

    /// Write a variable-length u64.
    fn write_vlong(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT64_LEN];
        let len = varint::encode_u64_into(value, &mut buf);
        self.write_bytes(&buf[..len])
    }

    /// Write a string with a `vint` length prefix.
    fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let len = u32::try_from(bytes.len())
            .map_err(|_| BlockTreeError::invalid_argument("string too long"))?;
        self.write_vint(len)?;
        self.write_bytes(bytes)
    }
}

/// A source of encoded primitives.
pub trait DataInput {
    /// Read a single byte.
    fn read_byte(&mut self) -> Result<u8>;

    /// Fill `buf` completely.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Number of bytes left before the end of the input.
    fn remaining(&self) -> u64;

    /// Read a u32 value (little-endian).
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Read a u64 value (little-endian).
    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(LittleEndian::read_u64(&buf))
    }

    /// Read a variable-length u32.
    fn read_vint(&mut self) -> Result<u32> {
        let value = read_varint(self, MAX_VARINT32_LEN)?;
        u32::try_from(value).map_err(|_| BlockTreeError::corrupt("vint overflow"))
    }

    /// Read a variable-length u64.
    fn read_vlong(&mut self) -> Result<u64> {
        read_varint(self, MAX_VARINT64_LEN)
    }

    /// Read a string with a `vint` length prefix.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let mut bytes = vec![0u8; len];
        self.read_bytes(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| BlockTreeError::corrupt(format!("invalid string: {e}")))
    }
}

fn read_varint<I: DataInput + ?Sized>(input: &mut I, max_len: usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    for _ in 0..max_len {
        let byte = input.read_byte()?;
        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }

    Err(BlockTreeError::corrupt("varint overflow"))
}

fn past_end() -> BlockTreeError {
    io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of buffer").into()
}

impl DataOutput for Vec<u8> {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.push(b);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// A reusable, owned byte buffer read sequentially.
///
/// Frames keep one of these per blob (suffixes, stats, metadata, floor data)
/// and refill it on every block load; the allocation grows and is reused.
#[derive(Debug, Default, Clone)]
pub struct BytesReader {
    bytes: Vec<u8>,
    pos: usize,
}

impl BytesReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader over `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        BytesReader { bytes, pos: 0 }
    }

    /// Replace the contents with a copy of `data` and rewind.
    pub fn reset(&mut self, data: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(data);
        self.pos = 0;
    }

    /// Replace the contents with `len` bytes read from `input` and rewind.
    pub fn fill_from<I: DataInput + ?Sized>(&mut self, input: &mut I, len: usize) -> Result<()> {
        let remaining = input.remaining();
        if len as u64 > remaining {
            return Err(BlockTreeError::corrupt(format!(
                "blob length {len} exceeds remaining {remaining} bytes"
            )));
        }
        self.bytes.resize(len, 0);
        self.pos = 0;
        input.read_bytes(&mut self.bytes)
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the read position; `pos` may equal the length.
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.bytes.len() {
            return Err(past_end());
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.set_position(self.pos + n)
    }

    /// Total number of bytes held.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the reader holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true once every byte has been consumed.
    pub fn eof(&self) -> bool {
        self.pos == self.bytes.len()
    }

    /// All bytes held, regardless of position.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow `len` bytes starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> Result<&[u8]> {
        self.bytes.get(start..start + len).ok_or_else(past_end)
    }
}

impl DataInput for BytesReader {
    fn read_byte(&mut self) -> Result<u8> {
        let b = *self.bytes.get(self.pos).ok_or_else(past_end)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        let src = self.bytes.get(self.pos..end).ok_or_else(past_end)?;
        buf.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.bytes.len().saturating_sub(self.pos) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_round_trip() {
        let mut out = Vec::new();
        out.write_byte(7).unwrap();
        out.write_u32(0xDEAD_BEEF).unwrap();
        out.write_u64(u64::MAX - 1).unwrap();
        out.write_vint(300).unwrap();
        out.write_vlong(1 << 40).unwrap();
        out.write_string("BLOCK_TREE_TERMS_DICT").unwrap();

        let mut reader = BytesReader::from_vec(out);
        assert_eq!(reader.read_byte().unwrap(), 7);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(reader.read_vint().unwrap(), 300);
        assert_eq!(reader.read_vlong().unwrap(), 1 << 40);
        assert_eq!(reader.read_string().unwrap(), "BLOCK_TREE_TERMS_DICT");
        assert!(reader.eof());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut out = Vec::new();
        out.write_u32(1).unwrap();
        assert_eq!(out, vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_read_past_end_is_corruption() {
        let mut reader = BytesReader::from_vec(vec![0x80]);
        let err = reader.read_vint().unwrap_err();
        assert!(err.is_corruption());

        let mut reader = BytesReader::from_vec(vec![1, 2]);
        let mut buf = [0u8; 3];
        assert!(reader.read_bytes(&mut buf).unwrap_err().is_corruption());
    }

    #[test]
    fn test_reset_reuses_buffer() {
        let mut reader = BytesReader::new();
        reader.reset(b"abc");
        reader.skip(2).unwrap();
        assert_eq!(reader.read_byte().unwrap(), b'c');

        reader.reset(b"xy");
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.slice(1, 1).unwrap(), b"y");
        assert!(reader.set_position(3).is_err());
    }

    #[test]
    fn test_fill_from_rejects_oversized_length() {
        let mut source = BytesReader::from_vec(vec![1, 2, 3, 4]);
        let mut blob = BytesReader::new();

        let err = blob.fill_from(&mut source, u32::MAX as usize).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(blob.len(), 0);

        source.skip(1).unwrap();
        blob.fill_from(&mut source, 3).unwrap();
        assert_eq!(blob.slice(0, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(source.remaining(), 0);
    }
}
