//! Variable-length integer encoding utilities.
//!
//! Values are stored 7 bits per byte, least significant group first, with the
//! high bit of each byte set while more bytes follow. This is the `vint` /
//! `vlong` encoding used throughout the term dictionary layout.

use std::io::Read;

use byteorder::ReadBytesExt;

use crate::error::{BlockTreeError, Result};

/// Maximum encoded length of a u32.
pub const MAX_VARINT32_LEN: usize = 5;

/// Maximum encoded length of a u64.
pub const MAX_VARINT64_LEN: usize = 10;

/// Encode a u64 into `buf`, returning the number of bytes used.
pub fn encode_u64_into(value: u64, buf: &mut [u8; MAX_VARINT64_LEN]) -> usize {
    let mut val = value;
    let mut len = 0;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf[len] = byte;
        len += 1;

        if val == 0 {
            return len;
        }
    }
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Decode a u32 value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, read) = decode_bounded(bytes, MAX_VARINT32_LEN)?;
    let value = u32::try_from(value).map_err(|_| BlockTreeError::corrupt("VarInt overflow"))?;
    Ok((value, read))
}

/// Decode a u64 value from the front of `bytes`.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    decode_bounded(bytes, MAX_VARINT64_LEN)
}

fn decode_bounded(bytes: &[u8], max_len: usize) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i >= max_len {
            return Err(BlockTreeError::corrupt("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(BlockTreeError::corrupt("Incomplete VarInt"))
}

/// Read a variable-length encoded u32 from a reader.
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let value = read_bounded(reader, MAX_VARINT32_LEN)?;
    u32::try_from(value).map_err(|_| BlockTreeError::corrupt("VarInt overflow"))
}

/// Read a variable-length encoded u64 from a reader.
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    read_bounded(reader, MAX_VARINT64_LEN)
}

fn read_bounded<R: Read>(reader: &mut R, max_len: usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    for _ in 0..max_len {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }

    Err(BlockTreeError::corrupt("VarInt overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = [0u8; MAX_VARINT64_LEN];
        let len = encode_u64_into(value, &mut buf);
        buf[..len].to_vec()
    }

    #[test]
    fn test_encode_decode_u64() {
        let test_values = [0, 1, 127, 128, 255, 256, 16383, 16384, u64::MAX];

        for &value in &test_values {
            let encoded = encode(value);
            let (decoded, bytes_read) = decode_u64(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
            assert_eq!(encoded_len(value), encoded.len());
        }
    }

    #[test]
    fn test_read_u32_from_reader() {
        let encoded = encode(12345);
        let mut cursor = Cursor::new(encoded);
        assert_eq!(read_u32(&mut cursor).unwrap(), 12345);
    }

    #[test]
    fn test_encoding_efficiency() {
        assert_eq!(encode(0).len(), 1);
        assert_eq!(encode(127).len(), 1);
        assert_eq!(encode(128).len(), 2);
        assert_eq!(encode(16383).len(), 2);
        assert_eq!(encode(16384).len(), 3);
        assert_eq!(encode(u32::MAX as u64).len(), MAX_VARINT32_LEN);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT64_LEN);
    }

    #[test]
    fn test_incomplete_varint() {
        let incomplete = vec![0x80];
        assert!(decode_u32(&incomplete).is_err());
        assert!(decode_u64(&incomplete).is_err());

        let mut cursor = Cursor::new(incomplete);
        assert!(read_u64(&mut cursor).unwrap_err().is_corruption());
    }

    #[test]
    fn test_overflow() {
        let overflow_data = vec![0xFF; 11];
        assert!(decode_u32(&overflow_data).is_err());
        assert!(decode_u64(&overflow_data).is_err());

        // Five bytes that do not fit in 32 bits.
        let wide = encode(u32::MAX as u64 + 1);
        assert!(decode_u32(&wide).is_err());
    }
}
