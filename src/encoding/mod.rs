//! Varint and fixed-width integer codecs shared by the on-disk formats
//! (component B, byte-codec half — see [`crate::error`] for the status
//! half of component B).
//!
//! The block/table formats pack small integers (restart offsets, block
//! handles, entry shared/non-shared lengths) as variable-length integers
//! rather than fixed-width ones, to keep small blocks small, while a few
//! fields that are always a fixed width on disk (restart counts, footer
//! fields, WAL record headers) use the plain little-endian helpers
//! instead. Grounded on `util/coding.h`.
//!
//! All multi-byte fixed-width integers are little-endian. Varints use
//! the standard LEB128-style encoding: 7 data bits per byte, with the
//! high bit set on every byte but the last.

#[cfg(test)]
mod tests;

use thiserror::Error;

/// Errors produced decoding a varint or fixed-width integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A varint ran past its type's maximum encoded length without its
    /// continuation bit ever clearing.
    #[error("varint too long")]
    VarintTooLong,
}

#[inline]
fn require(buf: &[u8], needed: usize) -> Result<(), EncodingError> {
    if buf.len() < needed {
        Err(EncodingError::UnexpectedEof { needed, available: buf.len() })
    } else {
        Ok(())
    }
}

/// Maximum number of bytes a varint-encoded `u32` can occupy.
pub const MAX_VARINT32_BYTES: usize = 5;

/// Maximum number of bytes a varint-encoded `u64` can occupy.
pub const MAX_VARINT64_BYTES: usize = 10;

/// Append `value` to `buf` using the varint encoding.
pub fn put_varint32(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            return;
        }
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
}

/// Append `value` to `buf` using the varint encoding.
pub fn put_varint64(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            return;
        }
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
}

/// Decode a varint-encoded `u32` from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn get_varint32(buf: &[u8]) -> Result<(u32, usize), EncodingError> {
    let (value, consumed) = get_varint_generic(buf, 32)?;
    Ok((value as u32, consumed))
}

/// Decode a varint-encoded `u64` from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn get_varint64(buf: &[u8]) -> Result<(u64, usize), EncodingError> {
    get_varint_generic(buf, 64)
}

fn get_varint_generic(buf: &[u8], max_bits: u32) -> Result<(u64, usize), EncodingError> {
    let max_bytes = (max_bits as usize).div_ceil(7);
    let mut result: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(max_bytes) {
        let payload = (byte & 0x7f) as u64;
        result |= payload << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    if buf.len() < max_bytes {
        Err(EncodingError::UnexpectedEof { needed: max_bytes, available: buf.len() })
    } else {
        Err(EncodingError::VarintTooLong)
    }
}

/// Append `value` to `buf` as 4 little-endian bytes.
#[inline]
pub fn put_fixed32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append `value` to `buf` as 8 little-endian bytes.
#[inline]
pub fn put_fixed64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Decode 4 little-endian bytes from the start of `buf`.
#[inline]
pub fn get_fixed32(buf: &[u8]) -> Result<u32, EncodingError> {
    require(buf, 4)?;
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Decode 8 little-endian bytes from the start of `buf`.
#[inline]
pub fn get_fixed64(buf: &[u8]) -> Result<u64, EncodingError> {
    require(buf, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&buf[..8]);
    Ok(u64::from_le_bytes(arr))
}
