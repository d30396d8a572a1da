//! Shared on-disk primitives for the SSTable format: block handles, the
//! trailing footer, and the checksummed/optionally-compressed block
//! trailer every data, filter, metaindex and index block carries.
//! Grounded on `table/format.h`.

use crc32fast::Hasher as Crc32;

use crate::encoding::{get_varint64, put_varint64};
use crate::options::CompressionType;
use crate::wal::{mask_crc, unmask_crc};

/// Trailing bytes appended to every block: a 1-byte compression tag and
/// a 4-byte masked CRC32 over `block_contents ‖ tag`.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Largest a single varint64-encoded [`BlockHandle`] can be (two
/// 10-byte varints).
pub const MAX_ENCODED_HANDLE_LENGTH: usize = 20;

/// Fixed on-disk size of a [`Footer`]: two block handles worth of
/// padding plus the 8-byte magic number.
pub const FOOTER_LENGTH: usize = 2 * MAX_ENCODED_HANDLE_LENGTH + 8;

/// Identifies a well-formed AeternusDB SSTable; the last 8 bytes of
/// every file.
pub const TABLE_MAGIC_NUMBER: u64 = 0xdb4775248b80fb57;

/// Points at one block's byte range within an SSTable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        BlockHandle { offset, size }
    }

    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        put_varint64(buf, self.offset);
        put_varint64(buf, self.size);
    }

    /// Decode a handle starting at `buf[0]`, returning the handle and
    /// the number of bytes consumed.
    pub fn decode_from(buf: &[u8]) -> Result<(Self, usize), FormatError> {
        let (offset, n1) = get_varint64(buf).map_err(|_| FormatError::BadBlockHandle)?;
        let (size, n2) = get_varint64(&buf[n1..]).map_err(|_| FormatError::BadBlockHandle)?;
        Ok((BlockHandle { offset, size }, n1 + n2))
    }
}

/// Footer errors: a malformed handle or a file that isn't one of ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("bad block handle")]
    BadBlockHandle,
    #[error("not an sstable (bad magic number)")]
    BadMagic,
    #[error("file is too short to be an sstable")]
    Truncated,
    #[error("block checksum mismatch")]
    ChecksumMismatch,
    #[error("unrecognized block compression type")]
    BadCompressionType,
    #[error("truncated block read")]
    TruncatedBlock,
}

/// The last [`FOOTER_LENGTH`] bytes of every SSTable: where to find the
/// metaindex and index blocks, padded out to a fixed size so a reader
/// can always find it by subtracting a constant from the file length.
#[derive(Debug, Clone, Copy, Default)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        self.metaindex_handle.encode_to(buf);
        self.index_handle.encode_to(buf);
        buf.resize(start + 2 * MAX_ENCODED_HANDLE_LENGTH, 0);
        let magic = TABLE_MAGIC_NUMBER;
        buf.extend_from_slice(&(magic as u32).to_le_bytes());
        buf.extend_from_slice(&((magic >> 32) as u32).to_le_bytes());
        debug_assert_eq!(buf.len() - start, FOOTER_LENGTH);
    }

    pub fn decode_from(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < FOOTER_LENGTH {
            return Err(FormatError::Truncated);
        }
        let magic_offset = FOOTER_LENGTH - 8;
        let magic_lo = u32::from_le_bytes(data[magic_offset..magic_offset + 4].try_into().unwrap());
        let magic_hi = u32::from_le_bytes(data[magic_offset + 4..magic_offset + 8].try_into().unwrap());
        let magic = ((magic_hi as u64) << 32) | magic_lo as u64;
        if magic != TABLE_MAGIC_NUMBER {
            return Err(FormatError::BadMagic);
        }

        let (metaindex_handle, n1) = BlockHandle::decode_from(data)?;
        let (index_handle, _n2) = BlockHandle::decode_from(&data[n1..])?;
        Ok(Footer { metaindex_handle, index_handle })
    }
}

/// Compress `raw` per `compression`, returning the bytes to store and
/// the tag that was actually used (compression is skipped if it
/// doesn't shrink the block by at least 12.5%, matching the original's
/// "not worth it" heuristic).
pub fn maybe_compress(raw: &[u8], compression: CompressionType) -> (Vec<u8>, CompressionType) {
    match compression {
        CompressionType::None => (raw.to_vec(), CompressionType::None),
        CompressionType::Snappy => {
            let compressed = snap::raw::Encoder::new().compress_vec(raw).unwrap_or_else(|_| raw.to_vec());
            if compressed.len() < raw.len() - raw.len() / 8 {
                (compressed, CompressionType::Snappy)
            } else {
                (raw.to_vec(), CompressionType::None)
            }
        }
    }
}

fn decompress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>, FormatError> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Snappy => {
            snap::raw::Decoder::new().decompress_vec(data).map_err(|_| FormatError::TruncatedBlock)
        }
    }
}

/// Append `block_contents` to `buf` as a complete checksummed (and
/// already-compressed) block, returning its handle.
pub fn write_raw_block(buf: &mut Vec<u8>, block_contents: &[u8], compression: CompressionType, offset: u64) -> BlockHandle {
    buf.extend_from_slice(block_contents);

    let tag = compression as u8;
    let mut hasher = Crc32::new();
    hasher.update(block_contents);
    hasher.update(&[tag]);
    let crc = mask_crc(hasher.finalize());

    buf.push(tag);
    buf.extend_from_slice(&crc.to_le_bytes());

    BlockHandle::new(offset, block_contents.len() as u64)
}

/// Read and verify the block at `handle`, decompressing it if needed.
/// `file` is the whole SSTable's bytes.
pub fn read_block(file: &[u8], handle: &BlockHandle, verify_checksums: bool) -> Result<Vec<u8>, FormatError> {
    let start = usize::try_from(handle.offset).map_err(|_| FormatError::TruncatedBlock)?;
    let size = usize::try_from(handle.size).map_err(|_| FormatError::TruncatedBlock)?;
    let end = start.checked_add(size).ok_or(FormatError::TruncatedBlock)?;
    let trailer_end = end.checked_add(BLOCK_TRAILER_SIZE).ok_or(FormatError::TruncatedBlock)?;
    if trailer_end > file.len() {
        return Err(FormatError::TruncatedBlock);
    }

    let contents = &file[start..end];
    let tag = file[end];
    let stored_crc = u32::from_le_bytes(file[end + 1..end + 5].try_into().unwrap());

    if verify_checksums {
        let mut hasher = Crc32::new();
        hasher.update(contents);
        hasher.update(&[tag]);
        if unmask_crc(stored_crc) != hasher.finalize() {
            return Err(FormatError::ChecksumMismatch);
        }
    }

    let compression = CompressionType::from_u8(tag).ok_or(FormatError::BadCompressionType)?;
    decompress(contents, compression)
}
