//! Restart-interval key/value blocks (component G).
//!
//! A block is the unit of I/O inside an SSTable's data region: a sorted
//! run of key/value pairs, front-compressed against periodic "restart
//! points" so a reader can binary-search for an approximate position
//! without decompressing the whole block. Grounded on
//! `table/block_builder.h` and `table/block.h`.
//!
//! # On-disk layout
//!
//! ```text
//! entry* ‖ restart[0..num_restarts) (u32 LE each) ‖ num_restarts (u32 LE)
//! ```
//!
//! Each `entry` is `varint32(shared) ‖ varint32(non_shared) ‖
//! varint32(value_len) ‖ key_delta ‖ value`, where `key_delta` is the
//! `non_shared` trailing bytes of the key that differ from the previous
//! key in the block. A restart point entry always has `shared == 0`
//! (its key is stored in full), which is what makes binary search over
//! restart points possible without decoding intervening entries.

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::encoding::{get_varint32, put_varint32};
use crate::key::Comparator;

/// Every `restart_interval`'th key is stored in full; the rest are
/// encoded as a shared-prefix length plus the differing suffix.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Errors raised while parsing a block's bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The block is too short to even hold its own restart-count footer.
    #[error("block contents are too short ({0} bytes)")]
    Truncated(usize),

    /// `num_restarts` claims more restart points than the block could
    /// possibly hold given its size.
    #[error("block claims {claimed} restarts but only {max_possible} fit")]
    TooManyRestarts { claimed: u32, max_possible: u32 },

    /// An entry's header or key/value bytes ran past the restart array.
    #[error("bad entry in block")]
    BadEntry,
}

impl From<BlockError> for crate::error::Error {
    fn from(err: BlockError) -> Self {
        crate::error::Error::corruption(err.to_string())
    }
}

// ------------------------------------------------------------------------------------------------
// Builder
// ------------------------------------------------------------------------------------------------

/// Accumulates key/value pairs into one block's compressed byte layout.
///
/// Keys must be added in strictly increasing order (per the block's
/// comparator); violating this is a caller bug; debug builds assert it.
pub struct BlockBuilder {
    restart_interval: usize,
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    finished: bool,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    /// Create a builder that stores a full key every `restart_interval`
    /// entries (must be at least 1).
    pub fn new(restart_interval: usize) -> Self {
        debug_assert!(restart_interval >= 1);
        BlockBuilder {
            restart_interval,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            finished: false,
            last_key: Vec::new(),
        }
    }

    /// Discard all entries added so far, keeping the restart interval.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.finished = false;
        self.last_key.clear();
    }

    /// `true` if no entries have been added since construction/`reset`.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Upper bound on the block's final encoded size, useful for callers
    /// deciding when to roll over to a new block before finishing.
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// Append one key/value pair. `key` must compare greater than every
    /// previously added key.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(!self.finished);
        debug_assert!(self.counter <= self.restart_interval);
        debug_assert!(self.buffer.is_empty() || key > self.last_key.as_slice());

        let shared = if self.counter < self.restart_interval {
            let min_len = self.last_key.len().min(key.len());
            let mut shared = 0;
            while shared < min_len && self.last_key[shared] == key[shared] {
                shared += 1;
            }
            shared
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };

        let non_shared = key.len() - shared;
        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, non_shared as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
    }

    /// Append the restart array and restart count, sealing the block.
    /// Returns the final bytes; no further `add` calls are valid until
    /// `reset`.
    pub fn finish(&mut self) -> &[u8] {
        for &restart in &self.restarts {
            self.buffer.extend_from_slice(&restart.to_le_bytes());
        }
        self.buffer.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        self.finished = true;
        &self.buffer
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        BlockBuilder::new(DEFAULT_RESTART_INTERVAL)
    }
}

// ------------------------------------------------------------------------------------------------
// Reader
// ------------------------------------------------------------------------------------------------

/// A parsed, read-only view over one block's bytes.
///
/// Holds only offsets into the caller-owned byte slice; producing an
/// iterator borrows `data` for its lifetime.
pub struct Block<'a> {
    data: &'a [u8],
    restart_offset: u32,
    num_restarts: u32,
}

impl<'a> Block<'a> {
    /// Parse a block's trailing restart footer, validating that the
    /// declared restart count actually fits within `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, BlockError> {
        if data.len() < 4 {
            return Err(BlockError::Truncated(data.len()));
        }
        let num_restarts = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap());
        let max_possible = ((data.len() - 4) / 4) as u32;
        if num_restarts > max_possible {
            return Err(BlockError::TooManyRestarts { claimed: num_restarts, max_possible });
        }
        let restart_offset = data.len() as u32 - 4 - num_restarts * 4;
        Ok(Block { data, restart_offset, num_restarts })
    }

    /// Size in bytes of the block's underlying byte slice.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Produce an iterator over this block's entries in key order.
    pub fn iter(&self, comparator: &'a dyn Comparator) -> BlockIterator<'a> {
        if self.num_restarts == 0 {
            return BlockIterator::empty(comparator);
        }
        BlockIterator {
            comparator,
            data: self.data,
            restart_offset: self.restart_offset,
            num_restarts: self.num_restarts,
            current: self.restart_offset,
            restart_index: self.num_restarts - 1,
            key: Vec::new(),
            value_start: 0,
            value_len: 0,
            corrupted: false,
        }
    }
}

/// Decode one entry's header (`shared`, `non_shared`, `value_len`) and
/// return the offset of the key/value payload that follows it.
fn decode_entry(data: &[u8], start: usize, limit: usize) -> Option<(u32, u32, u32, usize)> {
    let buf = data.get(start..limit)?;
    let (shared, n1) = get_varint32(buf).ok()?;
    let (non_shared, n2) = get_varint32(&buf[n1..]).ok()?;
    let (value_len, n3) = get_varint32(&buf[n1 + n2..]).ok()?;
    let payload_start = start + n1 + n2 + n3;
    let need = non_shared as usize + value_len as usize;
    if limit.saturating_sub(payload_start) < need {
        return None;
    }
    Some((shared, non_shared, value_len, payload_start))
}

/// An iterator walking a [`Block`]'s entries, supporting forward, reverse
/// and binary-search-seek access patterns.
///
/// Invalid once it runs past either end or hits a corrupt entry; callers
/// must check [`BlockIterator::status`] to distinguish a clean
/// end-of-block from corruption.
pub struct BlockIterator<'a> {
    comparator: &'a dyn Comparator,
    data: &'a [u8],
    restart_offset: u32,
    num_restarts: u32,
    /// Byte offset of the current entry; `>= restart_offset` means invalid.
    current: u32,
    restart_index: u32,
    key: Vec<u8>,
    value_start: usize,
    value_len: usize,
    corrupted: bool,
}

impl<'a> BlockIterator<'a> {
    fn empty(comparator: &'a dyn Comparator) -> Self {
        BlockIterator {
            comparator,
            data: &[],
            restart_offset: 0,
            num_restarts: 0,
            current: 0,
            restart_index: 0,
            key: Vec::new(),
            value_start: 0,
            value_len: 0,
            corrupted: false,
        }
    }

    /// `true` if positioned at a valid entry.
    pub fn valid(&self) -> bool {
        self.current < self.restart_offset
    }

    /// `Err` if the iterator hit a corrupt entry; `Ok(())` otherwise,
    /// including a clean run to end-of-block.
    pub fn status(&self) -> Result<(), BlockError> {
        if self.corrupted { Err(BlockError::BadEntry) } else { Ok(()) }
    }

    /// The current entry's key. Panics if not [`valid`](Self::valid).
    pub fn key(&self) -> &[u8] {
        debug_assert!(self.valid());
        &self.key
    }

    /// The current entry's value. Panics if not [`valid`](Self::valid).
    pub fn value(&self) -> &[u8] {
        debug_assert!(self.valid());
        &self.data[self.value_start..self.value_start + self.value_len]
    }

    fn restart_point(&self, index: u32) -> u32 {
        debug_assert!(index < self.num_restarts);
        let offset = self.restart_offset as usize + index as usize * 4;
        u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    fn next_entry_offset(&self) -> usize {
        self.value_start + self.value_len
    }

    fn seek_to_restart_point(&mut self, index: u32) {
        self.key.clear();
        self.restart_index = index;
        let offset = self.restart_point(index);
        self.value_start = offset as usize;
        self.value_len = 0;
    }

    fn corruption_error(&mut self) {
        self.current = self.restart_offset;
        self.restart_index = self.num_restarts;
        self.key.clear();
        self.value_start = 0;
        self.value_len = 0;
        self.corrupted = true;
    }

    /// Decode the entry following the current position. Returns `false`
    /// at a clean end-of-block or when an entry is corrupt (check
    /// [`status`](Self::status) to tell them apart).
    fn parse_next_key(&mut self) -> bool {
        self.current = self.next_entry_offset() as u32;
        let start = self.current as usize;
        let limit = self.restart_offset as usize;
        if start >= limit {
            self.current = self.restart_offset;
            self.restart_index = self.num_restarts;
            return false;
        }

        let Some((shared, non_shared, value_len, payload_start)) = decode_entry(self.data, start, limit) else {
            self.corruption_error();
            return false;
        };
        if (self.key.len() as u32) < shared {
            self.corruption_error();
            return false;
        }

        self.key.truncate(shared as usize);
        self.key.extend_from_slice(&self.data[payload_start..payload_start + non_shared as usize]);
        self.value_start = payload_start + non_shared as usize;
        self.value_len = value_len as usize;

        while self.restart_index + 1 < self.num_restarts && self.restart_point(self.restart_index + 1) < self.current {
            self.restart_index += 1;
        }
        true
    }

    /// Move to the next entry. Requires [`valid`](Self::valid).
    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.parse_next_key();
    }

    /// Move to the previous entry. Requires [`valid`](Self::valid).
    ///
    /// Implemented by rewinding to the preceding restart point and
    /// re-parsing forward, since entries are only forward-decodable.
    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        let original = self.current;
        while self.restart_point(self.restart_index) >= original {
            if self.restart_index == 0 {
                self.current = self.restart_offset;
                self.restart_index = self.num_restarts;
                return;
            }
            self.restart_index -= 1;
        }
        self.seek_to_restart_point(self.restart_index);
        loop {
            if !self.parse_next_key() {
                break;
            }
            if self.next_entry_offset() as u32 >= original {
                break;
            }
        }
    }

    /// Position at the first entry whose key is `>= target`.
    pub fn seek(&mut self, target: &[u8]) {
        if self.num_restarts == 0 {
            return;
        }
        let mut left: u32 = 0;
        let mut right: u32 = self.num_restarts - 1;
        while left < right {
            let mid = left + (right - left + 1) / 2;
            let offset = self.restart_point(mid);
            let Some((shared, non_shared, _value_len, payload_start)) =
                decode_entry(self.data, offset as usize, self.restart_offset as usize)
            else {
                self.corruption_error();
                return;
            };
            if shared != 0 {
                self.corruption_error();
                return;
            }
            let mid_key = &self.data[payload_start..payload_start + non_shared as usize];
            if self.comparator.compare(mid_key, target) == std::cmp::Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_key() {
                return;
            }
            if self.comparator.compare(&self.key, target) != std::cmp::Ordering::Less {
                return;
            }
        }
    }

    /// Position at the block's first entry.
    pub fn seek_to_first(&mut self) {
        if self.num_restarts == 0 {
            return;
        }
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    /// Position at the block's last entry.
    pub fn seek_to_last(&mut self) {
        if self.num_restarts == 0 {
            return;
        }
        self.seek_to_restart_point(self.num_restarts - 1);
        while self.parse_next_key() && self.next_entry_offset() < self.restart_offset as usize {}
    }
}
