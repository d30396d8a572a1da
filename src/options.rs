//! Tunables shared across the components above (component K).
//!
//! Mirrors `leveldb::Options`/`ReadOptions`/`WriteOptions`: a flat,
//! publicly-constructible struct per concern rather than a builder, with
//! every field defaulted so callers only override what they need.

use std::sync::Arc;

use crate::cache::{BlockCache, LruBlockCache};
use crate::filter::{BloomFilterPolicy, FilterPolicy};
use crate::key::{ByteWiseComparator, Comparator};

/// On-disk compression applied to SSTable data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    /// Store block bytes verbatim.
    None = 0,
    /// Compress with Snappy (the default).
    Snappy = 1,
}

impl CompressionType {
    /// Decode a persisted compression tag, rejecting unrecognized values
    /// so a reader never silently misinterprets a future format.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Snappy),
            _ => None,
        }
    }
}

/// Configuration shared by a memtable/WAL pair and by SSTable
/// construction and reading.
pub struct Options {
    /// Orders both user keys and, transitively, internal keys. Must stay
    /// fixed for the lifetime of any on-disk data it touches.
    pub comparator: Arc<dyn Comparator>,

    /// Create the underlying storage if it does not already exist.
    pub create_if_missing: bool,

    /// Fail instead of opening if the storage already exists.
    pub error_if_exists: bool,

    /// Run extra consistency checks (e.g. verify every block checksum
    /// on every read), at a performance cost.
    pub paranoid_checks: bool,

    /// Flush the active memtable to an SSTable once it grows past this
    /// many bytes.
    pub write_buffer_size: usize,

    /// Soft limit on simultaneously open file handles.
    pub max_open_files: usize,

    /// Shared cache for decoded data blocks. `None` disables caching.
    pub block_cache: Option<Arc<dyn BlockCache>>,

    /// Target uncompressed size of one data block.
    pub block_size: usize,

    /// Keys between each block-internal restart point.
    pub block_restart_interval: usize,

    /// Soft cap on a single SSTable file's size before rolling to a new
    /// one during a flush or compaction.
    pub max_file_size: u64,

    /// Compression applied to data blocks as they're written.
    pub compression: CompressionType,

    /// Reuse the tail of an existing WAL file when reopening rather than
    /// rotating to a new one.
    pub reuse_logs: bool,

    /// Per-table filter policy; `None` disables filter blocks entirely.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            comparator: Arc::new(ByteWiseComparator),
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: 4 * 1024 * 1024,
            max_open_files: 1000,
            block_cache: Some(Arc::new(LruBlockCache::new(8 * 1024))),
            block_size: 4 * 1024,
            block_restart_interval: crate::block::DEFAULT_RESTART_INTERVAL,
            max_file_size: 2 * 1024 * 1024,
            compression: CompressionType::Snappy,
            reuse_logs: false,
            filter_policy: Some(Arc::new(BloomFilterPolicy::default())),
        }
    }
}

/// Per-call overrides for a read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Verify every block's checksum before returning its data.
    pub verify_checksums: bool,

    /// Insert blocks touched by this read into the block cache.
    pub fill_cache: bool,

    /// Read as of this sequence number rather than the latest. `None`
    /// means "read the most recent committed value."
    pub snapshot: Option<u64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { verify_checksums: false, fill_cache: true, snapshot: None }
    }
}

/// Per-call overrides for a write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Force the WAL write to durable storage before returning.
    pub sync: bool,
}
