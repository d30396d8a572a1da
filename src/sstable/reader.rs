//! SSTable reader (component I): opens a table file, parses its footer
//! and metadata blocks, and answers point lookups and iteration requests
//! against the data blocks. Grounded on `table/format.h` and
//! `table/table.h`.
//!
//! The index block and, if present, the filter block are read once at
//! `open` time and kept fully decoded in memory — both are small
//! relative to the data region they describe, so there is no benefit to
//! re-parsing them per lookup the way data blocks are re-fetched (and
//! potentially cached) on every access.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::block::Block;
use crate::cache::BlockCache;
use crate::filter::FilterBlockReader;
use crate::key::{ByteWiseComparator, Comparator, InternalKeyComparator, BYTEWISE_COMPARATOR};
use crate::options::{Options, ReadOptions};

use super::format::{self, BlockHandle, Footer};
use super::SstableError;

/// Assigns every opened reader a distinct id so block-cache keys from
/// different tables never collide even if two tables happen to share a
/// block's file offset.
static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// The byte storage an [`SstableReader`] reads blocks out of: either a
/// memory-mapped file (the normal path) or an owned in-memory buffer
/// (used by tests and by any caller building a table entirely in
/// memory).
enum Backing {
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => mmap.deref(),
            Backing::Owned(bytes) => bytes.as_slice(),
        }
    }
}

/// An opened, immutable SSTable.
pub struct SstableReader {
    data: Backing,
    cache_id: u64,
    user_comparator: Arc<dyn Comparator>,
    block_cache: Option<Arc<dyn BlockCache>>,
    filter_reader: Option<FilterBlockReader>,
    /// Decoded index block: one `(separator_internal_key, data_block_handle)`
    /// pair per data block, in ascending key order.
    index_entries: Vec<(Vec<u8>, BlockHandle)>,
    footer: Footer,
}

impl SstableReader {
    /// Open and validate the table at `path`, memory-mapping its bytes.
    pub fn open(path: &Path, options: &Options) -> Result<Self, SstableError> {
        let file = File::open(path)?;
        // Safety: the mapping is only ever read, and the file is treated
        // as immutable for the reader's lifetime per this table format's
        // contract (SSTables are never modified after `finish()`).
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::from_backing(Backing::Mapped(mmap), options)
    }

    /// Open a table whose bytes already live in memory — the in-memory
    /// equivalent of [`open`](Self::open), used by tests and by any
    /// caller that built a table with an in-memory `Vec<u8>` writer.
    pub fn from_bytes(data: Vec<u8>, options: &Options) -> Result<Self, SstableError> {
        Self::from_backing(Backing::Owned(data), options)
    }

    fn from_backing(data: Backing, options: &Options) -> Result<Self, SstableError> {
        if data.len() < format::FOOTER_LENGTH {
            return Err(format::FormatError::Truncated.into());
        }
        let footer = Footer::decode_from(&data[data.len() - format::FOOTER_LENGTH..])?;

        let index_bytes = format::read_block(&data, &footer.index_handle, options.paranoid_checks)?;
        let internal_comparator = InternalKeyComparator::new(options.comparator.as_ref());
        let index_entries = decode_handle_block(&index_bytes, &internal_comparator)?;

        let metaindex_bytes = format::read_block(&data, &footer.metaindex_handle, options.paranoid_checks)?;
        let filter_reader = match &options.filter_policy {
            Some(policy) => {
                let meta_key = format!("filter.{}", policy.name());
                match find_metaindex_handle(&metaindex_bytes, meta_key.as_bytes())? {
                    Some(handle) => {
                        let filter_bytes = format::read_block(&data, &handle, options.paranoid_checks)?;
                        Some(FilterBlockReader::new(policy.clone(), filter_bytes))
                    }
                    None => None,
                }
            }
            None => None,
        };

        let cache_id = NEXT_CACHE_ID.fetch_add(1, AtomicOrdering::Relaxed);

        Ok(SstableReader {
            data,
            cache_id,
            user_comparator: options.comparator.clone(),
            block_cache: options.block_cache.clone(),
            filter_reader,
            index_entries,
            footer,
        })
    }

    /// Number of data blocks in this table.
    pub fn num_data_blocks(&self) -> usize {
        self.index_entries.len()
    }

    /// An approximation of how many bytes of the file precede the first
    /// entry `>= key`: the offset of the data block the index points at
    /// for `key`, or the metaindex block's offset if `key` is past every
    /// entry in the table.
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let cmp = InternalKeyComparator::new(self.user_comparator.as_ref());
        match self.find_block_index(&cmp, key) {
            Some(idx) => self.index_entries[idx].1.offset,
            None => self.footer.metaindex_handle.offset,
        }
    }

    fn find_block_index(&self, cmp: &InternalKeyComparator<'_>, key: &[u8]) -> Option<usize> {
        let idx = self
            .index_entries
            .partition_point(|(separator, _)| cmp.compare(separator, key) == std::cmp::Ordering::Less);
        if idx < self.index_entries.len() {
            Some(idx)
        } else {
            None
        }
    }

    /// Look up `key` (an encoded internal key). Invokes `handle_result`
    /// with the matching entry's stored key and value if one is found in
    /// the block the index and (if configured) filter point to. Returns
    /// whether a result was delivered; any decode/I/O failure short-
    /// circuits with an error instead.
    pub fn get(
        &self,
        key: &[u8],
        read_options: &ReadOptions,
        mut handle_result: impl FnMut(&[u8], &[u8]),
    ) -> Result<bool, SstableError> {
        let cmp = InternalKeyComparator::new(self.user_comparator.as_ref());
        let Some(idx) = self.find_block_index(&cmp, key) else {
            return Ok(false);
        };
        let handle = self.index_entries[idx].1;

        if let Some(filter) = &self.filter_reader {
            if !filter.key_may_match(handle.offset, key) {
                return Ok(false);
            }
        }

        let block_bytes = self.read_block(&handle, read_options)?;
        let block = Block::new(&block_bytes)?;
        let mut iter = block.iter(&cmp);
        iter.seek(key);
        if iter.valid() {
            handle_result(iter.key(), iter.value());
            return Ok(true);
        }
        iter.status()?;
        Ok(false)
    }

    /// Produce a forward/backward iterator over every entry in the table.
    pub fn iter(&self, read_options: ReadOptions) -> super::iterator::SstableIterator<'_> {
        super::iterator::SstableIterator::new(self, read_options)
    }

    /// The wrapped user comparator, exposed so the two-level iterator can
    /// build internal-key comparators without re-threading `Options`.
    pub(crate) fn user_comparator(&self) -> &dyn Comparator {
        self.user_comparator.as_ref()
    }

    /// `(separator_internal_key, data_block_handle)` pairs describing
    /// every data block, in ascending order.
    pub(crate) fn index_entries(&self) -> &[(Vec<u8>, BlockHandle)] {
        &self.index_entries
    }

    /// Fetch and validate one block's bytes, consulting and (if
    /// configured) populating the block cache.
    pub(crate) fn read_block(&self, handle: &BlockHandle, read_options: &ReadOptions) -> Result<Arc<Vec<u8>>, SstableError> {
        match &self.block_cache {
            Some(cache) => {
                let cache_key = cache_key(self.cache_id, handle.offset);
                if let Some(cached) = cache.lookup(&cache_key) {
                    return Ok(cached);
                }
                let bytes = format::read_block(&self.data, handle, read_options.verify_checksums)?;
                let bytes = Arc::new(bytes);
                if read_options.fill_cache {
                    cache.insert(cache_key, bytes.clone());
                }
                Ok(bytes)
            }
            None => Ok(Arc::new(format::read_block(&self.data, handle, read_options.verify_checksums)?)),
        }
    }
}

fn cache_key(cache_id: u64, offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&cache_id.to_le_bytes());
    key.extend_from_slice(&offset.to_le_bytes());
    key
}

/// Decode an index- or similarly-shaped block whose values are encoded
/// [`BlockHandle`]s, under `comparator`.
fn decode_handle_block(bytes: &[u8], comparator: &dyn Comparator) -> Result<Vec<(Vec<u8>, BlockHandle)>, SstableError> {
    let block = Block::new(bytes)?;
    let mut iter = block.iter(comparator);
    iter.seek_to_first();
    let mut entries = Vec::new();
    while iter.valid() {
        let (handle, _) = BlockHandle::decode_from(iter.value()).map_err(|_| format::FormatError::BadBlockHandle)?;
        entries.push((iter.key().to_vec(), handle));
        iter.next();
    }
    iter.status()?;
    Ok(entries)
}

/// Scan a metaindex block (byte-wise-ordered string keys) for `name`.
fn find_metaindex_handle(bytes: &[u8], name: &[u8]) -> Result<Option<BlockHandle>, SstableError> {
    let block = Block::new(bytes)?;
    let comparator: &dyn Comparator = &BYTEWISE_COMPARATOR;
    let mut iter = block.iter(comparator);
    iter.seek(name);
    if iter.valid() && iter.key() == name {
        let (handle, _) = BlockHandle::decode_from(iter.value()).map_err(|_| format::FormatError::BadBlockHandle)?;
        return Ok(Some(handle));
    }
    iter.status()?;
    Ok(None)
}
