//! SSTable builder (component H): turns a stream of sorted internal keys
//! into a complete on-disk table — data blocks, an optional filter
//! block, a metaindex block naming it, an index block over the data
//! blocks, and a fixed-size footer. Grounded on `table/table_builder.h`.
//!
//! Keys must be added in strictly increasing order under the internal
//! key comparator; this mirrors the steady-state protocol in §4.H: a
//! pending index entry for the just-flushed data block is only closed
//! out once the *next* key is known, since the index separator can be
//! shorter than either key's own bytes.

use std::io::Write;
use std::sync::Arc;

use crate::block::BlockBuilder;
use crate::filter::{FilterBlockBuilder, FilterPolicy};
use crate::key::{Comparator, InternalKeyComparator};
use crate::options::CompressionType;

use super::format::{self, BlockHandle, Footer};
use super::SstableError;

/// Builds one SSTable file by consuming internal keys in sorted order.
pub struct SstableBuilder<W: Write> {
    writer: W,
    offset: u64,

    user_comparator: Arc<dyn Comparator>,
    filter_policy: Option<Arc<dyn FilterPolicy>>,
    block_size: usize,
    compression: CompressionType,

    data_block: BlockBuilder,
    index_block: BlockBuilder,
    filter_block: Option<FilterBlockBuilder>,

    last_key: Vec<u8>,
    num_entries: u64,
    closed: bool,

    pending_index_entry: bool,
    pending_handle: BlockHandle,
}

impl<W: Write> SstableBuilder<W> {
    /// Start building a new table, writing to `writer`.
    pub fn new(
        writer: W,
        user_comparator: Arc<dyn Comparator>,
        filter_policy: Option<Arc<dyn FilterPolicy>>,
        block_size: usize,
        block_restart_interval: usize,
        compression: CompressionType,
    ) -> Self {
        let filter_block = filter_policy.clone().map(|policy| {
            let mut fb = FilterBlockBuilder::new(policy);
            fb.start_block(0);
            fb
        });

        SstableBuilder {
            writer,
            offset: 0,
            user_comparator,
            filter_policy,
            block_size,
            compression,
            data_block: BlockBuilder::new(block_restart_interval),
            index_block: BlockBuilder::new(block_restart_interval),
            filter_block,
            last_key: Vec::new(),
            num_entries: 0,
            closed: false,
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
        }
    }

    /// Number of entries added so far.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Bytes written to `writer` so far, plus whatever is buffered in the
    /// current (unflushed) data block — an upper bound on the final file
    /// size, useful for deciding when to roll over to a new table.
    pub fn file_size(&self) -> u64 {
        self.offset + self.data_block.current_size_estimate() as u64
    }

    /// Add one internal key / value pair. `key` must compare strictly
    /// greater than every previously added key under the internal
    /// comparator.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<(), SstableError> {
        if self.closed {
            return Err(SstableError::AlreadyFinished);
        }

        let cmp = InternalKeyComparator::new(self.user_comparator.as_ref());
        if self.num_entries > 0 && cmp.compare(key, &self.last_key) != std::cmp::Ordering::Greater {
            return Err(SstableError::KeysOutOfOrder);
        }

        if self.pending_index_entry {
            debug_assert!(self.data_block.is_empty());
            let mut separator = self.last_key.clone();
            cmp.find_shortest_separator(&mut separator, key);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&separator, &handle_encoding);
            self.pending_index_entry = false;
        }

        if let Some(filter_block) = &mut self.filter_block {
            filter_block.add_key(key);
        }

        self.last_key = key.to_vec();
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= self.block_size {
            self.flush()?;
        }

        Ok(())
    }

    /// Finish and write out the current data block, if any, and arm the
    /// next `add` call to close out the pending index entry once it
    /// knows the next key.
    fn flush(&mut self) -> Result<(), SstableError> {
        if self.data_block.is_empty() {
            return Ok(());
        }
        debug_assert!(!self.pending_index_entry);

        let raw = self.data_block.finish().to_vec();
        self.pending_handle = self.write_block_bytes(&raw, self.compression)?;
        self.pending_index_entry = true;
        self.data_block.reset();

        if let Some(filter_block) = &mut self.filter_block {
            filter_block.start_block(self.offset);
        }

        Ok(())
    }

    /// Compress (if it's worth it) and write one complete block, tracking
    /// the file offset it landed at.
    fn write_block_bytes(&mut self, raw: &[u8], compression: CompressionType) -> Result<BlockHandle, SstableError> {
        let (contents, tag) = format::maybe_compress(raw, compression);
        let mut buf = Vec::with_capacity(contents.len() + format::BLOCK_TRAILER_SIZE);
        let handle = format::write_raw_block(&mut buf, &contents, tag, self.offset);
        self.writer.write_all(&buf)?;
        self.offset += buf.len() as u64;
        Ok(handle)
    }

    /// Flush any pending data, write the filter, metaindex, and index
    /// blocks, then the footer, sealing the table.
    pub fn finish(&mut self) -> Result<(), SstableError> {
        if self.closed {
            return Err(SstableError::AlreadyFinished);
        }
        self.flush()?;
        self.closed = true;

        let filter_handle = match self.filter_block.take() {
            Some(filter_block) => {
                let contents = filter_block.finish();
                Some(self.write_block_bytes(&contents, CompressionType::None)?)
            }
            None => None,
        };

        // Metadata blocks hold only a handful of entries; a full-key
        // restart every entry keeps lookups simple without the prefix
        // compression that matters for large data blocks.
        let mut metaindex_block = BlockBuilder::new(1);
        if let (Some(handle), Some(policy)) = (filter_handle, &self.filter_policy) {
            let meta_key = format!("filter.{}", policy.name());
            let mut handle_encoding = Vec::new();
            handle.encode_to(&mut handle_encoding);
            metaindex_block.add(meta_key.as_bytes(), &handle_encoding);
        }
        let metaindex_raw = metaindex_block.finish().to_vec();
        let metaindex_handle = self.write_block_bytes(&metaindex_raw, self.compression)?;

        if self.pending_index_entry {
            let cmp = InternalKeyComparator::new(self.user_comparator.as_ref());
            let mut successor = self.last_key.clone();
            cmp.find_short_successor(&mut successor);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&successor, &handle_encoding);
            self.pending_index_entry = false;
        }
        let index_raw = self.index_block.finish().to_vec();
        let index_handle = self.write_block_bytes(&index_raw, self.compression)?;

        let footer = Footer { metaindex_handle, index_handle };
        let mut footer_buf = Vec::new();
        footer.encode_to(&mut footer_buf);
        self.writer.write_all(&footer_buf)?;
        self.offset += footer_buf.len() as u64;

        self.writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{encode_internal_key, ValueType};

    fn comparator() -> Arc<dyn Comparator> {
        Arc::new(crate::key::ByteWiseComparator)
    }

    #[test]
    fn empty_table_still_has_a_valid_footer() {
        let mut buf = Vec::new();
        let mut builder = SstableBuilder::new(&mut buf, comparator(), None, 4096, 16, CompressionType::None);
        builder.finish().unwrap();
        assert!(buf.len() >= format::FOOTER_LENGTH);
    }

    #[test]
    fn rejects_out_of_order_keys() {
        let mut buf = Vec::new();
        let mut builder = SstableBuilder::new(&mut buf, comparator(), None, 4096, 16, CompressionType::None);
        let k1 = encode_internal_key(b"b", 1, ValueType::Value);
        let k2 = encode_internal_key(b"a", 2, ValueType::Value);
        builder.add(&k1, b"v1").unwrap();
        assert!(matches!(builder.add(&k2, b"v2"), Err(SstableError::KeysOutOfOrder)));
    }

    #[test]
    fn rejects_add_after_finish() {
        let mut buf = Vec::new();
        let mut builder = SstableBuilder::new(&mut buf, comparator(), None, 4096, 16, CompressionType::None);
        builder.finish().unwrap();
        let k = encode_internal_key(b"a", 1, ValueType::Value);
        assert!(matches!(builder.add(&k, b"v"), Err(SstableError::AlreadyFinished)));
        assert!(matches!(builder.finish(), Err(SstableError::AlreadyFinished)));
    }

    #[test]
    fn tracks_entry_count_and_ordering_via_internal_comparator() {
        let mut buf = Vec::new();
        let mut builder = SstableBuilder::new(&mut buf, comparator(), None, 4096, 16, CompressionType::None);
        for i in 0..10u32 {
            let key = encode_internal_key(format!("k{i:04}").as_bytes(), i as u64 + 1, ValueType::Value);
            builder.add(&key, b"v").unwrap();
        }
        assert_eq!(builder.num_entries(), 10);
        builder.finish().unwrap();
    }
}
