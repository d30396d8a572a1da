//! Two-level iterator over a whole table's entries (the read side of
//! component I, alongside `reader.rs`'s point lookups). Grounded on
//! `table/two_level_iterator.h` and `table/iterator_wrapper.h`.
//!
//! [`block::BlockIterator`](crate::block::BlockIterator) borrows the
//! block bytes it walks, but those bytes may come from the block cache
//! (an `Arc<Vec<u8>>` with no lifetime tied to this reader) on one call
//! and a table-owned `Vec<u8>` read straight off the mmap on the next.
//! Rather than thread that borrow through this type — which would make
//! `SstableIterator` self-referential — each data block's entries are
//! decoded once, eagerly, into an owned `Vec<(Vec<u8>, Vec<u8>)>` the
//! moment the iterator steps onto that block. This costs an extra copy
//! of whichever block is currently open; in exchange the iterator holds
//! nothing but plain owned data and a cursor index.

use crate::key::InternalKeyComparator;
use crate::options::ReadOptions;

use super::format::BlockHandle;
use super::reader::SstableReader;
use super::SstableError;

/// The currently materialized data block: which block it is, its
/// decoded entries, and where within them the iterator sits.
struct DataBlockState {
    handle: BlockHandle,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

/// Walks every entry of a table in ascending internal-key order.
///
/// Positioned on construction; call [`seek_to_first`](Self::seek_to_first)
/// or [`seek`](Self::seek) before reading.
pub struct SstableIterator<'r> {
    reader: &'r SstableReader,
    read_options: ReadOptions,
    /// Index into the reader's index entries for the data block the
    /// iterator is currently (or was most recently) positioned over.
    index_pos: Option<usize>,
    data: Option<DataBlockState>,
    error: Option<SstableError>,
}

impl<'r> SstableIterator<'r> {
    pub(super) fn new(reader: &'r SstableReader, read_options: ReadOptions) -> Self {
        SstableIterator { reader, read_options, index_pos: None, data: None, error: None }
    }

    /// `true` if positioned at a valid entry.
    pub fn valid(&self) -> bool {
        self.error.is_none() && self.data.as_ref().is_some_and(|d| d.pos < d.entries.len())
    }

    /// `Err` if a decode or I/O failure was encountered; `Ok(())` otherwise.
    pub fn status(&self) -> Result<(), SstableError> {
        match &self.error {
            Some(_) => Err(self.clone_error()),
            None => Ok(()),
        }
    }

    fn clone_error(&self) -> SstableError {
        match self.error.as_ref().unwrap() {
            SstableError::Io(e) => SstableError::Io(std::io::Error::new(e.kind(), e.to_string())),
            SstableError::Format(e) => SstableError::Format(*e),
            SstableError::Block(e) => SstableError::Block(e.clone()),
            SstableError::Encoding(e) => SstableError::Encoding(e.clone()),
            SstableError::KeysOutOfOrder => SstableError::KeysOutOfOrder,
            SstableError::AlreadyFinished => SstableError::AlreadyFinished,
        }
    }

    /// The current entry's encoded internal key. Panics if not
    /// [`valid`](Self::valid).
    pub fn key(&self) -> &[u8] {
        let data = self.data.as_ref().expect("key() called on invalid iterator");
        &data.entries[data.pos].0
    }

    /// The current entry's value. Panics if not [`valid`](Self::valid).
    pub fn value(&self) -> &[u8] {
        let data = self.data.as_ref().expect("value() called on invalid iterator");
        &data.entries[data.pos].1
    }

    /// Fully decode the data block at `handle` into owned entries.
    fn load_block(&mut self, handle: BlockHandle) -> bool {
        let bytes = match self.reader.read_block(&handle, &self.read_options) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.error = Some(err);
                self.data = None;
                return false;
            }
        };

        let cmp = InternalKeyComparator::new(self.reader.user_comparator());
        let block = match crate::block::Block::new(&bytes) {
            Ok(block) => block,
            Err(err) => {
                self.error = Some(SstableError::Block(err));
                self.data = None;
                return false;
            }
        };

        let mut entries = Vec::new();
        let mut block_iter = block.iter(&cmp);
        block_iter.seek_to_first();
        while block_iter.valid() {
            entries.push((block_iter.key().to_vec(), block_iter.value().to_vec()));
            block_iter.next();
        }
        if let Err(err) = block_iter.status() {
            self.error = Some(SstableError::Block(err));
            self.data = None;
            return false;
        }

        self.data = Some(DataBlockState { handle, entries, pos: 0 });
        true
    }

    /// Load the data block at index-entries position `idx`, or clear the
    /// data state if none is current.
    fn set_index_pos(&mut self, idx: Option<usize>) {
        self.index_pos = idx;
        match idx {
            Some(idx) => {
                let handle = self.reader.index_entries()[idx].1;
                if self.data.as_ref().map(|d| d.handle) != Some(handle) {
                    self.load_block(handle);
                }
            }
            None => self.data = None,
        }
    }

    /// Advance past any data blocks that turned out to be empty (an
    /// SSTable never writes one, but a zero-entry block is not on its
    /// own a format error, so callers should not have to special-case it).
    fn skip_forward_while_empty(&mut self) {
        while self.error.is_none() {
            match &self.data {
                Some(d) if d.pos < d.entries.len() => return,
                Some(_) => {}
                None => return,
            }
            let next = self.index_pos.map(|i| i + 1);
            match next {
                Some(idx) if idx < self.reader.index_entries().len() => self.set_index_pos(Some(idx)),
                _ => {
                    self.data = None;
                    self.index_pos = None;
                    return;
                }
            }
        }
    }

    fn skip_backward_while_empty(&mut self) {
        while self.error.is_none() {
            match &self.data {
                Some(d) if !d.entries.is_empty() => return,
                Some(_) => {}
                None => return,
            }
            let prev = self.index_pos.and_then(|i| i.checked_sub(1));
            match prev {
                Some(idx) => {
                    self.set_index_pos(Some(idx));
                    if let Some(d) = &mut self.data {
                        d.pos = d.entries.len().saturating_sub(1);
                    }
                }
                None => {
                    self.data = None;
                    self.index_pos = None;
                    return;
                }
            }
        }
    }

    /// Position at the table's first entry.
    pub fn seek_to_first(&mut self) {
        self.error = None;
        if self.reader.index_entries().is_empty() {
            self.data = None;
            self.index_pos = None;
            return;
        }
        self.set_index_pos(Some(0));
        self.skip_forward_while_empty();
    }

    /// Position at the table's last entry.
    pub fn seek_to_last(&mut self) {
        self.error = None;
        if self.reader.index_entries().is_empty() {
            self.data = None;
            self.index_pos = None;
            return;
        }
        let last = self.reader.index_entries().len() - 1;
        self.set_index_pos(Some(last));
        if let Some(d) = &mut self.data {
            d.pos = d.entries.len().saturating_sub(1);
        }
        self.skip_backward_while_empty();
    }

    /// Position at the first entry whose encoded internal key is `>=
    /// target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.error = None;
        let cmp = InternalKeyComparator::new(self.reader.user_comparator());
        let idx = self
            .reader
            .index_entries()
            .partition_point(|(separator, _)| cmp.compare(separator, target) == std::cmp::Ordering::Less);

        if idx >= self.reader.index_entries().len() {
            self.data = None;
            self.index_pos = None;
            return;
        }

        self.set_index_pos(Some(idx));
        if let Some(d) = &mut self.data {
            d.pos = d.entries.partition_point(|(key, _)| cmp.compare(key, target) == std::cmp::Ordering::Less);
        }
        self.skip_forward_while_empty();
    }

    /// Move to the next entry. Requires [`valid`](Self::valid).
    pub fn next(&mut self) {
        debug_assert!(self.valid());
        if let Some(d) = &mut self.data {
            d.pos += 1;
        }
        self.skip_forward_while_empty();
    }

    /// Move to the previous entry. Requires [`valid`](Self::valid).
    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        match &mut self.data {
            Some(d) if d.pos > 0 => d.pos -= 1,
            _ => {
                let prev = self.index_pos.and_then(|i| i.checked_sub(1));
                match prev {
                    Some(idx) => {
                        self.set_index_pos(Some(idx));
                        if let Some(d) = &mut self.data {
                            d.pos = d.entries.len().saturating_sub(1);
                        }
                        self.skip_backward_while_empty();
                    }
                    None => {
                        self.data = None;
                        self.index_pos = None;
                    }
                }
            }
        }
    }
}
