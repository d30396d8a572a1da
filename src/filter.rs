//! Per-table filter policies and the per-block filter block format (the
//! other half of component J, plus component H/I's filter block).
//!
//! A [`FilterPolicy`] is a stateless function from a batch of keys to
//! opaque filter bytes, plus the inverse membership test — one Bloom
//! filter per roughly 2 KiB of data-block bytes, rather than one filter
//! for the whole table, so a reader only has to decode the filter
//! covering the block it's about to fetch. [`FilterBlockBuilder`] and
//! [`FilterBlockReader`] implement that chunking and the on-disk layout
//! described in §9 of the spec this crate ports: an external component
//! exposing `add_key`, `start_block(offset)`, `finish()` on the write
//! side and `key_may_match(block_offset, key)` on the read side.

use bloomfilter::Bloom;

/// False-positive rate new Bloom filters are sized for.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// `2^FILTER_BASE_LG` bytes of data blocks share one filter.
pub const FILTER_BASE_LG: u8 = 11;

/// A pluggable filter construction/test contract.
pub trait FilterPolicy: Send + Sync {
    /// A short identifier persisted alongside the filter so a reader can
    /// refuse to trust a filter built by an incompatible policy.
    fn name(&self) -> &'static str;

    /// Build filter bytes covering every key in `keys`.
    fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8>;

    /// Test whether `key` might be a member of `filter`, built earlier
    /// by [`create_filter`](Self::create_filter). Never a false
    /// negative; may be a false positive.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// A Bloom filter sized for a target false-positive rate.
pub struct BloomFilterPolicy {
    false_positive_rate: f64,
}

impl BloomFilterPolicy {
    /// Construct a policy that sizes each filter it builds for
    /// `false_positive_rate`.
    pub fn new(false_positive_rate: f64) -> Self {
        BloomFilterPolicy { false_positive_rate }
    }
}

impl Default for BloomFilterPolicy {
    fn default() -> Self {
        BloomFilterPolicy::new(DEFAULT_FALSE_POSITIVE_RATE)
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &'static str {
        "aeternusdb.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8> {
        if keys.is_empty() {
            return Vec::new();
        }
        let Ok(mut bloom) = Bloom::<Vec<u8>>::new_for_fp_rate(keys.len(), self.false_positive_rate) else {
            return Vec::new();
        };
        for key in keys {
            bloom.set(key);
        }
        bloom.as_slice().to_vec()
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.is_empty() {
            // No keys were ever added to this chunk: match everything
            // rather than pruning blindly.
            return true;
        }
        match Bloom::<Vec<u8>>::from_slice(filter) {
            Ok(bloom) => bloom.check(key),
            Err(_) => true,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Filter block builder/reader — chunk keys by the data-block offset they
// belong to, so a point lookup only ever decodes one small filter.
// ------------------------------------------------------------------------------------------------

/// Accumulates keys into one filter per `2^FILTER_BASE_LG` bytes of data
/// blocks, matching the SSTable builder's data-block offsets one-to-one
/// with filter chunks.
///
/// Protocol: call [`add_key`](Self::add_key) for every key added to the
/// current data block, [`start_block`](Self::start_block) with that
/// block's starting file offset right before appending its first key,
/// and [`finish`](Self::finish) once after the last data block.
pub struct FilterBlockBuilder {
    policy: std::sync::Arc<dyn FilterPolicy>,
    /// Concatenated pending key bytes, sliced by `start`.
    keys: Vec<u8>,
    /// Byte offset of each pending key's start within `keys`.
    start: Vec<usize>,
    /// Finished filters, concatenated back to back.
    result: Vec<u8>,
    /// Byte offset of the `i`th finished filter within `result`.
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    /// Build filters using `policy`.
    pub fn new(policy: std::sync::Arc<dyn FilterPolicy>) -> Self {
        FilterBlockBuilder {
            policy,
            keys: Vec::new(),
            start: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Notify the builder that a new data block begins at `block_offset`,
    /// closing out filters for any chunk boundaries passed since the
    /// previous call.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset >> FILTER_BASE_LG;
        while filter_index > self.filter_offsets.len() as u64 {
            self.generate_filter();
        }
    }

    /// Add a key belonging to the data block most recently started.
    pub fn add_key(&mut self, key: &[u8]) {
        self.start.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    fn generate_filter(&mut self) {
        if self.start.is_empty() {
            // No keys seen for this chunk; still advance the offsets
            // array so readers can index it by chunk number.
            self.filter_offsets.push(self.result.len() as u32);
            return;
        }

        self.start.push(self.keys.len());
        let tmp_keys: Vec<Vec<u8>> = self
            .start
            .windows(2)
            .map(|pair| self.keys[pair[0]..pair[1]].to_vec())
            .collect();

        self.filter_offsets.push(self.result.len() as u32);
        let filter = self.policy.create_filter(&tmp_keys);
        self.result.extend_from_slice(&filter);

        self.keys.clear();
        self.start.clear();
    }

    /// Seal the filter block: flush any pending chunk, append the offset
    /// array, the offset-array's own offset, and the base-2 log chunk
    /// size, and return the complete block payload.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.start.is_empty() {
            self.generate_filter();
        }

        let array_offset = self.result.len() as u32;
        for offset in &self.filter_offsets {
            self.result.extend_from_slice(&offset.to_le_bytes());
        }
        self.result.extend_from_slice(&array_offset.to_le_bytes());
        self.result.push(FILTER_BASE_LG);
        self.result
    }
}

/// Reads a filter block written by [`FilterBlockBuilder`], answering
/// `key_may_match` queries for a given data block's file offset.
pub struct FilterBlockReader {
    policy: std::sync::Arc<dyn FilterPolicy>,
    data: Vec<u8>,
    /// Offset of the first entry of the filter-offsets array within `data`.
    offset_array_start: usize,
    num_filters: usize,
    base_lg: u8,
}

impl FilterBlockReader {
    /// Parse a filter block's trailing offset array. An under-sized or
    /// otherwise malformed block degrades to an empty reader that always
    /// reports a possible match, the same fail-open behavior used for an
    /// out-of-range chunk index.
    pub fn new(policy: std::sync::Arc<dyn FilterPolicy>, contents: Vec<u8>) -> Self {
        if contents.len() < 5 {
            return FilterBlockReader { policy, data: contents, offset_array_start: 0, num_filters: 0, base_lg: FILTER_BASE_LG };
        }

        let base_lg = contents[contents.len() - 1];
        let array_offset =
            u32::from_le_bytes(contents[contents.len() - 5..contents.len() - 1].try_into().unwrap()) as usize;

        if array_offset > contents.len() - 5 {
            return FilterBlockReader { policy, data: contents, offset_array_start: 0, num_filters: 0, base_lg };
        }

        let num_filters = (contents.len() - 5 - array_offset) / 4;
        FilterBlockReader { policy, data: contents, offset_array_start: array_offset, num_filters, base_lg }
    }

    fn offset_at(&self, i: usize) -> usize {
        let pos = self.offset_array_start + i * 4;
        u32::from_le_bytes(self.data[pos..pos + 4].try_into().unwrap()) as usize
    }

    /// Test whether `key` might be present in the data block starting at
    /// `block_offset`. Fails open (returns `true`) on any out-of-range or
    /// malformed index, per the spec's filter contract.
    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let index = (block_offset >> self.base_lg) as usize;
        if index >= self.num_filters {
            return true;
        }

        let start = self.offset_at(index);
        let limit = self.offset_at(index + 1);
        if start > limit || limit > self.offset_array_start {
            return true;
        }

        self.policy.key_may_match(key, &self.data[start..limit])
    }
}
