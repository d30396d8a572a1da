//! Pluggable block cache (the other half of component J).
//!
//! SSTable readers consult a [`BlockCache`] before paying the cost of
//! decompressing (and, for a cold file, reading) a data block. The
//! cache is keyed by an opaque caller-chosen byte string — typically a
//! file identifier concatenated with a block's file offset — and never
//! itself decides what that key means.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// A cache mapping opaque block keys to their decoded bytes.
///
/// Implementations must be safe to share across reader threads; the
/// built-in [`LruBlockCache`] does so with an internal mutex, matching
/// this crate's other shared structures (see `skiplist`'s single-writer
/// design for the alternative, lock-free approach used where the access
/// pattern allows it).
pub trait BlockCache: Send + Sync {
    /// Look up a previously inserted block by key.
    fn lookup(&self, key: &[u8]) -> Option<std::sync::Arc<Vec<u8>>>;

    /// Insert (or replace) a block's bytes under `key`.
    fn insert(&self, key: Vec<u8>, value: std::sync::Arc<Vec<u8>>);

    /// Number of entries currently cached.
    fn len(&self) -> usize;

    /// `true` if no entries are cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An LRU-evicting [`BlockCache`] bounded by entry count.
pub struct LruBlockCache {
    inner: Mutex<LruCache<Vec<u8>, std::sync::Arc<Vec<u8>>>>,
}

impl LruBlockCache {
    /// Create a cache holding at most `capacity` blocks. `capacity` must
    /// be nonzero.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        LruBlockCache { inner: Mutex::new(LruCache::new(capacity)) }
    }
}

impl BlockCache for LruBlockCache {
    fn lookup(&self, key: &[u8]) -> Option<std::sync::Arc<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        inner.get(key).cloned()
    }

    fn insert(&self, key: Vec<u8>, value: std::sync::Arc<Vec<u8>>) {
        let mut inner = self.inner.lock().unwrap();
        inner.put(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
