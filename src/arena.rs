//! Bump-pointer arena allocator.
//!
//! Backs the skip-list memtable (component D/E): every node and every
//! encoded entry allocated from an [`Arena`] lives exactly as long as the
//! arena itself, and is never individually freed. This matches the
//! ownership model described for the skip list — nodes are addressed by
//! raw pointer and reclaimed only in bulk, at arena teardown.
//!
//! Grounded on `util/arena.h`: a 4 KiB chunk size, a dedicated block for
//! allocations larger than a quarter of a chunk, and a relaxed atomic byte
//! counter so `memory_usage()` can be read from any thread without
//! synchronizing with the (single) writer.

use std::alloc::{Layout, alloc};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Size of a standard arena chunk.
const CHUNK_SIZE: usize = 4096;

/// Bump-pointer allocator used to back a single memtable's skip list.
///
/// `Arena` is `Send` but not `Sync`-for-writes: the design assumes a single
/// writer (serialized externally, per §5 of the storage engine's
/// concurrency model) while `memory_usage()` may be polled concurrently.
pub struct Arena {
    /// Pointer to the next free byte in the current chunk.
    current_ptr: Cell<*mut u8>,
    /// Bytes remaining in the current chunk.
    current_bytes_remaining: Cell<usize>,
    /// All allocated blocks, kept alive for the arena's lifetime.
    blocks: Cell<Vec<(*mut u8, Layout)>>,
    /// Total bytes used, including per-block bookkeeping — read without
    /// synchronization via a relaxed atomic load.
    memory_usage: AtomicUsize,
}

// SAFETY: `Arena` contains raw pointers into its own heap-allocated blocks.
// It is only ever mutated through `&self` methods with interior mutability
// (`Cell`), and the single-writer discipline is enforced by the caller (the
// memtable's insertion path is serialized by an outer mutex). Moving an
// `Arena` across threads is sound because the pointers it owns remain
// valid regardless of which thread accesses them.
unsafe impl Send for Arena {}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Create an empty arena with no allocated chunks.
    pub fn new() -> Self {
        Arena {
            current_ptr: Cell::new(std::ptr::null_mut()),
            current_bytes_remaining: Cell::new(0),
            blocks: Cell::new(Vec::new()),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Allocate `n` unaligned bytes valid for the arena's lifetime.
    ///
    /// Returns a raw pointer; callers are responsible for establishing
    /// alignment/typing guarantees before writing through it (the
    /// skip-list node layout uses [`Arena::allocate_aligned`] instead).
    pub fn allocate(&self, n: usize) -> *mut u8 {
        // Fast path: the current chunk has enough room.
        if n <= self.current_bytes_remaining.get() {
            let ptr = self.current_ptr.get();
            // SAFETY: `n <= current_bytes_remaining` guarantees the bump
            // stays within the chunk allocated in `allocate_new_block`.
            unsafe {
                self.current_ptr.set(ptr.add(n));
            }
            self.current_bytes_remaining
                .set(self.current_bytes_remaining.get() - n);
            return ptr;
        }
        self.allocate_fallback(n)
    }

    fn allocate_fallback(&self, n: usize) -> *mut u8 {
        if n > CHUNK_SIZE / 4 {
            // Large allocations get their own dedicated block so they
            // don't waste the remainder of the current chunk.
            return self.allocate_new_block(n);
        }

        // Waste the remaining bytes in the current chunk and start fresh;
        // this mirrors the reference allocator, which trades a bounded
        // amount of internal fragmentation for a simpler bump allocator.
        let new_chunk = self.allocate_new_block(CHUNK_SIZE);
        self.current_ptr.set(new_chunk);
        self.current_bytes_remaining.set(CHUNK_SIZE);

        let ptr = self.current_ptr.get();
        // SAFETY: the freshly-allocated chunk is `CHUNK_SIZE >= n` bytes.
        unsafe {
            self.current_ptr.set(ptr.add(n));
        }
        self.current_bytes_remaining
            .set(self.current_bytes_remaining.get() - n);
        ptr
    }

    /// Allocate `n` bytes aligned to `max(size_of::<usize>(), 8)`.
    pub fn allocate_aligned(&self, n: usize) -> *mut u8 {
        let align = std::mem::align_of::<usize>().max(8);
        // `align` is a power of two, so `current_ptr & (align - 1)` gives
        // the misalignment of the current bump pointer.
        let current_mod = (self.current_ptr.get() as usize) & (align - 1);
        let slop = if current_mod == 0 {
            0
        } else {
            align - current_mod
        };
        let needed = n + slop;

        if needed <= self.current_bytes_remaining.get() {
            let ptr = unsafe { self.current_ptr.get().add(slop) };
            // SAFETY: `needed <= current_bytes_remaining` bounds the bump.
            unsafe {
                self.current_ptr.set(ptr.add(n));
            }
            self.current_bytes_remaining
                .set(self.current_bytes_remaining.get() - needed);
            debug_assert_eq!((ptr as usize) & (align - 1), 0);
            ptr
        } else {
            // `allocate_fallback` always returns a chunk freshly carved
            // from a newly-allocated block, which the system allocator
            // already aligns generously (>= 8 bytes), so no further
            // adjustment is required here in the fallback path.
            self.allocate_fallback(n)
        }
    }

    fn allocate_new_block(&self, block_bytes: usize) -> *mut u8 {
        // SAFETY: `block_bytes` is always > 0 in this module's call sites;
        // `Layout::from_size_align` only fails on zero/overflowing sizes.
        let layout = match Layout::from_size_align(block_bytes, 8) {
            Ok(layout) => layout,
            Err(_) => {
                // Defensive: this module never constructs an invalid
                // layout, but fail loudly rather than allocate garbage.
                panic!("arena: invalid allocation layout for {block_bytes} bytes");
            }
        };
        // SAFETY: `layout` has non-zero size.
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }

        let mut blocks = self.blocks.take();
        blocks.push((ptr, layout));
        self.blocks.set(blocks);

        self.memory_usage.fetch_add(
            block_bytes + std::mem::size_of::<(*mut u8, Layout)>(),
            Ordering::Relaxed,
        );

        ptr
    }

    /// Total bytes consumed by this arena, including per-block
    /// bookkeeping overhead. Safe to call concurrently with allocation.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for (ptr, layout) in self.blocks.take() {
            // SAFETY: each `(ptr, layout)` pair was produced by a matching
            // `alloc(layout)` call in `allocate_new_block` and is freed
            // exactly once, here, when the arena is torn down.
            unsafe {
                std::alloc::dealloc(ptr, layout);
            }
        }
    }
}
