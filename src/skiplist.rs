//! Arena-backed concurrent skip list (component D).
//!
//! Backs the memtable. Grounded on `db/skiplist.h`: nodes are allocated
//! from an [`Arena`](crate::arena::Arena) and never individually freed,
//! heights are drawn from a geometric distribution with branching factor
//! 4 up to a maximum of 12, and the structure supports a single writer
//! concurrent with any number of readers without locking, using
//! acquire/release ordering on the next-pointers.
//!
//! Keys are compared with a caller-supplied [`Comparator`]; this module
//! knows nothing about the internal-key format layered on top by the
//! memtable.

use std::cmp::Ordering;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering as AtomicOrdering};

use rand::Rng;

use crate::arena::Arena;
use crate::key::Comparator;

const MAX_HEIGHT: usize = 12;
const BRANCHING_FACTOR: u32 = 4;

#[repr(C)]
struct Node {
    key: *const [u8],
    /// Number of valid trailing `AtomicPtr<Node>` slots following this
    /// header in the arena allocation.
    height: usize,
    /// `next[i]` points to the next node at level `i`. Sized to this
    /// node's actual height at allocation time; only the first `height`
    /// slots are valid, matching the C++ original's flexible-array-member
    /// trick (here done by allocating `height` `AtomicPtr`s directly after
    /// the `Node` header in the arena).
    next: [AtomicPtr<Node>; 0],
}

impl Node {
    fn height(node: *const Node) -> usize {
        // SAFETY: `height` is written once at construction and never
        // mutated afterward.
        unsafe { (*node).height }
    }

    fn next_slot(node: *mut Node, level: usize) -> *mut AtomicPtr<Node> {
        debug_assert!(level < Self::height(node));
        // SAFETY: `node` was allocated with `height` trailing `AtomicPtr`
        // slots immediately following the `Node` header (see
        // `SkipList::allocate_node`).
        unsafe {
            let base = (node as *mut u8).add(std::mem::size_of::<Node>()) as *mut AtomicPtr<Node>;
            base.add(level)
        }
    }

    fn next(node: *mut Node, level: usize) -> *mut Node {
        // SAFETY: slot is valid per `next_slot`; acquire pairs with the
        // release store in `set_next`, so a reader observing a non-null
        // node also observes that node's fully-initialized key.
        unsafe { (*Self::next_slot(node, level)).load(AtomicOrdering::Acquire) }
    }

    fn set_next(node: *mut Node, level: usize, target: *mut Node) {
        // SAFETY: see `next`. Release ensures the target's key/contents
        // (written before it was linked in) are visible to any reader
        // that observes this store via `next`'s acquire load.
        unsafe {
            (*Self::next_slot(node, level)).store(target, AtomicOrdering::Release);
        }
    }

    fn key<'a>(node: *const Node) -> &'a [u8] {
        // SAFETY: `key` is set once at construction to point at arena
        // memory that outlives the node.
        unsafe { &*(*node).key }
    }
}

/// A concurrent, arena-backed skip list ordered by a [`Comparator`].
///
/// Supports one concurrent writer (insertion is not internally
/// synchronized — the memtable serializes writers with an outer mutex)
/// and any number of concurrent lock-free readers.
pub struct SkipList {
    comparator: Box<dyn Comparator>,
    arena: Arena,
    head: *mut Node,
    max_height: AtomicUsize,
}

// SAFETY: all mutation goes through atomics with acquire/release ordering
// on the pointer fields that matter for cross-thread visibility; the
// arena itself is `Send`. A `SkipList` may therefore be moved to another
// thread, and shared via `&SkipList` across threads for reads.
unsafe impl Send for SkipList {}
unsafe impl Sync for SkipList {}

impl SkipList {
    /// Create an empty skip list ordered by `comparator`.
    pub fn new(comparator: Box<dyn Comparator>) -> Self {
        let arena = Arena::new();
        let head = Self::allocate_node(&arena, &[], MAX_HEIGHT);
        SkipList {
            comparator,
            arena,
            head,
            max_height: AtomicUsize::new(1),
        }
    }

    fn allocate_node(arena: &Arena, key: &[u8], height: usize) -> *mut Node {
        let node_size = std::mem::size_of::<Node>();
        let slots_size = height * std::mem::size_of::<AtomicPtr<Node>>();
        let total = node_size + slots_size;
        let ptr = arena.allocate_aligned(total) as *mut Node;

        // SAFETY: `ptr` points at a valid, arena-owned allocation large
        // enough for a `Node` header plus `height` trailing `AtomicPtr`
        // slots. `height` is recorded before any slot is touched so
        // `next_slot`'s bounds check sees the right value.
        unsafe {
            ptr::addr_of_mut!((*ptr).height).write(height);
        }
        for level in 0..height {
            // SAFETY: slot `level < height`, matches the layout just
            // recorded above.
            unsafe {
                ptr::write(Node::next_slot(ptr, level), AtomicPtr::new(ptr::null_mut()));
            }
        }

        let key_storage: *const [u8] = if key.is_empty() {
            // The head node carries no key and is never compared against.
            &[]
        } else {
            let key_ptr = arena.allocate(key.len());
            // SAFETY: `key_ptr` is a fresh `key.len()`-byte allocation.
            unsafe {
                ptr::copy_nonoverlapping(key.as_ptr(), key_ptr, key.len());
                std::slice::from_raw_parts(key_ptr, key.len())
            }
        };

        // SAFETY: `ptr` points at a valid, arena-owned `Node` allocation.
        unsafe {
            ptr::addr_of_mut!((*ptr).key).write(key_storage);
        }

        ptr
    }

    fn random_height() -> usize {
        let mut height = 1;
        let mut rng = rand::rng();
        while height < MAX_HEIGHT && rng.random_ratio(1, BRANCHING_FACTOR) {
            height += 1;
        }
        height
    }

    fn max_height(&self) -> usize {
        self.max_height.load(AtomicOrdering::Relaxed)
    }

    fn key_is_after_node(&self, key: &[u8], node: *mut Node) -> bool {
        if node.is_null() {
            return false;
        }
        self.comparator.compare(Node::key(node), key) == Ordering::Less
    }

    /// Find the first node whose key is `>= key`, optionally recording the
    /// immediately preceding node at each level in `prev` (used by
    /// `insert` to splice in a new node).
    fn find_greater_or_equal(&self, key: &[u8], mut prev: Option<&mut [*mut Node; MAX_HEIGHT]>) -> *mut Node {
        let mut level = self.max_height() - 1;
        let mut x = self.head;
        loop {
            // SAFETY (for all `Node::next` calls in this module): `x` is
            // either `self.head` (height == MAX_HEIGHT) or was reached by
            // following a `next` pointer stored at exactly this `level`,
            // which only exists if `x`'s own height is `> level`; every
            // subsequent use of the same `x` only ever decreases `level`,
            // so the invariant `level < Node::height(x)` holds throughout.
            let next = Node::next(x, level);
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(ref mut prev) = prev {
                    prev[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    fn find_less_than(&self, key: &[u8]) -> *mut Node {
        let mut level = self.max_height() - 1;
        let mut x = self.head;
        loop {
            let next = Node::next(x, level);
            if !next.is_null() && self.comparator.compare(Node::key(next), key) == Ordering::Less {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }

    fn find_last(&self) -> *mut Node {
        let mut level = self.max_height() - 1;
        let mut x = self.head;
        loop {
            let next = Node::next(x, level);
            if !next.is_null() {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }

    /// Insert `key`. The caller must ensure no equal key is already
    /// present (the memtable enforces this by construction: internal keys
    /// are unique because every insert carries a fresh sequence number).
    pub fn insert(&self, key: &[u8]) {
        let mut prev: [*mut Node; MAX_HEIGHT] = [self.head; MAX_HEIGHT];
        let x = self.find_greater_or_equal(key, Some(&mut prev));
        debug_assert!(x.is_null() || self.comparator.compare(Node::key(x), key) != Ordering::Equal);

        let height = Self::random_height();
        if height > self.max_height() {
            for slot in prev.iter_mut().take(height).skip(self.max_height()) {
                *slot = self.head;
            }
            self.max_height.store(height, AtomicOrdering::Relaxed);
        }

        let new_node = Self::allocate_node(&self.arena, key, height);
        for (level, prev_node) in prev.iter().enumerate().take(height) {
            // Splice: the new node's next pointer is set first (plain
            // write is fine, not yet visible to readers), then the
            // predecessor's pointer is published with Release so a
            // concurrent reader either sees the old chain or the fully
            // linked new node, never a half-initialized one.
            Node::set_next(new_node, level, Node::next(*prev_node, level));
            Node::set_next(*prev_node, level, new_node);
        }
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        let node = self.find_greater_or_equal(key, None);
        !node.is_null() && self.comparator.compare(Node::key(node), key) == Ordering::Equal
    }

    /// Approximate memory consumed by this skip list's arena.
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    /// A read-only cursor over this skip list.
    pub fn iter(&self) -> SkipListIterator<'_> {
        SkipListIterator {
            list: self,
            node: ptr::null_mut(),
        }
    }
}

/// A bidirectional cursor over a [`SkipList`]'s entries in comparator
/// order. Safe to use concurrently with ongoing inserts on other threads,
/// except that it must not outlive the list.
pub struct SkipListIterator<'b> {
    list: &'b SkipList,
    node: *mut Node,
}

impl<'b> SkipListIterator<'b> {
    /// Returns `true` if the cursor is positioned on a valid entry.
    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }

    /// The key at the current position. Panics if `!valid()`.
    pub fn key(&self) -> &'b [u8] {
        assert!(self.valid());
        Node::key(self.node)
    }

    /// Advance to the next entry.
    pub fn next(&mut self) {
        assert!(self.valid());
        self.node = Node::next(self.node, 0);
    }

    /// Move to the previous entry (linear: no back-links are stored, so
    /// this re-walks from the head, matching the reference skip list's
    /// iterator).
    pub fn prev(&mut self) {
        assert!(self.valid());
        let key = self.key().to_vec();
        let node = self.list.find_less_than(&key);
        self.node = if node == self.list.head { ptr::null_mut() } else { node };
    }

    /// Position at the first entry `>= target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.node = self.list.find_greater_or_equal(target, None);
    }

    /// Position at the first entry in the list.
    pub fn seek_to_first(&mut self) {
        self.node = Node::next(self.list.head, 0);
    }

    /// Position at the last entry in the list.
    pub fn seek_to_last(&mut self) {
        let last = self.list.find_last();
        self.node = if last == self.list.head { ptr::null_mut() } else { last };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ByteWiseComparator;

    fn keys(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("key{i:05}").into_bytes()).collect()
    }

    #[test]
    fn insert_and_contains() {
        let list = SkipList::new(Box::new(ByteWiseComparator));
        for k in keys(200) {
            list.insert(&k);
        }
        for k in keys(200) {
            assert!(list.contains(&k));
        }
        assert!(!list.contains(b"missing"));
    }

    #[test]
    fn iterator_visits_keys_in_order() {
        let list = SkipList::new(Box::new(ByteWiseComparator));
        let mut ks = keys(500);
        // Insert in a shuffled-ish order (reverse) to exercise splicing at
        // arbitrary positions, not just append-at-tail.
        for k in ks.iter().rev() {
            list.insert(k);
        }
        ks.sort();

        let mut it = list.iter();
        it.seek_to_first();
        for expected in &ks {
            assert!(it.valid());
            assert_eq!(it.key(), expected.as_slice());
            it.next();
        }
        assert!(!it.valid());
    }

    #[test]
    fn seek_lands_on_first_key_greater_or_equal() {
        let list = SkipList::new(Box::new(ByteWiseComparator));
        for k in [b"a".to_vec(), b"c".to_vec(), b"e".to_vec()] {
            list.insert(&k);
        }
        let mut it = list.iter();
        it.seek(b"b");
        assert!(it.valid());
        assert_eq!(it.key(), b"c");

        it.seek(b"z");
        assert!(!it.valid());
    }

    #[test]
    fn seek_to_last_and_prev_walk_backward() {
        let list = SkipList::new(Box::new(ByteWiseComparator));
        for k in [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()] {
            list.insert(&k);
        }
        let mut it = list.iter();
        it.seek_to_last();
        assert_eq!(it.key(), b"c");
        it.prev();
        assert_eq!(it.key(), b"b");
        it.prev();
        assert_eq!(it.key(), b"a");
    }
}
