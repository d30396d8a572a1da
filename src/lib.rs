//! # AeternusDB core
//!
//! The read/write path of a **Log-Structured Merge Tree (LSM-tree)**
//! storage engine: the in-memory write buffer, the write-ahead log that
//! makes it crash-safe, and the on-disk sorted table format writes are
//! eventually flushed into.
//!
//! This crate deliberately stops at the core: there is no compaction
//! scheduler, no manifest, and no public `Db`/`Engine` façade tying the
//! pieces together into an open/get/put/delete API. What's here is the
//! load-bearing machinery those layers would be built on.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`arena`] | Bump-pointer allocator backing the skip list |
//! | [`skiplist`] | Lock-free, single-writer/multi-reader ordered index |
//! | [`key`] | Internal key encoding and comparator contracts |
//! | [`memtable`] | In-memory sorted write buffer over a skip list |
//! | [`wal`] | Block-framed, fragmented, CRC-protected write-ahead log |
//! | [`block`] | Restart-interval-compressed key/value block format |
//! | [`filter`] | Per-block filter policy (Bloom filter) |
//! | [`cache`] | Pluggable block cache |
//! | [`sstable`] | Immutable, sorted, on-disk tables built from flushed memtables |
//! | [`options`] | Tunables shared by the components above |
//! | [`encoding`] | Varint/fixed-width byte codecs shared by on-disk formats |
//! | [`error`] | Crate-wide error taxonomy |
//!
//! ## Key properties
//!
//! - **Write-ahead logging** — every mutation can be made durable by
//!   appending it to a [`wal::Writer`] before it lands in the memtable.
//! - **Multi-version keys** — entries are ordered by user key ascending,
//!   then by sequence number descending, so the newest version of a key
//!   sorts first and stale versions fall away naturally.
//! - **Point tombstones** — deletes are recorded as a distinguished
//!   [`key::ValueType::Deletion`] entry rather than removed in place.
//! - **Block-level CRC32 integrity** — WAL records and SSTable blocks are
//!   checksummed independently so a single corrupted block doesn't make
//!   the rest of a file unreadable.
//! - **Bloom filter lookups** — an SSTable's [`filter::FilterPolicy`] lets
//!   a reader skip a block entirely on a negative point lookup.

#![allow(dead_code)]

pub mod arena;
pub mod block;
pub mod cache;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod key;
pub mod memtable;
pub mod options;
pub mod skiplist;
pub mod sstable;
pub mod wal;
