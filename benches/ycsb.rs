//! YCSB-style macro-benchmarks for the storage engine core.
//!
//! Measures sustained throughput under realistic mixed workloads inspired
//! by the Yahoo Cloud Serving Benchmark (YCSB), driven directly against
//! the memtable / WAL / SSTable components rather than through any
//! higher-level database façade — there is none in this crate's scope.
//! [`Engine`] below is a minimal harness wiring those three pieces
//! together the way a real storage engine's write and read paths would.
//!
//! # Workloads
//!
//! | Name | Mix | Description |
//! |------|-----|-------------|
//! | **A** | 50% read, 50% update | Session store — heavy read/write |
//! | **B** | 95% read, 5% update | Photo tagging — read-mostly |
//! | **C** | 100% read | User profile cache — read-only |
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench ycsb               # all workloads
//! cargo bench --bench ycsb -- "load"      # load phase only
//! cargo bench --bench ycsb -- "A"         # workload A only
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::Rng;

use aeternusdb::key::{encode_internal_key, parse_internal_key, ByteWiseComparator, Comparator, LookupKey, ValueType};
use aeternusdb::memtable::{Memtable, MemtableLookup};
use aeternusdb::options::{Options, ReadOptions};
use aeternusdb::sstable::builder::SstableBuilder;
use aeternusdb::sstable::reader::SstableReader;
use aeternusdb::wal::Writer as WalWriter;

/// Number of records loaded into the engine before running workloads.
const RECORD_COUNT: u64 = 10_000;

/// Number of operations per workload run.
const OPS_PER_RUN: u64 = 5_000;

/// Value size in bytes.
const VALUE_SIZE: usize = 256;

fn make_key(i: u64) -> Vec<u8> {
    format!("user{i:012}").into_bytes()
}

fn make_value(rng: &mut impl Rng) -> Vec<u8> {
    let mut buf = vec![0u8; VALUE_SIZE];
    rng.fill(&mut buf[..]);
    buf
}

/// Wires a memtable, a WAL writer, and zero or more flushed SSTables
/// together into the read/write path a real engine's front door would
/// dispatch through: every write lands in the memtable (after being
/// durably logged), and a read checks the memtable before falling back
/// to SSTables from newest to oldest.
struct Engine {
    options: Options,
    comparator: Arc<dyn Comparator>,
    memtable: Memtable,
    wal: WalWriter<Vec<u8>>,
    seq: u64,
    sstables: Vec<SstableReader>,
}

impl Engine {
    fn new(write_buffer_size: usize) -> Self {
        let comparator: Arc<dyn Comparator> = Arc::new(ByteWiseComparator);
        let mut options = Options::default();
        options.write_buffer_size = write_buffer_size;
        options.comparator = comparator.clone();
        Engine {
            options,
            comparator,
            memtable: Memtable::new(Box::new(ByteWiseComparator)),
            wal: WalWriter::new(Vec::new()),
            seq: 0,
            sstables: Vec::new(),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.seq += 1;
        let internal_key = encode_internal_key(key, self.seq, ValueType::Value);
        let mut record = Vec::with_capacity(internal_key.len() + value.len());
        record.extend_from_slice(&internal_key);
        record.extend_from_slice(value);
        self.wal.add_record(&record).unwrap();

        self.memtable.add(self.seq, ValueType::Value, key, value);
        if self.memtable.approximate_memory_usage() >= self.options.write_buffer_size {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let mut buf = Vec::new();
        let mut builder = SstableBuilder::new(
            &mut buf,
            self.comparator.clone(),
            self.options.filter_policy.clone(),
            self.options.block_size,
            self.options.block_restart_interval,
            self.options.compression,
        );
        for (internal_key, value) in self.memtable.iter() {
            builder.add(&internal_key, &value).unwrap();
        }
        builder.finish().unwrap();

        let reader = SstableReader::from_bytes(buf, &self.options).unwrap();
        self.sstables.push(reader);
        self.memtable = Memtable::new(Box::new(ByteWiseComparator));
        self.wal = WalWriter::new(Vec::new());
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let lookup = LookupKey::new(key, self.seq);
        match self.memtable.get(&lookup) {
            MemtableLookup::Found(value) => return Some(value),
            MemtableLookup::Deleted => return None,
            MemtableLookup::NotFound => {}
        }

        let read_options = ReadOptions::default();
        for reader in self.sstables.iter().rev() {
            let mut outcome: Option<Option<Vec<u8>>> = None;
            reader
                .get(lookup.internal_key(), &read_options, |found_key, found_value| {
                    if let Some(parsed) = parse_internal_key(found_key) {
                        if parsed.user_key == key {
                            outcome = Some(match parsed.value_type {
                                ValueType::Value => Some(found_value.to_vec()),
                                ValueType::Deletion => None,
                            });
                        }
                    }
                })
                .unwrap();
            if let Some(result) = outcome {
                return result;
            }
        }
        None
    }
}

/// Load phase: insert [`RECORD_COUNT`] sequential records.
///
/// **Scenario:** Writes 10,000 key-value pairs (256 B values) sequentially into a fresh
/// engine with a 256 KiB write buffer, simulating the initial bulk-load of a dataset.
///
/// **What it measures:** Sustained sequential write throughput across the WAL append,
/// memtable insertion, and the SSTable flushes triggered as the write buffer fills.
///
/// **Expected behaviour:** Millisecond range for the full load, dominated by the number of
/// flushes the 256 KiB write buffer forces.
fn load_engine(engine: &mut Engine) {
    let mut rng = rand::rng();
    for i in 0..RECORD_COUNT {
        let key = make_key(i);
        let value = make_value(&mut rng);
        engine.put(&key, &value);
    }
}

/// Workload A — 50% read, 50% update.
///
/// **Real-world analogy:** Session store. A web server reads and updates session data
/// equally — e.g., checking user login state and refreshing session tokens.
///
/// **What it measures:** Performance under a balanced read/write mix with uniform random
/// key access. Updates overwrite existing keys via the memtable, and reads fall back
/// across any flushed SSTables.
///
/// **Expected behaviour:** Dominated by write cost; latency should sit between the pure
/// read (Workload C) and pure-write load phase.
fn run_workload_a(engine: &mut Engine) {
    let mut rng = rand::rng();
    for _ in 0..OPS_PER_RUN {
        let key_id = rng.random_range(0..RECORD_COUNT);
        let key = make_key(key_id);

        if rng.random_bool(0.5) {
            let _ = black_box(engine.get(&key));
        } else {
            let value = make_value(&mut rng);
            engine.put(&key, &value);
        }
    }
}

/// Workload B — 95% read, 5% update.
///
/// **Real-world analogy:** Photo tagging or social-media metadata. The vast majority of
/// accesses are reads (viewing tags/likes), with occasional writes (adding a tag).
///
/// **What it measures:** Read-dominated throughput with light write pressure.
///
/// **Expected behaviour:** Close to Workload C (pure read), with a small overhead from
/// the 5% writes.
fn run_workload_b(engine: &mut Engine) {
    let mut rng = rand::rng();
    for _ in 0..OPS_PER_RUN {
        let key_id = rng.random_range(0..RECORD_COUNT);
        let key = make_key(key_id);

        if rng.random_bool(0.95) {
            let _ = black_box(engine.get(&key));
        } else {
            let value = make_value(&mut rng);
            engine.put(&key, &value);
        }
    }
}

/// Workload C — 100% read.
///
/// **Real-world analogy:** User profile cache. Data is read with no concurrent writes
/// during the measured window.
///
/// **What it measures:** Peak read throughput across memtable and SSTable tiers combined,
/// with zero write contention — the ceiling for point-read performance.
///
/// **Expected behaviour:** The fastest of the three workloads. Latency is determined by
/// how many keys still live in the memtable versus how many have been flushed.
fn run_workload_c(engine: &mut Engine) {
    let mut rng = rand::rng();
    for _ in 0..OPS_PER_RUN {
        let key_id = rng.random_range(0..RECORD_COUNT);
        let key = make_key(key_id);
        let _ = black_box(engine.get(&key));
    }
}

fn bench_load(c: &mut Criterion) {
    c.bench_function("load", |b| {
        b.iter_batched(|| Engine::new(256 * 1024), |mut engine| load_engine(&mut engine), BatchSize::LargeInput);
    });
}

fn bench_workloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("ycsb");

    group.bench_function("A", |b| {
        b.iter_batched(
            || {
                let mut engine = Engine::new(256 * 1024);
                load_engine(&mut engine);
                engine
            },
            |mut engine| run_workload_a(&mut engine),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("B", |b| {
        b.iter_batched(
            || {
                let mut engine = Engine::new(256 * 1024);
                load_engine(&mut engine);
                engine
            },
            |mut engine| run_workload_b(&mut engine),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("C", |b| {
        b.iter_batched(
            || {
                let mut engine = Engine::new(256 * 1024);
                load_engine(&mut engine);
                engine
            },
            |mut engine| run_workload_c(&mut engine),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_load, bench_workloads);
criterion_main!(benches);
