use crate::key::{ByteWiseComparator, LookupKey, ValueType};
use crate::memtable::{Memtable, MemtableLookup};

fn memtable() -> Memtable {
    Memtable::new(Box::new(ByteWiseComparator))
}

#[test]
fn get_on_empty_memtable_returns_not_found() {
    let table = memtable();
    let lookup = LookupKey::new(b"missing", 1);
    assert_eq!(table.get(&lookup), MemtableLookup::NotFound);
}

#[test]
fn put_then_get_returns_the_value() {
    let table = memtable();
    table.add(1, ValueType::Value, b"k1", b"v1");

    let lookup = LookupKey::new(b"k1", 10);
    assert_eq!(table.get(&lookup), MemtableLookup::Found(b"v1".to_vec()));
}

#[test]
fn delete_then_get_returns_deleted() {
    let table = memtable();
    table.add(1, ValueType::Value, b"k1", b"v1");
    table.add(2, ValueType::Deletion, b"k1", b"");

    let lookup = LookupKey::new(b"k1", 10);
    assert_eq!(table.get(&lookup), MemtableLookup::Deleted);
}

#[test]
fn get_at_an_older_sequence_sees_the_older_value() {
    let table = memtable();
    table.add(1, ValueType::Value, b"k1", b"v1");
    table.add(5, ValueType::Value, b"k1", b"v2");

    let lookup = LookupKey::new(b"k1", 3);
    assert_eq!(table.get(&lookup), MemtableLookup::Found(b"v1".to_vec()));

    let lookup = LookupKey::new(b"k1", 100);
    assert_eq!(table.get(&lookup), MemtableLookup::Found(b"v2".to_vec()));
}

#[test]
fn get_before_any_write_to_that_key_returns_not_found() {
    let table = memtable();
    table.add(5, ValueType::Value, b"k1", b"v1");

    let lookup = LookupKey::new(b"k1", 1);
    assert_eq!(table.get(&lookup), MemtableLookup::NotFound);
}

#[test]
fn iterator_yields_entries_in_internal_key_order() {
    let table = memtable();
    table.add(1, ValueType::Value, b"b", b"vb");
    table.add(1, ValueType::Value, b"a", b"va");
    table.add(2, ValueType::Value, b"a", b"va2");

    let entries: Vec<_> = table
        .iter()
        .map(|(internal_key, value)| {
            let parsed = crate::key::parse_internal_key(&internal_key).unwrap();
            (parsed.user_key.to_vec(), parsed.sequence, value)
        })
        .collect();

    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), 2, b"va2".to_vec()),
            (b"a".to_vec(), 1, b"va".to_vec()),
            (b"b".to_vec(), 1, b"vb".to_vec()),
        ]
    );
}

#[test]
fn approximate_memory_usage_grows_with_inserts() {
    let table = memtable();
    let before = table.approximate_memory_usage();
    for i in 0..100 {
        table.add(i, ValueType::Value, format!("k{i}").as_bytes(), b"value");
    }
    assert!(table.approximate_memory_usage() > before);
}
