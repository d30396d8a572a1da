use crate::block::{Block, BlockBuilder};
use crate::key::BYTEWISE_COMPARATOR;

fn build_block(entries: &[(&[u8], &[u8])], restart_interval: usize) -> Vec<u8> {
    let mut builder = BlockBuilder::new(restart_interval);
    for (k, v) in entries {
        builder.add(k, v);
    }
    builder.finish().to_vec()
}

#[test]
fn iterates_entries_in_order() {
    let entries: &[(&[u8], &[u8])] = &[(b"a", b"1"), (b"ab", b"2"), (b"b", b"3"), (b"bc", b"4")];
    let bytes = build_block(entries, 2);
    let block = Block::new(&bytes).unwrap();
    let mut iter = block.iter(&BYTEWISE_COMPARATOR);

    iter.seek_to_first();
    let mut collected = Vec::new();
    while iter.valid() {
        collected.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }
    assert!(iter.status().is_ok());
    let expected: Vec<(Vec<u8>, Vec<u8>)> =
        entries.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
    assert_eq!(collected, expected);
}

#[test]
fn seek_to_last_then_reverse_scan_matches_forward_order() {
    let entries: &[(&[u8], &[u8])] =
        &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3"), (b"d", b"4"), (b"e", b"5")];
    let bytes = build_block(entries, 2);
    let block = Block::new(&bytes).unwrap();
    let mut iter = block.iter(&BYTEWISE_COMPARATOR);

    iter.seek_to_last();
    let mut collected = Vec::new();
    while iter.valid() {
        collected.push(iter.key().to_vec());
        iter.prev();
    }
    collected.reverse();
    let expected: Vec<Vec<u8>> = entries.iter().map(|(k, _)| k.to_vec()).collect();
    assert_eq!(collected, expected);
}

#[test]
fn seek_finds_first_key_greater_or_equal() {
    let entries: &[(&[u8], &[u8])] =
        &[(b"apple", b"1"), (b"banana", b"2"), (b"cherry", b"3"), (b"date", b"4")];
    let bytes = build_block(entries, 2);
    let block = Block::new(&bytes).unwrap();

    let mut iter = block.iter(&BYTEWISE_COMPARATOR);
    iter.seek(b"banana");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"banana");

    let mut iter2 = block.iter(&BYTEWISE_COMPARATOR);
    iter2.seek(b"blueberry");
    assert!(iter2.valid());
    assert_eq!(iter2.key(), b"cherry");

    let mut iter3 = block.iter(&BYTEWISE_COMPARATOR);
    iter3.seek(b"zzz");
    assert!(!iter3.valid());
}

#[test]
fn seek_works_across_multiple_restart_points() {
    let entries: Vec<(Vec<u8>, Vec<u8>)> =
        (0..50).map(|i| (format!("key{i:03}").into_bytes(), format!("val{i}").into_bytes())).collect();
    let refs: Vec<(&[u8], &[u8])> = entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();
    let bytes = build_block(&refs, 4);
    let block = Block::new(&bytes).unwrap();

    let mut iter = block.iter(&BYTEWISE_COMPARATOR);
    iter.seek(b"key025");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"key025");
}

#[test]
fn single_restart_point_round_trips() {
    let bytes = build_block(&[(b"only", b"value")], 16);
    let block = Block::new(&bytes).unwrap();
    let mut iter = block.iter(&BYTEWISE_COMPARATOR);
    iter.seek_to_first();
    assert!(iter.valid());
    assert_eq!(iter.key(), b"only");
    assert_eq!(iter.value(), b"value");
    iter.next();
    assert!(!iter.valid());
}

#[test]
fn truncated_block_is_rejected() {
    assert!(Block::new(&[0u8; 3]).is_err());
}
