use std::cell::RefCell;
use std::io::Cursor;

use crate::wal::{Reader, Reporter, Writer};

#[derive(Default)]
struct RecordingReporter {
    drops: RefCell<Vec<(usize, String)>>,
}

impl Reporter for RecordingReporter {
    fn corruption(&self, bytes: usize, reason: &str) {
        self.drops.borrow_mut().push((bytes, reason.to_string()));
    }
}

fn read_all(bytes: Vec<u8>, reporter: &RecordingReporter) -> Vec<Vec<u8>> {
    let mut reader = Reader::new(Cursor::new(bytes), reporter, true, 0);
    let mut out = Vec::new();
    while let Some(record) = reader.read_record().expect("read_record should not error") {
        out.push(record);
    }
    out
}

#[test]
fn single_small_record_round_trips() {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.add_record(b"hello").unwrap();
    let bytes = writer.into_inner().into_inner();

    let reporter = RecordingReporter::default();
    let records = read_all(bytes, &reporter);
    assert_eq!(records, vec![b"hello".to_vec()]);
    assert!(reporter.drops.borrow().is_empty());
}

#[test]
fn multiple_records_round_trip_in_order() {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.add_record(b"alpha").unwrap();
    writer.add_record(b"beta").unwrap();
    writer.add_record(b"gamma").unwrap();
    let bytes = writer.into_inner().into_inner();

    let reporter = RecordingReporter::default();
    let records = read_all(bytes, &reporter);
    assert_eq!(
        records,
        vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]
    );
}

#[test]
fn empty_record_round_trips() {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.add_record(b"").unwrap();
    writer.add_record(b"non-empty").unwrap();
    let bytes = writer.into_inner().into_inner();

    let reporter = RecordingReporter::default();
    let records = read_all(bytes, &reporter);
    assert_eq!(records, vec![b"".to_vec(), b"non-empty".to_vec()]);
}

#[test]
fn reading_past_last_record_yields_none_repeatedly() {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.add_record(b"only").unwrap();
    let bytes = writer.into_inner().into_inner();

    let reporter = RecordingReporter::default();
    let mut reader = Reader::new(Cursor::new(bytes), &reporter, true, 0);
    assert_eq!(reader.read_record().unwrap(), Some(b"only".to_vec()));
    assert_eq!(reader.read_record().unwrap(), None);
    assert_eq!(reader.read_record().unwrap(), None);
}
