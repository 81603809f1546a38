//! Palm database round trips through the public API.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tempfile::NamedTempFile;

use kf8::{Database, Error};

#[test]
fn test_raw_records_roundtrip_through_file() {
    let created = Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap();
    let mut db: Database = Database::new("Raw_Records", created);
    db.append(b"first record".to_vec());
    db.append(Vec::new());
    db.append(vec![0xAB; 5000]);

    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let mut file = temp_file.reopen().expect("Failed to reopen temp file");
    db.write(&mut file).expect("Failed to write database");
    drop(file);

    let data = std::fs::read(temp_file.path()).expect("Failed to read back");
    let read = Database::read(&data).expect("Failed to parse database");

    assert_eq!(read.name(), "Raw_Records");
    assert_eq!(read.created(), created);
    assert_eq!(read.records(), db.records());
}

#[test]
fn test_read_from_reader() {
    let mut db: Database = Database::new("Reader", Utc.timestamp_opt(0, 0).unwrap());
    db.append(vec![1, 2, 3]);

    let mut out = Vec::new();
    db.write(&mut out).unwrap();

    let read = Database::read_from(std::io::Cursor::new(out)).unwrap();
    assert_eq!(read.records(), &[vec![1u8, 2, 3]]);
}

#[test]
fn test_replace_out_of_range() {
    let mut db: Database = Database::new("Empty", Utc::now());
    let err = db.replace(0, vec![1]).unwrap_err();
    assert!(matches!(err, Error::RecordOutOfRange { index: 0, len: 0 }));
}

#[test]
fn test_garbage_is_rejected() {
    assert!(matches!(Database::read(b"not a database"), Err(Error::InvalidContainer(_))));
}

proptest! {
    #[test]
    fn raw_records_roundtrip(records in proptest::collection::vec(
        proptest::collection::vec(any::<u8>(), 0..200), 0..20,
    )) {
        let mut db: Database = Database::new("Prop", Utc.timestamp_opt(1_000_000, 0).unwrap());
        for record in &records {
            db.append(record.clone());
        }

        let mut out = Vec::new();
        db.write(&mut out).unwrap();
        let read = Database::read(&out).unwrap();

        prop_assert_eq!(read.name(), "Prop");
        prop_assert_eq!(read.records(), records.as_slice());
    }
}
