//! Palm database container.
//!
//! A database is a short fixed header, one 8-byte header per record giving
//! its absolute offset, a 2-byte gap, and then the record bodies back to
//! back. Record order is significant and is left entirely to the caller.

use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::util::{from_palm_time, to_palm_time};

/// Length of the database header.
pub const HEADER_LEN: usize = 78;
/// Length of a single record header.
pub const RECORD_HEADER_LEN: usize = 8;
/// Gap between the record headers and the first record body.
const GAP_LEN: usize = 2;
/// Longest name that fits, leaving room for a terminating NUL.
const MAX_NAME_LEN: usize = 31;

/// Anything that can be stored as a database record.
pub trait Encode {
    /// Exact number of bytes `write_to` produces.
    fn length(&self) -> usize;

    fn write_to(&self, w: &mut dyn Write) -> io::Result<()>;
}

impl Encode for Vec<u8> {
    fn length(&self) -> usize {
        self.len()
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(self)
    }
}

/// An in-memory Palm database.
#[derive(Debug, Clone)]
pub struct Database<R = Vec<u8>> {
    name: String,
    created: DateTime<Utc>,
    records: Vec<R>,
}

impl<R: Encode> Database<R> {
    pub fn new(name: &str, created: DateTime<Utc>) -> Self {
        Self {
            name: name.trim_end_matches('\0').to_string(),
            created,
            records: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, returning its index.
    pub fn append(&mut self, record: R) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Overwrite the record at `index` in place.
    pub fn replace(&mut self, index: usize, record: R) -> Result<()> {
        let len = self.records.len();
        match self.records.get_mut(index) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(Error::RecordOutOfRange { index, len }),
        }
    }

    /// Serialize the whole database.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let count = u16::try_from(self.records.len()).map_err(|_| {
            Error::invariant(format!("{} records do not fit the record count", self.records.len()))
        })?;

        // Serialize bodies first so every offset is exact.
        let mut body = Vec::new();
        let mut offsets = Vec::with_capacity(self.records.len());
        let first = HEADER_LEN + RECORD_HEADER_LEN * self.records.len() + GAP_LEN;
        for record in &self.records {
            let offset = u32::try_from(first + body.len())
                .map_err(|_| Error::invariant("record offset exceeds u32"))?;
            offsets.push(offset);
            record.write_to(&mut body)?;
        }

        let mut name = [0u8; 32];
        let bytes = self.name.as_bytes();
        let mut n = bytes.len().min(MAX_NAME_LEN);
        while !self.name.is_char_boundary(n) {
            n -= 1;
        }
        name[..n].copy_from_slice(&bytes[..n]);
        w.write_all(&name)?;

        let time = to_palm_time(&self.created);
        w.write_all(&0u16.to_be_bytes())?; // Attributes
        w.write_all(&0u16.to_be_bytes())?; // Version
        w.write_all(&time.to_be_bytes())?; // Creation
        w.write_all(&time.to_be_bytes())?; // Modification
        w.write_all(&time.to_be_bytes())?; // Last backup
        w.write_all(&0u32.to_be_bytes())?; // Modification number
        w.write_all(&0u32.to_be_bytes())?; // App info
        w.write_all(&0u32.to_be_bytes())?; // Sort info
        w.write_all(b"BOOKMOBI")?;

        let last_uid = (2 * count as u32).saturating_sub(1);
        w.write_all(&last_uid.to_be_bytes())?;
        w.write_all(&0u32.to_be_bytes())?; // Next record list
        w.write_all(&count.to_be_bytes())?;

        for (i, offset) in offsets.iter().enumerate() {
            w.write_all(&offset.to_be_bytes())?;
            let uid = ((2 * i) as u32).to_be_bytes();
            w.write_all(&[0, uid[1], uid[2], uid[3]])?;
        }

        w.write_all(&[0; GAP_LEN])?;
        w.write_all(&body)?;
        Ok(())
    }
}

impl Database<Vec<u8>> {
    /// Recover the name, creation time and raw record bytes of a
    /// previously written database. Record contents are not interpreted.
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::InvalidContainer(format!(
                "{} bytes is shorter than the database header",
                data.len()
            )));
        }

        let name_len = data[..32].iter().position(|&b| b == 0).unwrap_or(32);
        let name = String::from_utf8_lossy(&data[..name_len]).into_owned();
        let created = from_palm_time(u32::from_be_bytes([data[36], data[37], data[38], data[39]]));
        let count = u16::from_be_bytes([data[76], data[77]]) as usize;

        let table_end = HEADER_LEN + RECORD_HEADER_LEN * count;
        if data.len() < table_end {
            return Err(Error::InvalidContainer(format!(
                "record table for {count} records is truncated"
            )));
        }

        let offsets: Vec<usize> = (0..count)
            .map(|i| {
                let at = HEADER_LEN + RECORD_HEADER_LEN * i;
                u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize
            })
            .collect();

        let mut records = Vec::with_capacity(count);
        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets.get(i + 1).copied().unwrap_or(data.len());
            if start < table_end || start > end || end > data.len() {
                return Err(Error::InvalidContainer(format!(
                    "record {i} has invalid range {start}..{end}"
                )));
            }
            records.push(data[start..end].to_vec());
        }

        Ok(Self {
            name,
            created,
            records,
        })
    }

    /// Read a database from any [`Read`] source.
    pub fn read_from<T: Read>(mut reader: T) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::read(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Database {
        let created = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let mut db = Database::new("Test_Book", created);
        db.append(b"o".to_vec());
        db.append(b"hi".to_vec());
        db.append(b"cat".to_vec());
        db.append(b"tree".to_vec());
        db
    }

    fn serialize(db: &Database) -> Vec<u8> {
        let mut out = Vec::new();
        db.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_header_layout() {
        let out = serialize(&sample());
        assert_eq!(&out[..9], b"Test_Book");
        assert!(out[9..32].iter().all(|&b| b == 0));
        assert_eq!(&out[60..68], b"BOOKMOBI");
        // Last unique id is 2n - 1
        assert_eq!(u32::from_be_bytes([out[68], out[69], out[70], out[71]]), 7);
        assert_eq!(u16::from_be_bytes([out[76], out[77]]), 4);

        let first = HEADER_LEN + 4 * RECORD_HEADER_LEN + 2;
        assert_eq!(u32::from_be_bytes([out[78], out[79], out[80], out[81]]) as usize, first);
        // Unique ids double the record position
        assert_eq!(&out[90..94], &[0, 0, 0, 2]);
        assert_eq!(out.len(), first + 1 + 2 + 3 + 4);
    }

    #[test]
    fn test_read_write_roundtrip() {
        let db = sample();
        let read = Database::read(&serialize(&db)).unwrap();
        assert_eq!(read.name(), db.name());
        assert_eq!(read.created(), db.created());
        assert_eq!(read.records(), db.records());
    }

    #[test]
    fn test_long_name_truncated() {
        let name = "a".repeat(40);
        let db: Database = Database::new(&name, Utc::now());
        let read = Database::read(&serialize(&db)).unwrap();
        assert_eq!(read.name(), "a".repeat(31));
    }

    #[test]
    fn test_long_name_keeps_whole_characters() {
        // The two-byte 'é' would straddle the 31-byte limit
        let name = format!("{}é{}", "a".repeat(30), "b".repeat(5));
        let db: Database = Database::new(&name, Utc::now());
        let out = serialize(&db);
        assert_eq!(&out[30..32], &[0, 0]);

        let read = Database::read(&out).unwrap();
        assert_eq!(read.name(), "a".repeat(30));
        assert!(name.starts_with(read.name()));
    }

    #[test]
    fn test_replace() {
        let mut db = sample();
        db.replace(0, b"zero".to_vec()).unwrap();
        assert_eq!(db.records()[0], b"zero");
        assert!(matches!(
            db.replace(4, Vec::new()),
            Err(Error::RecordOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_read_truncated() {
        let out = serialize(&sample());
        assert!(Database::read(&out[..40]).is_err());
        assert!(Database::read(&out[..90]).is_err());
    }

    #[test]
    fn test_read_rejects_backwards_offsets() {
        let mut out = serialize(&sample());
        // Point record 1 into the record table
        out[86..90].copy_from_slice(&0x30u32.to_be_bytes());
        assert!(Database::read(&out).is_err());
    }
}
