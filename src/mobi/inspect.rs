//! Reading back books written by this crate.
//!
//! Decodes record 0, the navigation index and the text, which is enough to
//! check a written book without a Kindle at hand.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::pdb::Database;

use super::headers::NULL_INDEX;
use super::index::{ChapterPosition, read_entries, read_labels};
use super::records::HeaderRecord;
use super::vwi::decint_backward;

/// What a written book looks like from the outside.
#[derive(Debug, Clone)]
pub struct BookInfo {
    pub name: String,
    pub created: DateTime<Utc>,
    pub record_lengths: Vec<usize>,
    pub header: HeaderRecord,
    pub chapters: Vec<ChapterPosition>,
}

fn record(db: &Database, index: u32) -> Result<&[u8]> {
    db.records()
        .get(index as usize)
        .map(Vec::as_slice)
        .ok_or(Error::RecordOutOfRange {
            index: index as usize,
            len: db.len(),
        })
}

/// Decode record 0 and the navigation index of a database.
pub fn inspect(db: &Database) -> Result<BookInfo> {
    let header = HeaderRecord::parse(record(db, 0)?)?;

    let chapters = if header.mobi.ncx_index == NULL_INDEX {
        Vec::new()
    } else {
        read_chapters(db, header.mobi.ncx_index)?
    };

    Ok(BookInfo {
        name: db.name().to_string(),
        created: db.created(),
        record_lengths: db.records().iter().map(Vec::len).collect(),
        header,
        chapters,
    })
}

/// Decode the flat navigation index whose header record is `ncx_index`.
pub fn read_chapters(db: &Database, ncx_index: u32) -> Result<Vec<ChapterPosition>> {
    let entries = read_entries(record(db, ncx_index)?, record(db, ncx_index + 1)?)?;
    let labels = read_labels(record(db, ncx_index + 2)?);

    entries
        .iter()
        .map(|entry| {
            let value = |tag: u8| entry.tag(tag).and_then(|v| v.first().copied());
            let (Some(start), Some(length), Some(label)) = (value(1), value(2), value(3)) else {
                return Err(Error::InvalidContainer(format!(
                    "navigation entry {} is incomplete",
                    entry.label
                )));
            };
            Ok(ChapterPosition {
                title: labels.get(&label).cloned().unwrap_or_default(),
                start: start as usize,
                length: length as usize,
            })
        })
        .collect()
}

/// Strip the trailing entries off a text record.
pub fn strip_trailing(record: &[u8]) -> &[u8] {
    let (length, consumed) = decint_backward(record);
    let end = record.len().saturating_sub(length as usize + consumed);
    &record[..end]
}

/// Reassemble the text (HTML flow followed by CSS flows).
pub fn read_text(db: &Database, header: &HeaderRecord) -> Result<Vec<u8>> {
    let count = header.palmdoc.text_record_count as u32;
    let mut text = Vec::with_capacity(header.palmdoc.text_length as usize);
    for index in 1..=count {
        text.extend_from_slice(strip_trailing(record(db, index)?));
    }
    Ok(text)
}
