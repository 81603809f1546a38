//! KF8 index records (INDX, TAGX, IDXT) and label records (CNCX).
//!
//! KF8 files use three indexes:
//! - Skeleton index: where each chunk's head markup sits in the text
//! - Chunk index: where each chunk's content sits, plus an anchor selector
//! - NCX index: table of contents, one flat entry per chapter
//!
//! Each index is written as a header record carrying the tag table,
//! followed by one record with the entries themselves. Chunk and NCX
//! entries point into a label record by byte offset.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::util::pad_to;

use super::tagx::{CHUNK_TABLE, NCX_TABLE, SKELETON_TABLE, Tag, TagTable, parse_tagx};
use super::vwi::{decint, encint};

pub const INDX_HEADER_LEN: usize = 192;
/// `IDXT` tag preceding the offset table.
const IDXT_TAG_LEN: usize = 4;

/// Where one chunk landed in the text: its head markup, then its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPosition {
    pub head_start: usize,
    pub head_length: usize,
    pub content_start: usize,
    pub content_length: usize,
}

/// Where one chapter landed in the text. Spans all of its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPosition {
    pub title: String,
    pub start: usize,
    pub length: usize,
}

impl ChapterPosition {
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Encode one index entry: length-prefixed label, control byte, values.
pub fn encode_entry(label: &str, table: TagTable, values: &[u32]) -> Result<Vec<u8>> {
    let label_len = u8::try_from(label.len())
        .map_err(|_| Error::invariant(format!("index label of {} bytes is too long", label.len())))?;

    let mut entry = Vec::with_capacity(2 + label.len() + values.len() * 2);
    entry.push(label_len);
    entry.extend_from_slice(label.as_bytes());
    entry.push(table.control_byte()?);
    for &value in values {
        entry.extend(encint(value));
    }
    Ok(entry)
}

/// A single INDX record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    header_type: u32,
    index_type: u32,
    tag_table: Option<TagTable>,
    entries: Vec<Vec<u8>>,
    sub_entry_count: u32,
    label_record_count: u32,
}

impl IndexRecord {
    /// Record holding the entries themselves. Carries no tag table.
    pub fn entries(entries: Vec<Vec<u8>>) -> Result<Self> {
        Self::checked(Self {
            header_type: 1,
            index_type: 0,
            tag_table: None,
            entries,
            sub_entry_count: 0,
            label_record_count: 0,
        })
    }

    /// Header record of an index: the schema, the total entry count, and
    /// one entry naming the last key of the entry record.
    pub fn header(
        table: TagTable,
        last_label: &str,
        entry_count: usize,
        label_record_count: u32,
    ) -> Result<Self> {
        let count = u16::try_from(entry_count)
            .map_err(|_| Error::invariant(format!("{entry_count} index entries do not fit")))?;
        let label_len = u8::try_from(last_label.len())
            .map_err(|_| Error::invariant("index header label is too long"))?;

        let mut entry = Vec::with_capacity(1 + last_label.len() + 2);
        entry.push(label_len);
        entry.extend_from_slice(last_label.as_bytes());
        entry.extend_from_slice(&count.to_be_bytes());

        Self::checked(Self {
            header_type: 0,
            index_type: 2,
            tag_table: Some(table),
            entries: vec![entry],
            sub_entry_count: count as u32,
            label_record_count,
        })
    }

    fn checked(record: Self) -> Result<Self> {
        let last = record.entries_start()
            + record.entries.iter().map(Vec::len).sum::<usize>()
            - record.entries.last().map_or(0, Vec::len);
        if last > u16::MAX as usize {
            return Err(Error::invariant(format!(
                "index entry offset {last} does not fit the offset table"
            )));
        }
        Ok(record)
    }

    pub fn raw_entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    fn entries_start(&self) -> usize {
        INDX_HEADER_LEN + self.tag_table.map_or(0, |t| t.block_length())
    }

    fn entries_end(&self) -> usize {
        self.entries_start() + self.entries.iter().map(Vec::len).sum::<usize>()
    }

    fn idxt_start(&self) -> usize {
        let end = self.entries_end();
        end + pad_to(end, 4)
    }

    pub fn length(&self) -> usize {
        let unpadded = self.idxt_start() + IDXT_TAG_LEN + 2 * self.entries.len();
        unpadded + pad_to(unpadded, 4)
    }

    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        let idxt_start = self.idxt_start();

        // INDX header
        w.write_all(b"INDX")?;
        w.write_all(&(INDX_HEADER_LEN as u32).to_be_bytes())?;
        w.write_all(&[0u8; 4])?;
        w.write_all(&self.header_type.to_be_bytes())?; // 12
        w.write_all(&self.index_type.to_be_bytes())?; // 16
        w.write_all(&(idxt_start as u32).to_be_bytes())?; // 20
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?; // 24
        w.write_all(&65001u32.to_be_bytes())?; // 28
        w.write_all(&0xFFFF_FFFFu32.to_be_bytes())?; // Language (32)
        w.write_all(&self.sub_entry_count.to_be_bytes())?; // 36
        w.write_all(&0u32.to_be_bytes())?; // ORDT
        w.write_all(&0u32.to_be_bytes())?; // LIGT
        w.write_all(&0u32.to_be_bytes())?; // LIGT count
        w.write_all(&self.label_record_count.to_be_bytes())?; // 52
        w.write_all(&[0u8; 124])?;
        let tagx_offset = if self.tag_table.is_some() { INDX_HEADER_LEN as u32 } else { 0 };
        w.write_all(&tagx_offset.to_be_bytes())?; // 180
        w.write_all(&[0u8; 8])?;

        if let Some(table) = self.tag_table {
            w.write_all(&table.to_bytes())?;
        }

        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut pos = self.entries_start();
        for entry in &self.entries {
            offsets.push(pos as u16);
            w.write_all(entry)?;
            pos += entry.len();
        }
        w.write_all(&[0u8; 3][..idxt_start - pos])?;

        w.write_all(b"IDXT")?;
        for offset in &offsets {
            w.write_all(&offset.to_be_bytes())?;
        }
        let end = idxt_start + IDXT_TAG_LEN + 2 * offsets.len();
        w.write_all(&[0u8; 3][..pad_to(end, 4)])
    }
}

/// Label record (CNCX): length-prefixed strings addressed by byte offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRecord {
    data: Vec<u8>,
    count: usize,
}

impl LabelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label, returning its offset within the record.
    ///
    /// Readers take the high half of an offset as a label record number,
    /// so every label must start within the first 64 KiB.
    pub fn push(&mut self, label: &str) -> Result<u32> {
        let offset = self.data.len();
        if offset > u16::MAX as usize {
            return Err(Error::invariant(format!(
                "label offset {offset} does not fit a single label record"
            )));
        }
        self.data.extend(encint(label.len() as u32));
        self.data.extend_from_slice(label.as_bytes());
        self.count += 1;
        Ok(offset as u32)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn length(&self) -> usize {
        self.data.len() + pad_to(self.data.len(), 4)
    }

    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.data)?;
        w.write_all(&[0u8; 3][..pad_to(self.data.len(), 4)])
    }
}

/// Header record, entry record, and label record (if any) of one index.
#[derive(Debug, Clone)]
pub struct IndexRecords {
    pub header: IndexRecord,
    pub entries: IndexRecord,
    pub labels: Option<LabelRecord>,
}

/// Skeleton index: one entry per chunk pointing at its head markup.
pub fn skeleton_index(chunks: &[ChunkPosition]) -> Result<IndexRecords> {
    let mut entries = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let start = chunk.head_start as u32;
        let length = chunk.head_length as u32;
        // Chunk count and geometry are each written twice
        let values = [1, 1, start, length, start, length];
        entries.push(encode_entry(&format!("SKEL{i:010}"), SKELETON_TABLE, &values)?);
    }

    let last = chunks.len().saturating_sub(1);
    Ok(IndexRecords {
        header: IndexRecord::header(SKELETON_TABLE, &format!("SKEL{last:010}"), chunks.len(), 0)?,
        entries: IndexRecord::entries(entries)?,
        labels: None,
    })
}

/// Anchor selector for the chunk with the given ordinal.
pub fn chunk_selector(ordinal: usize) -> String {
    format!("P-//*[@aid='{ordinal:04}']")
}

/// Chunk index: one entry per chunk pointing at its content, with an
/// anchor selector in the label record.
pub fn chunk_index(chunks: &[ChunkPosition], text_length: usize) -> Result<IndexRecords> {
    let mut labels = LabelRecord::new();
    let mut entries = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let label_offset = labels.push(&chunk_selector(i))?;
        let values = [label_offset, i as u32, i as u32, 0, chunk.content_length as u32];
        let key = format!("{:010}", chunk.content_start);
        entries.push(encode_entry(&key, CHUNK_TABLE, &values)?);
    }

    Ok(IndexRecords {
        header: IndexRecord::header(CHUNK_TABLE, &format!("{text_length:010}"), chunks.len(), 1)?,
        entries: IndexRecord::entries(entries)?,
        labels: Some(labels),
    })
}

/// NCX index: one flat entry per chapter, titles in the label record.
pub fn navigation_index(chapters: &[ChapterPosition]) -> Result<IndexRecords> {
    let mut labels = LabelRecord::new();
    let mut entries = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        let label_offset = labels.push(&chapter.title)?;
        let values = [chapter.start as u32, chapter.length as u32, label_offset, 0];
        let key = format!("{:03}", chapter.start);
        entries.push(encode_entry(&key, NCX_TABLE, &values)?);
    }

    let last = chapters.len().saturating_sub(1);
    Ok(IndexRecords {
        header: IndexRecord::header(NCX_TABLE, &format!("{last:03}"), chapters.len(), 1)?,
        entries: IndexRecord::entries(entries)?,
        labels: Some(labels),
    })
}

// ============================================================================
// Inspection
// ============================================================================

/// Parsed INDX header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndxHeader {
    pub header_type: u32,
    pub index_type: u32,
    pub idxt_start: u32,
    pub entry_count: u32,
    pub encoding: u32,
    pub total_entries: u32,
    pub label_record_count: u32,
    pub tagx_offset: u32,
}

impl IndxHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < INDX_HEADER_LEN || &data[0..4] != b"INDX" {
            return Err(Error::InvalidContainer("invalid INDX header".into()));
        }

        let u32_at = |offset: usize| -> u32 {
            u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ])
        };

        Ok(Self {
            header_type: u32_at(12),
            index_type: u32_at(16),
            idxt_start: u32_at(20),
            entry_count: u32_at(24),
            encoding: u32_at(28),
            total_entries: u32_at(36),
            label_record_count: u32_at(52),
            tagx_offset: u32_at(180),
        })
    }
}

/// A decoded index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub label: String,
    /// Values per tag number, in tag table order.
    pub values: Vec<(u8, Vec<u32>)>,
}

impl IndexEntry {
    pub fn tag(&self, number: u8) -> Option<&[u32]> {
        self.values
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| v.as_slice())
    }
}

/// Offsets of every entry in an INDX record, read from its IDXT table.
fn entry_offsets(data: &[u8], header: &IndxHeader) -> Result<Vec<usize>> {
    let start = header.idxt_start as usize;
    let count = header.entry_count as usize;
    if data.len() < start + IDXT_TAG_LEN + 2 * count || &data[start..start + 4] != b"IDXT" {
        return Err(Error::InvalidContainer("invalid IDXT table".into()));
    }
    Ok((0..count)
        .map(|i| {
            let at = start + IDXT_TAG_LEN + 2 * i;
            u16::from_be_bytes([data[at], data[at + 1]]) as usize
        })
        .collect())
}

/// Decode the values following one control byte.
fn decode_values(tags: &[Tag], control_byte: u8, data: &[u8]) -> Vec<(u8, Vec<u32>)> {
    let mut pos = 0;
    let mut result = Vec::new();

    for tag in tags {
        if tag.terminator {
            break;
        }
        let value = control_byte & tag.mask;
        if value == 0 {
            continue;
        }

        let mut mask = tag.mask;
        let mut groups = value;
        while mask & 1 == 0 {
            mask >>= 1;
            groups >>= 1;
        }

        let mut values = Vec::new();
        for _ in 0..(groups as usize * tag.values_per_unit as usize) {
            if pos >= data.len() {
                break;
            }
            let (v, consumed) = decint(&data[pos..]);
            pos += consumed;
            values.push(v);
        }
        result.push((tag.number, values));
    }

    result
}

/// Decode every entry of an index, given its header and entry records.
pub fn read_entries(header_record: &[u8], entry_record: &[u8]) -> Result<Vec<IndexEntry>> {
    let header = IndxHeader::parse(header_record)?;
    let tagx_start = header.tagx_offset as usize;
    if tagx_start == 0 || tagx_start >= header_record.len() {
        return Err(Error::InvalidContainer("index header has no TAGX".into()));
    }
    let (_, tags) = parse_tagx(&header_record[tagx_start..])?;

    let indx = IndxHeader::parse(entry_record)?;
    let offsets = entry_offsets(entry_record, &indx)?;

    let mut entries = Vec::with_capacity(offsets.len());
    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(indx.idxt_start as usize);
        let raw = entry_record
            .get(start..end)
            .ok_or_else(|| Error::InvalidContainer(format!("index entry {i} out of bounds")))?;

        let label_len = *raw.first().unwrap_or(&0) as usize;
        if raw.len() < 2 + label_len {
            return Err(Error::InvalidContainer(format!("index entry {i} is truncated")));
        }
        let label = String::from_utf8_lossy(&raw[1..1 + label_len]).into_owned();
        let control_byte = raw[1 + label_len];
        let values = decode_values(&tags, control_byte, &raw[2 + label_len..]);
        entries.push(IndexEntry { label, values });
    }

    Ok(entries)
}

/// Decode a label record into offset -> label.
pub fn read_labels(data: &[u8]) -> BTreeMap<u32, String> {
    let mut labels = BTreeMap::new();
    let mut pos = 0;
    while pos < data.len() {
        let (length, consumed) = decint(&data[pos..]);
        if length == 0 {
            // Zero padding
            break;
        }
        let start = pos + consumed;
        let end = start + length as usize;
        if end > data.len() {
            break;
        }
        labels.insert(pos as u32, String::from_utf8_lossy(&data[start..end]).into_owned());
        pos = end;
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(record: &IndexRecord) -> Vec<u8> {
        let mut out = Vec::new();
        record.write_to(&mut out).unwrap();
        out
    }

    fn chunks() -> Vec<ChunkPosition> {
        vec![
            ChunkPosition {
                head_start: 0,
                head_length: 100,
                content_start: 100,
                content_length: 50,
            },
            ChunkPosition {
                head_start: 150,
                head_length: 100,
                content_start: 250,
                content_length: 5000,
            },
        ]
    }

    #[test]
    fn test_encode_entry() {
        let entry = encode_entry("SKEL0000000000", SKELETON_TABLE, &[1, 1, 0, 100, 0, 100]).unwrap();
        assert_eq!(entry[0], 14);
        assert_eq!(&entry[1..15], b"SKEL0000000000");
        assert_eq!(entry[15], 0x0A);
        assert_eq!(&entry[16..], &[0x81, 0x81, 0x80, 0xE4, 0x80, 0xE4]);
    }

    #[test]
    fn test_encode_entry_rejects_long_label() {
        let label = "x".repeat(256);
        assert!(encode_entry(&label, NCX_TABLE, &[]).is_err());
    }

    #[test]
    fn test_entry_record_without_table_is_aligned() {
        for k in 0..8 {
            let entries = (0..k).map(|i| vec![i as u8; i + 1]).collect();
            let record = IndexRecord::entries(entries).unwrap();
            let out = serialize(&record);
            assert_eq!(out.len(), record.length());
            assert_eq!(out.len() % 4, 0);
        }
    }

    #[test]
    fn test_idxt_start_aligned() {
        let record = IndexRecord::entries(vec![vec![1, 2, 3], vec![4, 5]]).unwrap();
        let out = serialize(&record);
        let header = IndxHeader::parse(&out).unwrap();
        assert_eq!(header.idxt_start % 4, 0);
        assert_eq!(header.idxt_start, 200);
        assert_eq!(&out[200..204], b"IDXT");
        // Offsets are relative to the record start
        assert_eq!(&out[204..208], &[0, 192, 0, 195]);
        assert_eq!(header.tagx_offset, 0);
        assert_eq!(header.header_type, 1);
    }

    #[test]
    fn test_header_record() {
        let record = IndexRecord::header(SKELETON_TABLE, "SKEL0000000002", 3, 0).unwrap();
        let out = serialize(&record);
        assert_eq!(out.len(), record.length());

        let header = IndxHeader::parse(&out).unwrap();
        assert_eq!(header.header_type, 0);
        assert_eq!(header.index_type, 2);
        assert_eq!(header.entry_count, 1);
        assert_eq!(header.total_entries, 3);
        assert_eq!(header.tagx_offset, 192);
        assert_eq!(&out[192..196], b"TAGX");

        // Label then the raw entry count
        let entry = 192 + SKELETON_TABLE.block_length();
        assert_eq!(out[entry], 14);
        assert_eq!(&out[entry + 1..entry + 15], b"SKEL0000000002");
        assert_eq!(&out[entry + 15..entry + 17], &3u16.to_be_bytes());
    }

    #[test]
    fn test_skeleton_index() {
        let records = skeleton_index(&chunks()).unwrap();
        assert!(records.labels.is_none());

        let header = serialize(&records.header);
        let body = serialize(&records.entries);
        let entries = read_entries(&header, &body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].label, "SKEL0000000001");
        assert_eq!(entries[1].tag(1), Some(&[1, 1][..]));
        assert_eq!(entries[1].tag(6), Some(&[150, 100, 150, 100][..]));
    }

    #[test]
    fn test_chunk_index() {
        let records = chunk_index(&chunks(), 5250).unwrap();
        let header = serialize(&records.header);
        let body = serialize(&records.entries);

        let indx = IndxHeader::parse(&header).unwrap();
        assert_eq!(indx.label_record_count, 1);
        assert_eq!(&header[192 + CHUNK_TABLE.block_length() + 1..][..10], b"0000005250");

        let entries = read_entries(&header, &body).unwrap();
        assert_eq!(entries[0].label, "0000000100");
        assert_eq!(entries[1].label, "0000000250");
        assert_eq!(entries[1].tag(3), Some(&[1][..]));
        assert_eq!(entries[1].tag(4), Some(&[1][..]));
        assert_eq!(entries[1].tag(6), Some(&[0, 5000][..]));

        let mut cncx = Vec::new();
        records.labels.as_ref().unwrap().write_to(&mut cncx).unwrap();
        let labels = read_labels(&cncx);
        let offset = entries[1].tag(2).unwrap()[0];
        assert_eq!(labels[&offset], "P-//*[@aid='0001']");
    }

    #[test]
    fn test_navigation_index() {
        let chapters = vec![
            ChapterPosition {
                title: "Chapter 1".into(),
                start: 0,
                length: 150,
            },
            ChapterPosition {
                title: "Chapter 2".into(),
                start: 150,
                length: 5100,
            },
        ];
        let records = navigation_index(&chapters).unwrap();
        let header = serialize(&records.header);
        let body = serialize(&records.entries);

        let indx = IndxHeader::parse(&header).unwrap();
        assert_eq!(indx.total_entries, 2);

        let entries = read_entries(&header, &body).unwrap();
        assert_eq!(entries[0].label, "000");
        assert_eq!(entries[1].label, "150");
        assert_eq!(entries[1].tag(1), Some(&[150][..]));
        assert_eq!(entries[1].tag(2), Some(&[5100][..]));
        assert_eq!(entries[1].tag(4), Some(&[0][..]));

        let mut cncx = Vec::new();
        records.labels.as_ref().unwrap().write_to(&mut cncx).unwrap();
        let labels = read_labels(&cncx);
        assert_eq!(labels[&entries[1].tag(3).unwrap()[0]], "Chapter 2");
    }

    #[test]
    fn test_label_record_padding() {
        let mut labels = LabelRecord::new();
        assert_eq!(labels.push("abc").unwrap(), 0);
        assert_eq!(labels.push("de").unwrap(), 4);
        let mut out = Vec::new();
        labels.write_to(&mut out).unwrap();
        assert_eq!(out, vec![0x83, b'a', b'b', b'c', 0x82, b'd', b'e', 0]);
        assert_eq!(labels.length(), 8);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_label_past_first_64k_rejected() {
        let mut labels = LabelRecord::new();
        let title = "t".repeat(1000);
        while labels.length() <= u16::MAX as usize {
            labels.push(&title).unwrap();
        }
        assert!(matches!(labels.push("late"), Err(Error::Invariant(_))));
    }

    #[test]
    fn test_navigation_titles_overflow_label_record() {
        let chapters: Vec<ChapterPosition> = (0..1000)
            .map(|i| ChapterPosition {
                title: format!("{i:04}{}", "x".repeat(76)),
                start: i * 100,
                length: 100,
            })
            .collect();
        let err = navigation_index(&chapters).unwrap_err();
        assert!(matches!(err, Error::Invariant(ref m) if m.contains("label offset")));

        // The same titles fit when there are few enough of them
        let records = navigation_index(&chapters[..700]).unwrap();
        assert!(records.labels.unwrap().length() < u16::MAX as usize);
    }

    #[test]
    fn test_empty_index() {
        let records = navigation_index(&[]).unwrap();
        let out = serialize(&records.entries);
        assert_eq!(out.len(), records.entries.length());
        assert_eq!(IndxHeader::parse(&out).unwrap().entry_count, 0);
    }
}
