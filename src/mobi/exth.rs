//! EXTH metadata section.

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::util::pad_to;

/// Header: `EXTH`, length, entry count.
const EXTH_HEADER_LEN: usize = 12;
/// Per entry: type and length.
const ENTRY_HEADER_LEN: usize = 8;

/// What happens when an entry of an already present type is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPolicy {
    /// Keep every value; the field is multi-valued.
    Append,
    /// Overwrite the first entry of the same type in place.
    Replace,
}

/// Known EXTH record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExthType {
    Title,
    Author,
    Publisher,
    Description,
    Subject,
    PublishingDate,
    Contributor,
    Source,
    Asin,
    FixedLayout,
    ResourceCount,
    CoverUri,
    CoverOffset,
    ThumbOffset,
    HasFakeCover,
    CreatorSoftware,
    CreatorMajor,
    CreatorMinor,
    CreatorBuild,
    DocType,
    UpdatedTitle,
    Language,
    PrimaryWritingMode,
    PageProgressionDirection,
    Other(u32),
}

impl ExthType {
    pub fn code(self) -> u32 {
        match self {
            ExthType::Title => 99,
            ExthType::Author => 100,
            ExthType::Publisher => 101,
            ExthType::Description => 103,
            ExthType::Subject => 105,
            ExthType::PublishingDate => 106,
            ExthType::Contributor => 108,
            ExthType::Source => 112,
            ExthType::Asin => 113,
            ExthType::FixedLayout => 122,
            ExthType::ResourceCount => 125,
            ExthType::CoverUri => 129,
            ExthType::CoverOffset => 201,
            ExthType::ThumbOffset => 202,
            ExthType::HasFakeCover => 203,
            ExthType::CreatorSoftware => 204,
            ExthType::CreatorMajor => 205,
            ExthType::CreatorMinor => 206,
            ExthType::CreatorBuild => 207,
            ExthType::DocType => 501,
            ExthType::UpdatedTitle => 503,
            ExthType::Language => 524,
            ExthType::PrimaryWritingMode => 525,
            ExthType::PageProgressionDirection => 527,
            ExthType::Other(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            99 => ExthType::Title,
            100 => ExthType::Author,
            101 => ExthType::Publisher,
            103 => ExthType::Description,
            105 => ExthType::Subject,
            106 => ExthType::PublishingDate,
            108 => ExthType::Contributor,
            112 => ExthType::Source,
            113 => ExthType::Asin,
            122 => ExthType::FixedLayout,
            125 => ExthType::ResourceCount,
            129 => ExthType::CoverUri,
            201 => ExthType::CoverOffset,
            202 => ExthType::ThumbOffset,
            203 => ExthType::HasFakeCover,
            204 => ExthType::CreatorSoftware,
            205 => ExthType::CreatorMajor,
            206 => ExthType::CreatorMinor,
            207 => ExthType::CreatorBuild,
            501 => ExthType::DocType,
            503 => ExthType::UpdatedTitle,
            524 => ExthType::Language,
            525 => ExthType::PrimaryWritingMode,
            527 => ExthType::PageProgressionDirection,
            other => ExthType::Other(other),
        }
    }

    /// Default insertion policy. People and subjects repeat; every other
    /// field describes the book once.
    pub fn policy(self) -> EntryPolicy {
        match self {
            ExthType::Author | ExthType::Contributor | ExthType::Subject => EntryPolicy::Append,
            ExthType::Other(_) => EntryPolicy::Append,
            _ => EntryPolicy::Replace,
        }
    }
}

/// A single EXTH entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExthEntry {
    pub kind: ExthType,
    pub data: Vec<u8>,
}

/// An ordered EXTH section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExthSection {
    entries: Vec<ExthEntry>,
}

impl ExthSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ExthEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a string entry using the type's default policy. Empty strings
    /// are skipped.
    pub fn add_string(&mut self, kind: ExthType, value: &str) {
        self.add_string_with(kind, value, kind.policy());
    }

    pub fn add_string_with(&mut self, kind: ExthType, value: &str, policy: EntryPolicy) {
        if value.is_empty() {
            return;
        }
        self.add_raw(kind, value.as_bytes().to_vec(), policy);
    }

    /// Add a 4-byte big-endian integer entry using the type's default policy.
    pub fn add_int(&mut self, kind: ExthType, value: u32) {
        self.add_int_with(kind, value, kind.policy());
    }

    pub fn add_int_with(&mut self, kind: ExthType, value: u32, policy: EntryPolicy) {
        self.add_raw(kind, value.to_be_bytes().to_vec(), policy);
    }

    fn add_raw(&mut self, kind: ExthType, data: Vec<u8>, policy: EntryPolicy) {
        if policy == EntryPolicy::Replace
            && let Some(existing) = self.entries.iter_mut().find(|e| e.kind == kind)
        {
            existing.data = data;
            return;
        }
        self.entries.push(ExthEntry { kind, data });
    }

    /// First entry of `kind` decoded as UTF-8.
    pub fn get_string(&self, kind: ExthType) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| String::from_utf8_lossy(&e.data).into_owned())
    }

    /// Every entry of `kind` decoded as UTF-8, in order.
    pub fn get_strings(&self, kind: ExthType) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| String::from_utf8_lossy(&e.data).into_owned())
            .collect()
    }

    pub fn get_int(&self, kind: ExthType) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .and_then(|e| e.data.get(..4))
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Length declared in the sub-header: everything except the trailing
    /// alignment padding.
    pub fn unpadded_length(&self) -> usize {
        EXTH_HEADER_LEN
            + self
                .entries
                .iter()
                .map(|e| ENTRY_HEADER_LEN + e.data.len())
                .sum::<usize>()
    }

    /// Serialized length, padding included.
    pub fn length(&self) -> usize {
        let len = self.unpadded_length();
        len + pad_to(len, 4)
    }

    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        let len = self.unpadded_length();
        w.write_all(b"EXTH")?;
        w.write_all(&(len as u32).to_be_bytes())?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for entry in &self.entries {
            w.write_all(&entry.kind.code().to_be_bytes())?;
            w.write_all(&((ENTRY_HEADER_LEN + entry.data.len()) as u32).to_be_bytes())?;
            w.write_all(&entry.data)?;
        }
        w.write_all(&[0u8; 3][..pad_to(len, 4)])
    }

    /// Parse an EXTH section starting at the front of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < EXTH_HEADER_LEN {
            return Err(Error::InvalidContainer("EXTH header too short".into()));
        }
        if &data[0..4] != b"EXTH" {
            return Err(Error::InvalidContainer("invalid EXTH signature".into()));
        }

        let record_count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let mut section = ExthSection::new();
        let mut pos = EXTH_HEADER_LEN;

        for _ in 0..record_count {
            if pos + ENTRY_HEADER_LEN > data.len() {
                break;
            }

            let code = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            let record_len =
                u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                    as usize;

            if record_len < ENTRY_HEADER_LEN || pos + record_len > data.len() {
                break;
            }

            section.entries.push(ExthEntry {
                kind: ExthType::from_code(code),
                data: data[pos + ENTRY_HEADER_LEN..pos + record_len].to_vec(),
            });
            pos += record_len;
        }

        Ok(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(exth: &ExthSection) -> Vec<u8> {
        let mut out = Vec::new();
        exth.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_empty_section() {
        let exth = ExthSection::new();
        assert_eq!(exth.unpadded_length(), 12);
        assert_eq!(exth.length(), 12);
        assert_eq!(serialize(&exth), b"EXTH\0\0\0\x0c\0\0\0\0");
    }

    #[test]
    fn test_nine_byte_entry() {
        let mut exth = ExthSection::new();
        exth.add_string(ExthType::Publisher, "Publisher");
        assert_eq!(exth.unpadded_length(), 12 + 8 + 9);
        assert_eq!(exth.length(), 32);

        let out = serialize(&exth);
        assert_eq!(out.len(), 32);
        assert_eq!(&out[4..8], &29u32.to_be_bytes());
        assert_eq!(&out[8..12], &1u32.to_be_bytes());
        assert_eq!(&out[12..16], &101u32.to_be_bytes());
        assert_eq!(&out[16..20], &17u32.to_be_bytes());
        assert_eq!(&out[20..29], b"Publisher");
        assert_eq!(&out[29..], &[0, 0, 0]);
    }

    #[test]
    fn test_authors_accumulate() {
        let mut exth = ExthSection::new();
        exth.add_string(ExthType::Author, "Alice");
        exth.add_string(ExthType::Author, "Bob");
        assert_eq!(exth.get_strings(ExthType::Author), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_title_replaces() {
        let mut exth = ExthSection::new();
        exth.add_string(ExthType::UpdatedTitle, "Draft");
        exth.add_string(ExthType::Language, "en");
        exth.add_string(ExthType::UpdatedTitle, "Final");
        assert_eq!(exth.entries().len(), 2);
        // Replacement keeps the original position
        assert_eq!(exth.entries()[0].kind, ExthType::UpdatedTitle);
        assert_eq!(exth.get_string(ExthType::UpdatedTitle).as_deref(), Some("Final"));
    }

    #[test]
    fn test_explicit_policy_override() {
        let mut exth = ExthSection::new();
        exth.add_string_with(ExthType::Author, "Alice", EntryPolicy::Replace);
        exth.add_string_with(ExthType::Author, "Bob", EntryPolicy::Replace);
        assert_eq!(exth.get_strings(ExthType::Author), vec!["Bob"]);
    }

    #[test]
    fn test_empty_strings_skipped() {
        let mut exth = ExthSection::new();
        exth.add_string(ExthType::Publisher, "");
        assert!(exth.is_empty());
    }

    #[test]
    fn test_int_entry() {
        let mut exth = ExthSection::new();
        exth.add_int(ExthType::CoverOffset, 3);
        assert_eq!(exth.get_int(ExthType::CoverOffset), Some(3));
        assert_eq!(exth.length(), 12 + 8 + 4);
    }

    #[test]
    fn test_parse_roundtrip() {
        let mut exth = ExthSection::new();
        exth.add_string(ExthType::Author, "Test Author");
        exth.add_string(ExthType::UpdatedTitle, "Test Title");
        exth.add_int(ExthType::CoverOffset, 42);
        exth.add_int(ExthType::Other(300), 7);

        let parsed = ExthSection::parse(&serialize(&exth)).unwrap();
        assert_eq!(parsed, exth);
    }

    #[test]
    fn test_parse_invalid_signature() {
        assert!(ExthSection::parse(b"NOTEXTH_____").is_err());
        assert!(ExthSection::parse(b"EXTH").is_err());
    }
}
