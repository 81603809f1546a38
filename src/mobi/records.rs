//! Every kind of record a KF8 book is made of.

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::pdb::Encode;

use super::exth::ExthSection;
use super::headers::{
    EOF_RECORD, FLIS_RECORD, Fcis, FlowTable, KF8_HEADER_LEN, MobiHeader, PALMDOC_HEADER_LEN,
    PalmDocHeader, TEXT_RECORD_SIZE,
};
use super::index::{IndexRecord, LabelRecord};
use super::jfif;

/// Zero bytes after the full name, leaving room for in-place edits.
pub const RECORD0_PADDING: usize = 8192;

/// Record 0: PalmDOC and MOBI headers, EXTH, and the full title.
#[derive(Debug, Clone, Default)]
pub struct HeaderRecord {
    pub palmdoc: PalmDocHeader,
    pub mobi: MobiHeader,
    pub exth: ExthSection,
    pub full_name: String,
}

impl HeaderRecord {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    fn full_name_offset(&self) -> usize {
        PALMDOC_HEADER_LEN + KF8_HEADER_LEN + self.exth.length()
    }

    pub fn length(&self) -> usize {
        self.full_name_offset() + self.full_name.len() + RECORD0_PADDING
    }

    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        // The full name sits after the EXTH section, so its offset is only
        // known once every EXTH entry is in.
        let mobi = MobiHeader {
            full_name_offset: self.full_name_offset() as u32,
            full_name_length: self.full_name.len() as u32,
            ..self.mobi.clone()
        };

        w.write_all(&self.palmdoc.to_bytes())?;
        w.write_all(&mobi.to_bytes())?;
        self.exth.write_to(w)?;
        w.write_all(self.full_name.as_bytes())?;
        w.write_all(&[0u8; RECORD0_PADDING])
    }

    /// Parse a record 0 written by [`HeaderRecord::write_to`].
    pub fn parse(record0: &[u8]) -> Result<Self> {
        let palmdoc = PalmDocHeader::parse(record0)?;
        let mobi = MobiHeader::parse(record0)?;
        let exth = ExthSection::parse(&record0[PALMDOC_HEADER_LEN + KF8_HEADER_LEN..])?;

        let start = mobi.full_name_offset as usize;
        let end = start + mobi.full_name_length as usize;
        let full_name = record0
            .get(start..end)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| Error::InvalidContainer("full name out of bounds".into()))?;

        Ok(Self {
            palmdoc,
            mobi,
            exth,
            full_name,
        })
    }
}

/// Up to 4096 bytes of text followed by its trailing entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    data: Vec<u8>,
    trailing: Vec<u8>,
}

impl TextRecord {
    pub fn new(data: Vec<u8>, trailing: Vec<u8>) -> Result<Self> {
        if data.len() > TEXT_RECORD_SIZE {
            return Err(Error::invariant(format!(
                "text record of {} bytes exceeds {TEXT_RECORD_SIZE}",
                data.len()
            )));
        }
        Ok(Self { data, trailing })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }
}

/// An image resource, with its JFIF header normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    data: Vec<u8>,
}

impl ImageRecord {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: jfif::normalize(data),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A record of a KF8 book.
#[derive(Debug, Clone)]
pub enum Record {
    Raw(Vec<u8>),
    Header(Box<HeaderRecord>),
    Text(TextRecord),
    Index(IndexRecord),
    Labels(LabelRecord),
    Image(ImageRecord),
    FlowTable(FlowTable),
    Flis,
    Fcis(Fcis),
    EndOfFile,
}

impl Record {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Raw(_) => "raw",
            Record::Header(_) => "header",
            Record::Text(_) => "text",
            Record::Index(_) => "index",
            Record::Labels(_) => "labels",
            Record::Image(_) => "image",
            Record::FlowTable(_) => "fdst",
            Record::Flis => "flis",
            Record::Fcis(_) => "fcis",
            Record::EndOfFile => "eof",
        }
    }
}

impl Encode for Record {
    fn length(&self) -> usize {
        match self {
            Record::Raw(data) => data.len(),
            Record::Header(header) => header.length(),
            Record::Text(text) => text.data.len() + text.trailing.len(),
            Record::Index(index) => index.length(),
            Record::Labels(labels) => labels.length(),
            Record::Image(image) => image.data.len(),
            Record::FlowTable(table) => table.length(),
            Record::Flis => FLIS_RECORD.len(),
            Record::Fcis(_) => Fcis::LEN,
            Record::EndOfFile => EOF_RECORD.len(),
        }
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            Record::Raw(data) => w.write_all(data),
            Record::Header(header) => header.write_to(w),
            Record::Text(text) => {
                w.write_all(&text.data)?;
                w.write_all(&text.trailing)
            }
            Record::Index(index) => index.write_to(w),
            Record::Labels(labels) => labels.write_to(w),
            Record::Image(image) => w.write_all(&image.data),
            Record::FlowTable(table) => table.write_to(w),
            Record::Flis => w.write_all(&FLIS_RECORD),
            Record::Fcis(fcis) => w.write_all(&fcis.to_bytes()),
            Record::EndOfFile => w.write_all(&EOF_RECORD),
        }
    }
}
