//! Fixed-layout records and headers.
//!
//! Everything here is big-endian and field-for-field identical to what
//! KF8 readers expect. Offsets in comments are relative to the start of
//! record 0 (the PalmDOC header occupies the first 16 bytes).

use std::io::{self, Write};

use crate::error::{Error, Result};

pub const NULL_INDEX: u32 = 0xFFFF_FFFF;

pub const PALMDOC_HEADER_LEN: usize = 16;
/// MOBI header length for the KF8 variant, including the four KF8 index
/// fields and trailing reserved bytes.
pub const KF8_HEADER_LEN: usize = 264;
/// Maximum uncompressed body bytes per text record.
pub const TEXT_RECORD_SIZE: usize = 4096;

/// Codepage 65001.
const UTF8_ENCODING: u32 = 65001;
/// EXTH present, plus the bit kindlegen always sets.
const EXTH_FLAGS: u32 = 0x50;
/// Multibyte placeholder byte (bit 0) and trailing navigation entry (bit 1).
pub const EXTRA_DATA_FLAGS: u32 = 0b11;

pub const EOF_RECORD: [u8; 4] = [0xE9, 0x8E, 0x0D, 0x0A];

/// The 16-byte PalmDOC header at the start of record 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PalmDocHeader {
    pub text_length: u32,
    pub text_record_count: u16,
}

impl PalmDocHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PALMDOC_HEADER_LEN);
        out.extend_from_slice(&1u16.to_be_bytes()); // Compression: none
        out.extend_from_slice(&[0, 0]); // Unused
        out.extend_from_slice(&self.text_length.to_be_bytes());
        out.extend_from_slice(&self.text_record_count.to_be_bytes());
        out.extend_from_slice(&(TEXT_RECORD_SIZE as u16).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // Encryption: none
        out.extend_from_slice(&0u16.to_be_bytes()); // Unknown
        out
    }

    pub fn parse(record0: &[u8]) -> Result<Self> {
        if record0.len() < PALMDOC_HEADER_LEN {
            return Err(Error::InvalidContainer("PalmDOC header too short".into()));
        }
        Ok(Self {
            text_length: u32::from_be_bytes([record0[4], record0[5], record0[6], record0[7]]),
            text_record_count: u16::from_be_bytes([record0[8], record0[9]]),
        })
    }
}

/// The KF8 MOBI header.
///
/// Only the fields the assembler fills in are exposed; everything else is
/// a constant written by [`MobiHeader::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobiHeader {
    pub unique_id: u32,
    pub first_non_book_index: u32,
    pub full_name_offset: u32,
    pub full_name_length: u32,
    pub locale: u32,
    pub first_image_index: u32,
    pub fdst_index: u32,
    pub fdst_count: u32,
    pub fcis_index: u32,
    pub fcis_count: u32,
    pub flis_index: u32,
    pub flis_count: u32,
    pub extra_data_flags: u32,
    pub ncx_index: u32,
    pub chunk_index: u32,
    pub skeleton_index: u32,
    pub guide_index: u32,
}

impl Default for MobiHeader {
    fn default() -> Self {
        Self {
            unique_id: 0,
            first_non_book_index: 0,
            full_name_offset: 0,
            full_name_length: 0,
            locale: 0,
            first_image_index: NULL_INDEX,
            fdst_index: NULL_INDEX,
            fdst_count: 0,
            fcis_index: 0,
            fcis_count: 0,
            flis_index: 0,
            flis_count: 0,
            extra_data_flags: EXTRA_DATA_FLAGS,
            ncx_index: NULL_INDEX,
            chunk_index: NULL_INDEX,
            skeleton_index: NULL_INDEX,
            guide_index: NULL_INDEX,
        }
    }
}

impl MobiHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(KF8_HEADER_LEN);

        // Identity (16-40)
        out.extend_from_slice(b"MOBI");
        out.extend_from_slice(&(KF8_HEADER_LEN as u32).to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes()); // Book type
        out.extend_from_slice(&UTF8_ENCODING.to_be_bytes());
        out.extend_from_slice(&self.unique_id.to_be_bytes());
        out.extend_from_slice(&8u32.to_be_bytes()); // File version

        // Orthographic, inflection, names, keys, extra 0-5 (40-80)
        for _ in 0..10 {
            out.extend_from_slice(&NULL_INDEX.to_be_bytes());
        }

        out.extend_from_slice(&self.first_non_book_index.to_be_bytes()); // 80
        out.extend_from_slice(&self.full_name_offset.to_be_bytes()); // 84
        out.extend_from_slice(&self.full_name_length.to_be_bytes()); // 88
        out.extend_from_slice(&self.locale.to_be_bytes()); // 92
        out.extend_from_slice(&0u32.to_be_bytes()); // Input language
        out.extend_from_slice(&0u32.to_be_bytes()); // Output language
        out.extend_from_slice(&8u32.to_be_bytes()); // Min version (104)
        out.extend_from_slice(&self.first_image_index.to_be_bytes()); // 108

        // Huffman records (112-128)
        for _ in 0..4 {
            out.extend_from_slice(&0u32.to_be_bytes());
        }

        out.extend_from_slice(&EXTH_FLAGS.to_be_bytes()); // 128
        out.extend_from_slice(&[0u8; 32]); // 132-164
        out.extend_from_slice(&NULL_INDEX.to_be_bytes()); // Unknown index (164)

        // DRM (168-184)
        out.extend_from_slice(&NULL_INDEX.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());

        out.extend_from_slice(&[0u8; 8]); // 184-192

        out.extend_from_slice(&self.fdst_index.to_be_bytes()); // 192
        out.extend_from_slice(&self.fdst_count.to_be_bytes()); // 196
        out.extend_from_slice(&self.fcis_index.to_be_bytes()); // 200
        out.extend_from_slice(&self.fcis_count.to_be_bytes());
        out.extend_from_slice(&self.flis_index.to_be_bytes()); // 208
        out.extend_from_slice(&self.flis_count.to_be_bytes());

        out.extend_from_slice(&[0u8; 8]); // 216-224
        out.extend_from_slice(&NULL_INDEX.to_be_bytes()); // 224
        out.extend_from_slice(&0u32.to_be_bytes()); // First compilation section count
        out.extend_from_slice(&NULL_INDEX.to_be_bytes()); // Compilation section count
        out.extend_from_slice(&NULL_INDEX.to_be_bytes()); // 236

        out.extend_from_slice(&self.extra_data_flags.to_be_bytes()); // 240
        out.extend_from_slice(&self.ncx_index.to_be_bytes()); // 244

        // KF8 indices (248-264)
        out.extend_from_slice(&self.chunk_index.to_be_bytes());
        out.extend_from_slice(&self.skeleton_index.to_be_bytes());
        out.extend_from_slice(&NULL_INDEX.to_be_bytes()); // DATP
        out.extend_from_slice(&self.guide_index.to_be_bytes());

        out.extend_from_slice(&[0u8; 16]); // 264-280
        out
    }

    /// Read the header fields back out of a complete record 0.
    pub fn parse(record0: &[u8]) -> Result<Self> {
        let end = PALMDOC_HEADER_LEN + KF8_HEADER_LEN;
        if record0.len() < end || &record0[16..20] != b"MOBI" {
            return Err(Error::InvalidContainer("missing KF8 MOBI header".into()));
        }

        let u32_at = |offset: usize| -> u32 {
            u32::from_be_bytes([
                record0[offset],
                record0[offset + 1],
                record0[offset + 2],
                record0[offset + 3],
            ])
        };

        Ok(Self {
            unique_id: u32_at(32),
            first_non_book_index: u32_at(80),
            full_name_offset: u32_at(84),
            full_name_length: u32_at(88),
            locale: u32_at(92),
            first_image_index: u32_at(108),
            fdst_index: u32_at(192),
            fdst_count: u32_at(196),
            fcis_index: u32_at(200),
            fcis_count: u32_at(204),
            flis_index: u32_at(208),
            flis_count: u32_at(212),
            extra_data_flags: u32_at(240),
            ncx_index: u32_at(244),
            chunk_index: u32_at(248),
            skeleton_index: u32_at(252),
            guide_index: u32_at(260),
        })
    }
}

/// Flow table (FDST): the byte range of each flow in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTable {
    ranges: Vec<(u32, u32)>,
}

impl FlowTable {
    /// Build from flow lengths laid out back to back.
    pub fn new(lengths: impl IntoIterator<Item = usize>) -> Self {
        let mut offset = 0u32;
        let ranges = lengths
            .into_iter()
            .map(|len| {
                let start = offset;
                offset += len as u32;
                (start, offset)
            })
            .collect();
        Self { ranges }
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn length(&self) -> usize {
        12 + 8 * self.ranges.len()
    }

    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(b"FDST")?;
        w.write_all(&12u32.to_be_bytes())?;
        w.write_all(&(self.ranges.len() as u32).to_be_bytes())?;
        for (start, end) in &self.ranges {
            w.write_all(&start.to_be_bytes())?;
            w.write_all(&end.to_be_bytes())?;
        }
        Ok(())
    }
}

/// FLIS record. Entirely constant.
pub const FLIS_RECORD: [u8; 36] = *b"FLIS\0\0\0\x08\0\x41\0\0\0\0\0\0\xff\xff\xff\xff\0\x01\0\x03\0\0\0\x03\0\0\0\x01\xff\xff\xff\xff";

/// FCIS record. Only the text length varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fcis {
    pub text_length: u32,
}

impl Fcis {
    pub const LEN: usize = 52;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(b"FCIS");
        for v in [20u32, 16, 2, 0, self.text_length, 0, 40, 0, 40, 8] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out
    }
}
