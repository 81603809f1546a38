//! Tag tables (TAGX) and control bytes.
//!
//! A tag table declares the fields of every entry in an index. Each entry
//! starts with a control byte whose masked bits say how many value groups
//! of each field follow.

use crate::error::{Error, Result};

/// Header: `TAGX`, block length, control byte count.
pub const TAGX_HEADER_LEN: usize = 12;

/// One 4-byte row of a tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub number: u8,
    pub values_per_unit: u8,
    pub mask: u8,
    pub terminator: bool,
}

impl Tag {
    pub fn to_bytes(self) -> [u8; 4] {
        [self.number, self.values_per_unit, self.mask, self.terminator as u8]
    }

    pub fn from_bytes(b: [u8; 4]) -> Self {
        Self {
            number: b[0],
            values_per_unit: b[1],
            mask: b[2],
            terminator: b[3] == 1,
        }
    }
}

/// Every field used by the indexes this crate writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    NcxPosition,
    NcxLength,
    NcxLabelOffset,
    NcxDepth,
    SkeletonChunkCount,
    SkeletonGeometry,
    ChunkLabelOffset,
    ChunkFileNumber,
    ChunkSequenceNumber,
    ChunkGeometry,
    End,
}

impl TagKind {
    pub const fn tag(self) -> Tag {
        let (number, values_per_unit, mask, terminator) = match self {
            TagKind::NcxPosition => (1, 1, 0x01, false),
            TagKind::NcxLength => (2, 1, 0x02, false),
            TagKind::NcxLabelOffset => (3, 1, 0x04, false),
            TagKind::NcxDepth => (4, 1, 0x08, false),
            TagKind::SkeletonChunkCount => (1, 1, 0x03, false),
            TagKind::SkeletonGeometry => (6, 2, 0x0C, false),
            TagKind::ChunkLabelOffset => (2, 1, 0x01, false),
            TagKind::ChunkFileNumber => (3, 1, 0x02, false),
            TagKind::ChunkSequenceNumber => (4, 1, 0x04, false),
            TagKind::ChunkGeometry => (6, 2, 0x08, false),
            TagKind::End => (0, 0, 0, true),
        };
        Tag {
            number,
            values_per_unit,
            mask,
            terminator,
        }
    }

    /// Raw values each entry carries for this field.
    pub const fn values_per_group(self) -> u8 {
        match self {
            TagKind::SkeletonGeometry => 4,
            TagKind::SkeletonChunkCount | TagKind::ChunkGeometry => 2,
            _ => 1,
        }
    }
}

/// Bit shift that aligns a value count with its mask.
fn mask_shift(mask: u8) -> Option<u8> {
    match mask {
        1 => Some(0),
        2 => Some(1),
        3 => Some(0),
        4 => Some(2),
        8 => Some(3),
        12 => Some(2),
        16 => Some(4),
        32 => Some(5),
        48 => Some(4),
        64 => Some(6),
        128 => Some(7),
        192 => Some(6),
        _ => None,
    }
}

/// An ordered tag table ending in a terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTable(&'static [TagKind]);

pub const NCX_TABLE: TagTable = TagTable(&[
    TagKind::NcxPosition,
    TagKind::NcxLength,
    TagKind::NcxLabelOffset,
    TagKind::NcxDepth,
    TagKind::End,
]);

pub const SKELETON_TABLE: TagTable = TagTable(&[
    TagKind::SkeletonChunkCount,
    TagKind::SkeletonGeometry,
    TagKind::End,
]);

pub const CHUNK_TABLE: TagTable = TagTable(&[
    TagKind::ChunkLabelOffset,
    TagKind::ChunkFileNumber,
    TagKind::ChunkSequenceNumber,
    TagKind::ChunkGeometry,
    TagKind::End,
]);

impl TagTable {
    pub const fn new(kinds: &'static [TagKind]) -> Self {
        Self(kinds)
    }

    /// Compute the control byte shared by every entry of this table.
    pub fn control_byte(&self) -> Result<u8> {
        let mut ans: u8 = 0;
        for kind in self.0 {
            let tag = kind.tag();
            if tag.terminator {
                return Ok(ans);
            }

            let shift = mask_shift(tag.mask).ok_or_else(|| {
                Error::invariant(format!(
                    "tag {} has unsupported mask {:#04x}",
                    tag.number, tag.mask
                ))
            })?;
            if tag.values_per_unit == 0 {
                return Err(Error::invariant(format!(
                    "tag {} declares zero values per unit",
                    tag.number
                )));
            }
            let units = kind.values_per_group() / tag.values_per_unit;
            ans |= tag.mask & (units << shift);
        }

        Err(Error::invariant("tag table has no terminator"))
    }

    /// Size of the serialized TAGX block.
    pub fn block_length(&self) -> usize {
        TAGX_HEADER_LEN + 4 * self.0.len()
    }

    /// Serialize as a TAGX block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut tagx = Vec::with_capacity(self.block_length());
        tagx.extend_from_slice(b"TAGX");
        tagx.extend_from_slice(&(self.block_length() as u32).to_be_bytes());
        tagx.extend_from_slice(&1u32.to_be_bytes()); // Control byte count
        for kind in self.0 {
            tagx.extend_from_slice(&kind.tag().to_bytes());
        }
        tagx
    }
}

/// Parse a TAGX block, returning the control byte count and its tags.
pub fn parse_tagx(data: &[u8]) -> Result<(u32, Vec<Tag>)> {
    if data.len() < TAGX_HEADER_LEN || &data[0..4] != b"TAGX" {
        return Err(Error::InvalidContainer("invalid TAGX section".into()));
    }

    let block_length = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let control_byte_count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

    let mut tags = Vec::new();
    let mut i = TAGX_HEADER_LEN;
    while i + 4 <= block_length && i + 4 <= data.len() {
        tags.push(Tag::from_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]));
        i += 4;
    }

    Ok((control_byte_count, tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_control_bytes() {
        assert_eq!(SKELETON_TABLE.control_byte().unwrap(), 0x0A);
        assert_eq!(CHUNK_TABLE.control_byte().unwrap(), 0x0F);
        assert_eq!(NCX_TABLE.control_byte().unwrap(), 0x0F);
    }

    #[test]
    fn test_tag_rows() {
        assert_eq!(TagKind::SkeletonGeometry.tag().to_bytes(), [0x06, 0x02, 0x0C, 0x00]);
        assert_eq!(TagKind::ChunkGeometry.tag().to_bytes(), [0x06, 0x02, 0x08, 0x00]);
        assert_eq!(TagKind::End.tag().to_bytes(), [0, 0, 0, 1]);
    }

    #[test]
    fn test_missing_terminator() {
        let table = TagTable::new(&[TagKind::NcxPosition]);
        assert!(matches!(table.control_byte(), Err(Error::Invariant(_))));
    }

    #[test]
    fn test_unknown_mask_rejected() {
        assert_eq!(mask_shift(0x05), None);
        assert_eq!(mask_shift(0xC0), Some(6));
    }

    #[test]
    fn test_tagx_block() {
        let bytes = SKELETON_TABLE.to_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..4], b"TAGX");
        assert_eq!(&bytes[4..8], &24u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &[0x01, 0x01, 0x03, 0x00]);

        let (count, tags) = parse_tagx(&bytes).unwrap();
        assert_eq!(count, 1);
        assert_eq!(tags.len(), 3);
        assert!(tags[2].terminator);
        assert_eq!(tags[1], TagKind::SkeletonGeometry.tag());
    }
}
