//! JFIF header normalization for image records.
//!
//! Kindle readers expect JPEG resources to open with a JFIF 1.02 APP0
//! segment. Pixel data is left untouched.

/// SOI followed by a fixed JFIF 1.02 APP0 segment.
const JFIF_HEADER: [u8; 20] = [
    0xFF, 0xD8, // SOI
    0xFF, 0xE0, // APP0
    0x00, 0x10, // Segment length
    b'J', b'F', b'I', b'F', 0x00, // Identifier
    0x01, 0x02, // Version 1.02
    0x00, // Density units
    0x00, 0x01, // X density
    0x00, 0x01, // Y density
    0x00, 0x00, // No thumbnail
];

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: [u8; 2] = [0xFF, 0xE0];

/// Whether `data` starts with a JPEG start-of-image marker.
pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&SOI)
}

/// Rewrite the header of a JPEG so it carries the fixed JFIF segment.
///
/// An existing APP0 segment directly after SOI is replaced; otherwise the
/// segment is inserted. Non-JPEG data is returned unchanged, as is a JPEG
/// whose APP0 length runs past the end of the data.
pub fn normalize(data: &[u8]) -> Vec<u8> {
    if !is_jpeg(data) {
        return data.to_vec();
    }

    let rest = if data[2..].starts_with(&APP0) && data.len() >= 6 {
        let segment_len = u16::from_be_bytes([data[4], data[5]]) as usize;
        match data.get(4 + segment_len..) {
            Some(rest) => rest,
            None => return data.to_vec(),
        }
    } else {
        &data[2..]
    };

    let mut out = Vec::with_capacity(JFIF_HEADER.len() + rest.len());
    out.extend_from_slice(&JFIF_HEADER);
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_app0() {
        // SOI, APP0 with a 4-byte segment, then a DQT marker
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0xAA, 0xBB, 0xFF, 0xDB];
        let out = normalize(&data);
        assert_eq!(&out[..20], &JFIF_HEADER);
        assert_eq!(&out[20..], &[0xFF, 0xDB]);
    }

    #[test]
    fn test_inserts_app0() {
        // SOI directly followed by an EXIF APP1 segment
        let data = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x02];
        let out = normalize(&data);
        assert_eq!(&out[..20], &JFIF_HEADER);
        assert_eq!(&out[20..], &[0xFF, 0xE1, 0x00, 0x02]);
    }

    #[test]
    fn test_other_formats_unchanged() {
        let png = b"\x89PNG\r\n\x1a\n".to_vec();
        assert_eq!(normalize(&png), png);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_truncated_app0_unchanged() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x40, 0x01];
        assert_eq!(normalize(&data), data.to_vec());
    }
}
