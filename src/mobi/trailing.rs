//! Trailing bytes appended to each text record.
//!
//! Readers strip these from the end of a record to find which chapter
//! the record belongs to. The layout is a multibyte indicator, then an
//! optional strand describing the chapter, then the length of everything
//! before it as a variable-width integer.

use crate::error::{Error, Result};

use super::index::ChapterPosition;
use super::vwi::encint;

const SPAN_FLAG: u32 = 0b001;
const TYPE_FLAG: u32 = 0b010;
const SIBLINGS_FLAG: u32 = 0b100;
/// Strand type written when the type flag is set.
const STRAND_TYPE: u32 = 8;

/// The chapter a text record falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strand {
    /// Position of the chapter in the navigation index.
    pub chapter: usize,
    /// The chapter starts before and ends after the record.
    pub spans: bool,
    /// Chapters touching the record, including `chapter`. Zero or one
    /// means no siblings.
    pub siblings: usize,
}

/// Find the strand for the record covering `[from, to)`.
pub fn find_strand(chapters: &[ChapterPosition], from: usize, to: usize) -> Option<Strand> {
    let mut strand: Option<Strand> = None;

    for (i, chapter) in chapters.iter().enumerate() {
        let (start, end) = (chapter.start, chapter.end());

        if start <= from && end >= to {
            return Some(Strand {
                chapter: i,
                spans: start < from && end > to,
                siblings: 0,
            });
        }

        if start < to && end > from {
            match strand.as_mut() {
                Some(s) => s.siblings += 1,
                None => {
                    strand = Some(Strand {
                        chapter: i,
                        spans: false,
                        siblings: 1,
                    })
                }
            }
        }
    }

    strand
}

/// Encode trailing bytes for one text record.
pub fn encode(strand: Option<Strand>) -> Result<Vec<u8>> {
    // Multibyte indicator; text is written as single bytes
    let mut data = vec![0u8];

    if let Some(strand) = strand {
        let has_siblings = strand.siblings > 1;
        let mut flags = TYPE_FLAG;
        if strand.spans {
            flags |= SPAN_FLAG;
        }
        if has_siblings {
            flags |= SIBLINGS_FLAG;
        }

        data.extend(encint(((strand.chapter as u32) << 3) | flags));
        data.extend(encint(STRAND_TYPE));
        if has_siblings {
            let siblings = u8::try_from(strand.siblings).map_err(|_| {
                Error::invariant(format!("{} sibling chapters do not fit", strand.siblings))
            })?;
            data.push(siblings);
        }
        if strand.spans {
            data.extend(encint(0));
        }
    }

    let length = data.len() as u32;
    data.extend(encint(length));
    Ok(data)
}

/// Trailing bytes for the record covering `[from, to)`.
pub fn trailing_entries(chapters: &[ChapterPosition], from: usize, to: usize) -> Result<Vec<u8>> {
    encode(find_strand(chapters, from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobi::vwi::decint_backward;

    fn chapters(bounds: &[(usize, usize)]) -> Vec<ChapterPosition> {
        bounds
            .iter()
            .enumerate()
            .map(|(i, &(start, end))| ChapterPosition {
                title: format!("Chapter {}", i + 1),
                start,
                length: end - start,
            })
            .collect()
    }

    #[test]
    fn test_no_strand() {
        assert_eq!(encode(None).unwrap(), vec![0x00, 0x81]);
        assert_eq!(trailing_entries(&[], 0, 4096).unwrap(), vec![0x00, 0x81]);
    }

    #[test]
    fn test_chapter_spans_record() {
        let chapters = chapters(&[(0, 100), (100, 10000)]);
        let strand = find_strand(&chapters, 4096, 8192).unwrap();
        assert_eq!(
            strand,
            Strand {
                chapter: 1,
                spans: true,
                siblings: 0
            }
        );
        // (1 << 3) | span | type, type 8, trailing 0, then length 4
        assert_eq!(encode(Some(strand)).unwrap(), vec![0x00, 0x8B, 0x88, 0x80, 0x84]);
    }

    #[test]
    fn test_boundary_coincides() {
        let chapters = chapters(&[(0, 4096), (4096, 9000)]);
        let strand = find_strand(&chapters, 0, 4096).unwrap();
        assert_eq!(strand.chapter, 0);
        assert!(!strand.spans);
        assert_eq!(encode(Some(strand)).unwrap(), vec![0x00, 0x82, 0x88, 0x83]);
    }

    #[test]
    fn test_siblings() {
        let chapters = chapters(&[(0, 1000), (1000, 2000), (2000, 5000)]);
        let strand = find_strand(&chapters, 0, 4096).unwrap();
        assert_eq!(
            strand,
            Strand {
                chapter: 0,
                spans: false,
                siblings: 3
            }
        );
        assert_eq!(encode(Some(strand)).unwrap(), vec![0x00, 0x86, 0x88, 0x03, 0x84]);
    }

    #[test]
    fn test_touching_chapter_is_not_sibling() {
        // Chapter 2 starts exactly where the record ends
        let chapters = chapters(&[(0, 10), (10, 4096), (4096, 5000)]);
        let strand = find_strand(&chapters, 0, 4096).unwrap();
        assert_eq!(strand.siblings, 2);
    }

    #[test]
    fn test_length_suffix() {
        let chapters = chapters(&[(0, 50000)]);
        let bytes = trailing_entries(&chapters, 4096, 8192).unwrap();
        let (length, consumed) = decint_backward(&bytes);
        assert_eq!(consumed, 1);
        assert_eq!(length as usize, bytes.len() - 1);
    }

    #[test]
    fn test_too_many_siblings() {
        // 300 one-byte chapters all fall inside the first record
        let bounds: Vec<(usize, usize)> = (0..300).map(|i| (i, i + 1)).collect();
        let strand = find_strand(&chapters(&bounds), 0, 4096).unwrap();
        assert_eq!(strand.siblings, 300);
        assert!(matches!(encode(Some(strand)), Err(Error::Invariant(_))));
    }
}
