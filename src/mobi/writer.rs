//! KF8 Writer
//!
//! Assembles a [`Book`] into a Palm database of KF8 records.
//!
//! Record 0 points at records that only exist once everything else has
//! been appended, so the build runs in two phases: a draft of record 0 is
//! held aside while the other records are appended and their indexes
//! noted, then the finished draft is installed with
//! [`Database::replace`].

use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::book::Book;
use crate::error::{Error, Result};
use crate::pdb::Database;
use crate::util::{pad_to, sanitize_name};

use super::exth::ExthType;
use super::headers::{Fcis, FlowTable, TEXT_RECORD_SIZE};
use super::index::{
    ChapterPosition, ChunkPosition, IndexRecords, chunk_index, navigation_index, skeleton_index,
};
use super::locale::{match_locale, primary_subtag};
use super::records::{HeaderRecord, ImageRecord, Record, TextRecord};
use super::template::{ChunkContext, DefaultTemplate, HeadTemplate};
use super::trailing::trailing_entries;

const DEFAULT_DOC_TYPE: &str = "EBOK";
const PUBLISHED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Write a [`Book`] to a KF8 file on disk.
///
/// # Example
///
/// ```no_run
/// use kf8::{Book, Chapter, write_mobi};
///
/// let book = Book::new("Example")
///     .with_author("Jane Doe")
///     .with_language("en")
///     .with_chapter(Chapter::new("One").with_chunk("<p>Hello</p>"));
/// write_mobi(&book, "example.azw3")?;
/// # Ok::<(), kf8::Error>(())
/// ```
pub fn write_mobi<P: AsRef<Path>>(book: &Book, path: P) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    write_mobi_to_writer(book, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a [`Book`] to any [`Write`] destination.
///
/// Useful for writing to memory buffers or network streams.
pub fn write_mobi_to_writer<W: Write>(book: &Book, writer: &mut W) -> Result<()> {
    build_database(book, None)?.write(writer)
}

/// Assemble a [`Book`] into its database without writing it.
///
/// `template` renders the head markup of each chunk; `None` uses
/// [`DefaultTemplate`]. A template error aborts the build.
pub fn build_database(
    book: &Book,
    template: Option<&dyn HeadTemplate>,
) -> Result<Database<Record>> {
    let template = template.unwrap_or(&DefaultTemplate);
    MobiBuilder::new(book, template)?.build()
}

/// The HTML flow with the position of every chunk and chapter in it.
#[derive(Debug, Clone, Default)]
pub struct RenderedText {
    pub html: Vec<u8>,
    pub chunks: Vec<ChunkPosition>,
    pub chapters: Vec<ChapterPosition>,
}

/// Render every chunk's head markup and lay the chunks out back to back.
pub fn render_text(book: &Book, template: &dyn HeadTemplate) -> Result<RenderedText> {
    let mut rendered = RenderedText::default();
    let mut chunk_index = 0;

    for (chapter_index, chapter) in book.chapters.iter().enumerate() {
        let chapter_start = rendered.html.len();

        for chunk in &chapter.chunks {
            let ctx = ChunkContext {
                book,
                chapter,
                chapter_index,
                chunk_index,
            };
            let head = template.render(&ctx)?;

            let head_start = rendered.html.len();
            rendered.chunks.push(ChunkPosition {
                head_start,
                head_length: head.len(),
                content_start: head_start + head.len(),
                content_length: chunk.body.len(),
            });
            rendered.html.extend_from_slice(head.as_bytes());
            rendered.html.extend_from_slice(chunk.body.as_bytes());
            chunk_index += 1;
        }

        rendered.chapters.push(ChapterPosition {
            title: chapter.title.clone(),
            start: chapter_start,
            length: rendered.html.len() - chapter_start,
        });
    }

    Ok(rendered)
}

/// Cut the text into records, each followed by its trailing entries.
pub fn text_records(text: &[u8], chapters: &[ChapterPosition]) -> Result<Vec<TextRecord>> {
    text.chunks(TEXT_RECORD_SIZE)
        .enumerate()
        .map(|(i, data)| {
            let from = i * TEXT_RECORD_SIZE;
            let to = from + data.len();
            let trailing = trailing_entries(chapters, from, to)?;
            trace!(record = i, from, to, trailing = ?trailing, "text record");
            TextRecord::new(data.to_vec(), trailing)
        })
        .collect()
}

/// Lowercase hex of the unique id's big-endian bytes.
fn asin(unique_id: u32) -> String {
    format!("{unique_id:08x}")
}

struct MobiBuilder<'a> {
    book: &'a Book,
    rendered: RenderedText,
    /// HTML flow followed by every CSS flow.
    text: Vec<u8>,
}

impl<'a> MobiBuilder<'a> {
    fn new(book: &'a Book, template: &dyn HeadTemplate) -> Result<Self> {
        let rendered = render_text(book, template)?;
        let mut text = rendered.html.clone();
        for css in &book.css_flows {
            text.extend_from_slice(css.as_bytes());
        }

        debug!(
            chapters = rendered.chapters.len(),
            chunks = rendered.chunks.len(),
            html_length = rendered.html.len(),
            text_length = text.len(),
            "rendered text"
        );

        Ok(Self {
            book,
            rendered,
            text,
        })
    }

    fn build(self) -> Result<Database<Record>> {
        let book = self.book;
        let mut db = Database::new(&sanitize_name(&book.title), book.created);
        let mut header = self.header_record();

        // Phase 1: placeholder for record 0, then everything it points at
        db.append(Record::Raw(Vec::new()));

        let texts = text_records(&self.text, &self.rendered.chapters)?;
        header.palmdoc.text_length = u32::try_from(self.text.len())
            .map_err(|_| Error::invariant("text length does not fit in 32 bits"))?;
        header.palmdoc.text_record_count = u16::try_from(texts.len())
            .map_err(|_| Error::invariant(format!("{} text records do not fit", texts.len())))?;

        let last_text_length = texts.last().map_or(0, |t| t.data().len() + t.trailing().len());
        for text in texts {
            db.append(Record::Text(text));
        }
        let padding = pad_to(last_text_length, 4);
        if padding > 0 {
            db.append(Record::Raw(vec![0; padding]));
        }
        header.mobi.first_non_book_index = db.len() as u32;
        debug!(
            text_records = header.palmdoc.text_record_count,
            padding, "appended text records"
        );

        let chunks = chunk_index(&self.rendered.chunks, self.text.len())?;
        header.mobi.chunk_index = append_index(&mut db, chunks, "chunk");

        let skeleton = skeleton_index(&self.rendered.chunks)?;
        header.mobi.skeleton_index = append_index(&mut db, skeleton, "skeleton");

        let ncx = navigation_index(&self.rendered.chapters)?;
        header.mobi.ncx_index = append_index(&mut db, ncx, "navigation");

        let mut image_count = 0;
        for image in book.all_images() {
            let index = db.append(Record::Image(ImageRecord::new(image)));
            if image_count == 0 {
                header.mobi.first_image_index = index as u32;
            }
            image_count += 1;
        }
        if image_count > 0 {
            header.exth.add_int(ExthType::ResourceCount, image_count);
            debug!(
                first = header.mobi.first_image_index,
                count = image_count,
                "appended image records"
            );
        }

        let flows = std::iter::once(self.rendered.html.len())
            .chain(book.css_flows.iter().map(String::len));
        let flow_table = FlowTable::new(flows);
        header.mobi.fdst_count = flow_table.ranges().len() as u32;
        header.mobi.fdst_index = db.append(Record::FlowTable(flow_table)) as u32;

        header.mobi.flis_index = db.append(Record::Flis) as u32;
        header.mobi.flis_count = 1;

        header.mobi.fcis_index = db.append(Record::Fcis(Fcis {
            text_length: header.palmdoc.text_length,
        })) as u32;
        header.mobi.fcis_count = 1;

        db.append(Record::EndOfFile);

        // Phase 2: install the finished record 0
        debug!(
            records = db.len(),
            exth_entries = header.exth.entries().len(),
            "installing record 0"
        );
        db.replace(0, Record::Header(Box::new(header)))?;

        Ok(db)
    }

    /// Draft of record 0 with everything known before any record is built.
    fn header_record(&self) -> HeaderRecord {
        let book = self.book;
        let mut header = HeaderRecord::new(book.title.as_str());
        header.mobi.unique_id = book.unique_id;
        header.mobi.locale = match_locale(&book.language);

        let exth = &mut header.exth;
        exth.add_string(ExthType::Title, &book.title);
        exth.add_string(ExthType::UpdatedTitle, &book.title);
        for author in &book.authors {
            exth.add_string(ExthType::Author, author);
        }
        for contributor in &book.contributors {
            exth.add_string(ExthType::Contributor, contributor);
        }
        exth.add_string(ExthType::Publisher, &book.publisher);
        exth.add_string(ExthType::Subject, &book.subject);
        exth.add_string(ExthType::Asin, &asin(book.unique_id));
        exth.add_string(ExthType::Language, &primary_subtag(&book.language));
        if let Some(published) = &book.published {
            let date = published.format(PUBLISHED_DATE_FORMAT).to_string();
            exth.add_string(ExthType::PublishingDate, &date);
        }
        if book.doc_type.is_empty() {
            exth.add_string(ExthType::DocType, DEFAULT_DOC_TYPE);
        } else {
            exth.add_string(ExthType::DocType, &book.doc_type);
        }
        if book.fixed_layout {
            exth.add_string(ExthType::FixedLayout, "true");
        }
        if book.right_to_left {
            exth.add_string(ExthType::PrimaryWritingMode, "horizontal-rl");
            exth.add_string(ExthType::PageProgressionDirection, "rtl");
        }

        // Cover and thumbnail follow the body images
        let mut next_image = book.images.len() as u32;
        if book.cover.is_some() {
            exth.add_int(ExthType::CoverOffset, next_image);
            exth.add_int(ExthType::HasFakeCover, 0);
            exth.add_string(ExthType::CoverUri, &format!("kindle:embed:{:04}", next_image + 1));
            next_image += 1;
        }
        if book.thumbnail.is_some() {
            exth.add_int(ExthType::ThumbOffset, next_image);
        }

        header
    }
}

/// Append an index's header, entry and label records, returning the
/// header record's index.
fn append_index(db: &mut Database<Record>, records: IndexRecords, name: &str) -> u32 {
    let header_index = db.append(Record::Index(records.header));
    let entries = records.entries.raw_entries().len();
    db.append(Record::Index(records.entries));
    if let Some(labels) = records.labels {
        db.append(Record::Labels(labels));
    }
    debug!(index = name, record = header_index, entries, "appended index");
    header_index as u32
}
