use chrono::{DateTime, FixedOffset, Utc};

/// Everything needed to write a KF8 book.
///
/// Built with [`Book::new`] and the `with_*` methods, then handed to
/// [`write_mobi`](crate::write_mobi) or [`build_database`](crate::build_database).
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub title: String,
    pub authors: Vec<String>,
    pub contributors: Vec<String>,
    pub publisher: String,
    pub subject: String,
    /// Container timestamp.
    pub created: DateTime<Utc>,
    pub published: Option<DateTime<FixedOffset>>,
    /// EXTH document type, `EBOK` when empty.
    pub doc_type: String,
    /// BCP 47 language tag.
    pub language: String,
    pub fixed_layout: bool,
    pub right_to_left: bool,
    pub unique_id: u32,
    pub chapters: Vec<Chapter>,
    /// Stylesheets appended after the HTML flow.
    pub css_flows: Vec<String>,
    /// Image payloads, addressed as `kindle:embed:NNNN` in order.
    pub images: Vec<Vec<u8>>,
    pub cover: Option<Vec<u8>>,
    pub thumbnail: Option<Vec<u8>>,
}

/// A chapter: one navigation entry covering all of its chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub chunks: Vec<Chunk>,
}

/// A piece of chapter markup. Each chunk gets its own head markup and
/// skeleton entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub body: String,
}

impl Book {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created: Utc::now(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_contributor(mut self, contributor: impl Into<String>) -> Self {
        self.contributors.push(contributor.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    pub fn with_published(mut self, published: DateTime<FixedOffset>) -> Self {
        self.published = Some(published);
        self
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = doc_type.into();
        self
    }

    pub fn with_unique_id(mut self, unique_id: u32) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn with_fixed_layout(mut self, fixed_layout: bool) -> Self {
        self.fixed_layout = fixed_layout;
        self
    }

    pub fn with_right_to_left(mut self, right_to_left: bool) -> Self {
        self.right_to_left = right_to_left;
        self
    }

    pub fn with_chapter(mut self, chapter: Chapter) -> Self {
        self.chapters.push(chapter);
        self
    }

    pub fn with_css_flow(mut self, css: impl Into<String>) -> Self {
        self.css_flows.push(css.into());
        self
    }

    pub fn with_image(mut self, data: Vec<u8>) -> Self {
        self.images.push(data);
        self
    }

    pub fn with_cover(mut self, data: Vec<u8>) -> Self {
        self.cover = Some(data);
        self
    }

    pub fn with_thumbnail(mut self, data: Vec<u8>) -> Self {
        self.thumbnail = Some(data);
        self
    }

    /// Body images, then cover, then thumbnail.
    pub fn all_images(&self) -> impl Iterator<Item = &[u8]> {
        self.images
            .iter()
            .chain(self.cover.iter())
            .chain(self.thumbnail.iter())
            .map(Vec::as_slice)
    }
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            chunks: Vec::new(),
        }
    }

    pub fn with_chunk(mut self, body: impl Into<String>) -> Self {
        self.chunks.push(Chunk::new(body));
        self
    }

    pub fn with_chunks(mut self, chunks: impl IntoIterator<Item = Chunk>) -> Self {
        self.chunks.extend(chunks);
        self
    }
}

impl Chunk {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Cut `text` into chunks of at most `max` bytes, never inside a
    /// UTF-8 sequence. A character wider than `max` gets a chunk of its own.
    pub fn split(text: &str, max: usize) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            let mut end = max.min(rest.len());
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                end = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            let (head, tail) = rest.split_at(end);
            chunks.push(Chunk::new(head));
            rest = tail;
        }

        chunks
    }
}

/// One chunk per string, in order.
pub fn chunks<S: AsRef<str>>(bodies: &[S]) -> Vec<Chunk> {
    bodies.iter().map(|b| Chunk::new(b.as_ref())).collect()
}
