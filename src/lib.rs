//! # kf8
//!
//! A writer for KF8 (MOBI version 8 / AZW3) ebooks.
//!
//! ## Features
//!
//! - Uncompressed KF8 text records with trailing navigation data
//! - Skeleton, chunk and NCX indexes with their label records
//! - EXTH metadata, cover and thumbnail images, CSS flows
//! - Enough read support to inspect what was written
//!
//! ## Quick Start
//!
//! ```no_run
//! use kf8::{Book, Chapter, Chunk, write_mobi};
//!
//! let book = Book::new("My Book")
//!     .with_author("Author Name")
//!     .with_language("en")
//!     .with_css_flow("p { margin: 0 }")
//!     .with_chapter(Chapter::new("Chapter 1").with_chunk("<p>Hello</p>"))
//!     .with_chapter(
//!         Chapter::new("Chapter 2").with_chunks(Chunk::split("<p>A long chapter</p>", 4000)),
//!     );
//!
//! write_mobi(&book, "output.azw3").unwrap();
//! ```
//!
//! ## Custom head markup
//!
//! Every chunk is preceded by head markup rendered by a [`HeadTemplate`].
//! Closures work as templates:
//!
//! ```
//! use kf8::{Book, Chapter, ChunkContext, build_database};
//!
//! let book = Book::new("Plain").with_chapter(Chapter::new("One").with_chunk("<p>x</p>"));
//! let template = |ctx: &ChunkContext<'_>| -> kf8::Result<String> {
//!     Ok(format!("<html><head></head><body aid=\"{:04}\">", ctx.chunk_index))
//! };
//! let db = build_database(&book, Some(&template as &dyn kf8::HeadTemplate)).unwrap();
//! assert_eq!(db.name(), "Plain");
//! ```

pub mod book;
pub mod error;
pub mod mobi;
pub mod pdb;
pub mod util;

pub use book::{Book, Chapter, Chunk, chunks};
pub use error::{Error, Result};
pub use mobi::{
    BookInfo, ChunkContext, DefaultTemplate, HeadTemplate, Record, build_database, inspect,
    read_text, write_mobi, write_mobi_to_writer,
};
pub use pdb::{Database, Encode};
