pub mod exth;
pub mod headers;
pub mod index;
pub mod inspect;
mod jfif;
pub mod locale;
pub mod records;
pub mod tagx;
pub mod template;
pub mod trailing;
pub mod vwi;
mod writer;

pub use inspect::{BookInfo, inspect, read_text};
pub use records::Record;
pub use template::{ChunkContext, DefaultTemplate, HeadTemplate};
pub use writer::{
    RenderedText, build_database, render_text, text_records, write_mobi, write_mobi_to_writer,
};
