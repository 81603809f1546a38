//! Head markup written in front of every chunk.
//!
//! Each chunk of KF8 text starts with a complete XHTML skeleton whose
//! `<body>` carries an `aid` attribute naming the chunk. Readers splice the
//! chunk content into that body.

use quick_xml::escape::escape;

use crate::book::{Book, Chapter};
use crate::error::Result;

/// What a template knows about the chunk it renders for.
#[derive(Debug, Clone, Copy)]
pub struct ChunkContext<'a> {
    pub book: &'a Book,
    pub chapter: &'a Chapter,
    /// Position of the chapter in the book.
    pub chapter_index: usize,
    /// Position of the chunk across the whole book.
    pub chunk_index: usize,
}

/// Renders the head markup for one chunk.
///
/// Errors are propagated out of assembly unchanged. Closures taking a
/// [`ChunkContext`] implement this trait.
pub trait HeadTemplate {
    fn render(&self, ctx: &ChunkContext<'_>) -> Result<String>;
}

impl<F> HeadTemplate for F
where
    F: Fn(&ChunkContext<'_>) -> Result<String>,
{
    fn render(&self, ctx: &ChunkContext<'_>) -> Result<String> {
        self(ctx)
    }
}

/// Minimal XHTML skeleton linking every CSS flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplate;

impl HeadTemplate for DefaultTemplate {
    fn render(&self, ctx: &ChunkContext<'_>) -> Result<String> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n");
        out.push_str("  <head>\n");
        out.push_str(&format!("    <title>{}</title>\n", escape(ctx.book.title.as_str())));
        out.push_str(
            "    <meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\"/>\n",
        );
        for flow in 1..=ctx.book.css_flows.len() {
            out.push_str(&format!(
                "    <link rel=\"stylesheet\" type=\"text/css\" href=\"kindle:flow:{flow:03}?mime=text/css\"/>\n"
            ));
        }
        out.push_str("  </head>\n");
        out.push_str(&format!("  <body aid=\"{:04}\">\n", ctx.chunk_index));
        out.push_str("  </body>\n");
        out.push_str("</html>");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn render_with(template: &dyn HeadTemplate, book: &Book, chunk_index: usize) -> Result<String> {
        let ctx = ChunkContext {
            book,
            chapter: &book.chapters[0],
            chapter_index: 0,
            chunk_index,
        };
        template.render(&ctx)
    }

    #[test]
    fn test_default_template() {
        let book = Book::new("Tom & Jerry")
            .with_css_flow("p {}")
            .with_css_flow("h1 {}")
            .with_chapter(Chapter::new("One").with_chunk("x"));
        let head = render_with(&DefaultTemplate, &book, 12).unwrap();

        assert!(head.starts_with("<?xml"));
        assert!(head.contains("<title>Tom &amp; Jerry</title>"));
        assert!(head.contains("kindle:flow:001?mime=text/css"));
        assert!(head.contains("kindle:flow:002?mime=text/css"));
        assert!(!head.contains("kindle:flow:003"));
        assert!(head.contains("<body aid=\"0012\">"));
    }

    #[test]
    fn test_closure_template() {
        let book = Book::new("T").with_chapter(Chapter::new("One"));
        let template = |ctx: &ChunkContext<'_>| -> Result<String> {
            Ok(format!("<{}:{}>", ctx.chapter.title, ctx.chunk_index))
        };
        assert_eq!(render_with(&template, &book, 3).unwrap(), "<One:3>");
    }

    #[test]
    fn test_template_error() {
        let book = Book::new("T").with_chapter(Chapter::new("One"));
        let template =
            |_: &ChunkContext<'_>| -> Result<String> { Err(Error::Template("missing field".into())) };
        assert!(matches!(render_with(&template, &book, 0), Err(Error::Template(_))));
    }
}
