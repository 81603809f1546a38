//! kf8 - Build and inspect KF8 ebooks

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{debug, info};

use kf8::mobi::exth::ExthType;
use kf8::mobi::headers::NULL_INDEX;
use kf8::{Book, Chapter, Chunk, Database, inspect, write_mobi};

/// Largest chunk cut from a chapter file.
const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Parser)]
#[command(name = "kf8")]
#[command(version, about = "Build and inspect KF8 ebooks", long_about = None)]
#[command(after_help = "EXAMPLES:
    kf8 build book.json -o book.azw3    Build a book from a JSON manifest
    kf8 info book.azw3                  Show the record layout of a book

Set RUST_LOG=kf8=debug to trace assembly.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a book from a JSON manifest
    Build {
        /// Manifest describing the book
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// Show the records and metadata of a book
    Info {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

/// A book as described in a JSON manifest. Paths are relative to the
/// manifest.
#[derive(Debug, Deserialize)]
struct Manifest {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    contributors: Vec<String>,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    language: String,
    /// RFC 3339; defaults to now.
    created: Option<String>,
    /// RFC 3339, offset preserved.
    published: Option<String>,
    #[serde(default)]
    unique_id: u32,
    #[serde(default)]
    doc_type: String,
    #[serde(default)]
    fixed_layout: bool,
    #[serde(default)]
    right_to_left: bool,
    chunk_size: Option<usize>,
    #[serde(default)]
    chapters: Vec<ManifestChapter>,
    #[serde(default)]
    css: Vec<PathBuf>,
    #[serde(default)]
    images: Vec<PathBuf>,
    cover: Option<PathBuf>,
    thumbnail: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ManifestChapter {
    title: String,
    /// Inline chunk bodies.
    #[serde(default)]
    chunks: Vec<String>,
    /// Chapter markup, cut into chunks after any inline ones.
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Build { manifest, output } => build(&manifest, &output),
        Command::Info { input } => show_info(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_file(base: &Path, path: &Path) -> Result<Vec<u8>, String> {
    let full = base.join(path);
    fs::read(&full).map_err(|e| format!("{}: {e}", full.display()))
}

fn read_string(base: &Path, path: &Path) -> Result<String, String> {
    let data = read_file(base, path)?;
    String::from_utf8(data).map_err(|e| format!("{}: {e}", path.display()))
}

fn parse_created(value: Option<&str>) -> Result<DateTime<Utc>, String> {
    match value {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| format!("created date {s:?}: {e}")),
        None => Ok(Utc::now()),
    }
}

fn load_book(manifest_path: &Path) -> Result<Book, String> {
    let json = fs::read_to_string(manifest_path)
        .map_err(|e| format!("{}: {e}", manifest_path.display()))?;
    let manifest: Manifest =
        serde_json::from_str(&json).map_err(|e| format!("{}: {e}", manifest_path.display()))?;
    let base = manifest_path.parent().unwrap_or(Path::new("."));
    let chunk_size = manifest.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);

    let mut book = Book::new(manifest.title)
        .with_publisher(manifest.publisher)
        .with_subject(manifest.subject)
        .with_language(manifest.language)
        .with_created(parse_created(manifest.created.as_deref())?)
        .with_unique_id(manifest.unique_id)
        .with_doc_type(manifest.doc_type)
        .with_fixed_layout(manifest.fixed_layout)
        .with_right_to_left(manifest.right_to_left);
    book.authors = manifest.authors;
    book.contributors = manifest.contributors;

    if let Some(published) = &manifest.published {
        let date = DateTime::parse_from_rfc3339(published)
            .map_err(|e| format!("published date {published:?}: {e}"))?;
        book = book.with_published(date);
    }

    for chapter in manifest.chapters {
        let mut built =
            Chapter::new(chapter.title).with_chunks(chapter.chunks.into_iter().map(Chunk::new));
        if let Some(file) = &chapter.file {
            let text = read_string(base, file)?;
            built = built.with_chunks(Chunk::split(&text, chunk_size));
        }
        debug!(title = %built.title, chunks = built.chunks.len(), "loaded chapter");
        book = book.with_chapter(built);
    }

    for css in &manifest.css {
        book = book.with_css_flow(read_string(base, css)?);
    }
    for image in &manifest.images {
        book = book.with_image(read_file(base, image)?);
    }
    if let Some(cover) = &manifest.cover {
        book = book.with_cover(read_file(base, cover)?);
    }
    if let Some(thumbnail) = &manifest.thumbnail {
        book = book.with_thumbnail(read_file(base, thumbnail)?);
    }

    Ok(book)
}

fn build(manifest: &Path, output: &Path) -> Result<(), String> {
    let book = load_book(manifest)?;
    write_mobi(&book, output).map_err(|e| e.to_string())?;
    info!(output = %output.display(), "wrote book");
    Ok(())
}

fn show_reference(label: &str, index: u32) {
    if index == NULL_INDEX {
        println!("  {label}: none");
    } else {
        println!("  {label}: {index}");
    }
}

fn show_info(path: &Path) -> Result<(), String> {
    let data = fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let db = Database::read(&data).map_err(|e| e.to_string())?;
    let info = inspect(&db).map_err(|e| e.to_string())?;
    let header = &info.header;

    println!("File: {}", path.display());
    println!("Name: {}", info.name);
    println!("Created: {}", info.created.to_rfc3339());
    println!("Title: {}", header.full_name);
    let authors = header.exth.get_strings(ExthType::Author);
    if !authors.is_empty() {
        println!("Authors: {}", authors.join(", "));
    }
    if let Some(language) = header.exth.get_string(ExthType::Language) {
        println!("Language: {language} (locale {})", header.mobi.locale);
    }
    println!(
        "Text: {} bytes in {} records",
        header.palmdoc.text_length, header.palmdoc.text_record_count
    );

    println!("References:");
    show_reference("first non-book", header.mobi.first_non_book_index);
    show_reference("chunk index", header.mobi.chunk_index);
    show_reference("skeleton index", header.mobi.skeleton_index);
    show_reference("ncx index", header.mobi.ncx_index);
    show_reference("first image", header.mobi.first_image_index);
    show_reference("fdst", header.mobi.fdst_index);
    show_reference("flis", header.mobi.flis_index);
    show_reference("fcis", header.mobi.fcis_index);

    println!("EXTH entries: {}", header.exth.entries().len());
    for entry in header.exth.entries() {
        println!("  {:>4}: {} bytes", entry.kind.code(), entry.data.len());
    }

    println!("Chapters: {}", info.chapters.len());
    for chapter in &info.chapters {
        println!("  {:>8} +{:<8} {}", chapter.start, chapter.length, chapter.title);
    }

    println!("Records: {}", info.record_lengths.len());
    for (i, length) in info.record_lengths.iter().enumerate() {
        println!("  {i:>4}: {length} bytes");
    }

    Ok(())
}
