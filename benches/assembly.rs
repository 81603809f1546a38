//! Benchmarks for book assembly and serialization.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};

use kf8::{Book, Chapter, Chunk, build_database, write_mobi_to_writer};

/// A book with enough chapters to exercise every index and many text records.
fn sample_book() -> Book {
    let paragraph = "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit.</p>\n";
    let mut book = Book::new("Benchmark Book")
        .with_author("Bench Author")
        .with_language("en")
        .with_css_flow("p { text-indent: 1em; }");

    for i in 0..40 {
        let body = paragraph.repeat(200);
        book = book.with_chapter(
            Chapter::new(format!("Chapter {}", i + 1)).with_chunks(Chunk::split(&body, 4000)),
        );
    }
    book
}

fn bench_build_database(c: &mut Criterion) {
    let book = sample_book();
    c.bench_function("build_database", |b| {
        b.iter(|| build_database(&book, None).unwrap());
    });
}

fn bench_write_mobi(c: &mut Criterion) {
    let book = sample_book();
    c.bench_function("write_mobi_to_writer", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            write_mobi_to_writer(&book, &mut out).unwrap();
            out
        });
    });
}

criterion_group!(benches, bench_build_database, bench_write_mobi);
criterion_main!(benches);
