//! Benchmarks for the section restyling pipeline.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use basalt::blobs::{BlobStore, MemoryBlobStore};
use basalt::css::{Normalizer, StylesheetNormalizer, reaim_selectors};
use basalt::dom::{parse_html, serialize_document};
use basalt::{Book, NavigationTemplate, PipelineOptions, ReaimMode, SectionPipeline, TocEntry, TocIndex};

const CHAPTERS: usize = 40;

fn sample_css() -> String {
    let mut css = String::from("@charset \"utf-8\";\nhtml, body { margin: 0; padding: 0 }\n");
    for i in 0..200 {
        css.push_str(&format!(
            "body .c{i} > p, html.vertical .c{i}, .body{i} {{ -webkit-hyphens: auto; margin: {i}px }}\n"
        ));
    }
    css
}

fn sample_chapter(n: usize) -> String {
    let mut html = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Chapter {n}</title>\
         <link rel=\"stylesheet\" href=\"../css/book.css\"/></head><body><div class=\"chapter\">"
    );
    for p in 0..300 {
        html.push_str(&format!(
            "<p class=\"c{}\">Paragraph {p} of chapter {n}, with <a href=\"c{}.xhtml#p\">a link</a>.</p>",
            p % 200,
            (n + 1) % CHAPTERS
        ));
    }
    html.push_str("</div></body></html>");
    html
}

fn sample_book() -> Book {
    let mut book = Book::new();
    book.add_resource("OEBPS/css/book.css", sample_css().into_bytes(), "text/css");
    for n in 0..CHAPTERS {
        let href = format!("OEBPS/text/c{n}.xhtml");
        book.add_resource(href.clone(), sample_chapter(n).into_bytes(), "application/xhtml+xml");
        book.add_spine_item(format!("c{n}"), href.clone(), "application/xhtml+xml");
        book.toc.push(TocEntry::new(format!("Chapter {n}"), href));
    }
    book
}

fn bench_reaim(c: &mut Criterion) {
    let css = sample_css();
    c.bench_function("reaim_selectors", |b| {
        b.iter(|| {
            reaim_selectors(
                black_box(&css),
                "basaltmainhtml",
                "basaltmainbody",
                ReaimMode::AllOccurrences,
            )
            .unwrap()
        });
    });
}

fn bench_normalize(c: &mut Criterion) {
    let css = sample_css();
    let normalizer = Normalizer::new("basaltmainhtml", "basaltmainbody");
    c.bench_function("normalize_stylesheet", |b| {
        b.iter(|| normalizer.normalize(black_box(&css)).unwrap());
    });
}

fn bench_parse_serialize(c: &mut Criterion) {
    let html = sample_chapter(0);
    c.bench_function("parse_serialize_section", |b| {
        b.iter(|| serialize_document(&parse_html(black_box(&html))));
    });
}

fn bench_prepare_section(c: &mut Criterion) {
    let book = sample_book();
    let toc = TocIndex::build(&book).unwrap();
    let template = NavigationTemplate::from_toc(&toc).unwrap();
    let pipeline = SectionPipeline::new(&book, &toc, &template);
    let options = PipelineOptions::default();

    c.bench_function("prepare_section", |b| {
        let mut store = MemoryBlobStore::new();
        b.iter(|| {
            let prepared = pipeline.prepare(black_box(7), &options, &mut store).unwrap();
            for url in &prepared.blobs {
                store.revoke_object_url(url);
            }
        });
    });
}

criterion_group!(
    benches,
    bench_reaim,
    bench_normalize,
    bench_parse_serialize,
    bench_prepare_section
);
criterion_main!(benches);
