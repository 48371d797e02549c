//! Benchmarks for conversion, export and chunking.
//!
//! Run with: cargo bench
//!
//! Documents are synthetic so the numbers are comparable between runs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docmill::model::TableData;
use docmill::{
    detect_format_from_bytes, export_to_json, export_to_markdown, Chunker, DocItemLabel, Document,
    HybridChunker, JsonFormat, MarkdownOptions, WordTokenizer,
};

/// A document with `sections` sections of paragraphs, a list and a table each.
fn synthetic_document(sections: usize) -> Document {
    let mut doc = Document::new("bench");
    doc.add_title("Synthetic Benchmark Document", None, None);
    for s in 0..sections {
        doc.add_heading(format!("Section {}", s + 1), 1, None, None);
        for p in 0..4 {
            let text = format!(
                "Paragraph {} of section {} describes the measured_value trends across regions, \
                 products and quarters in enough words to need real work from the exporters.",
                p + 1,
                s + 1
            );
            doc.add_text(DocItemLabel::Paragraph, text, None, None);
        }
        let list = doc.add_list_group(false, None);
        for i in 0..5 {
            doc.add_list_item(format!("Finding {} in section {}", i + 1, s + 1), false, None, None, Some(&list));
        }
        let rows: Vec<Vec<String>> = std::iter::once(vec!["Region".to_string(), "Q1".into(), "Q2".into()])
            .chain((0..8).map(|r| vec![format!("Region {}", r), format!("{}", r * 10), format!("{}", r * 12)]))
            .collect();
        doc.add_table(TableData::from_rows(&rows, 1), None, None);
    }
    doc
}

/// Benchmark format detection.
fn bench_format_detection(c: &mut Criterion) {
    let pdf_data = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let markdown = b"# Notes\n\nSome text.".to_vec();

    c.bench_function("detect_pdf", |b| {
        b.iter(|| detect_format_from_bytes(black_box(&pdf_data), "a.pdf").unwrap());
    });

    c.bench_function("detect_markdown_by_name", |b| {
        b.iter(|| detect_format_from_bytes(black_box(&markdown), "notes.md").unwrap());
    });
}

/// Benchmark Markdown and JSON export at various sizes.
fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for sections in [1, 10, 50].iter() {
        let doc = synthetic_document(*sections);
        let options = MarkdownOptions::default();

        group.bench_function(format!("markdown_{}_sections", sections), |b| {
            b.iter(|| export_to_markdown(black_box(&doc), &options));
        });

        group.bench_function(format!("json_{}_sections", sections), |b| {
            b.iter(|| export_to_json(black_box(&doc), JsonFormat::Compact).unwrap());
        });
    }

    group.finish();
}

/// Benchmark hybrid chunking with a word budget.
fn bench_chunking(c: &mut Criterion) {
    let doc = synthetic_document(20);
    let chunker = HybridChunker::new(Arc::new(WordTokenizer::new(64)));

    c.bench_function("hybrid_chunking_20_sections", |b| {
        b.iter(|| chunker.chunk(black_box(&doc)));
    });
}

criterion_group!(benches, bench_format_detection, bench_export, bench_chunking);
criterion_main!(benches);
