//! Integration tests for chunk, structure and batch reports.

mod common;

use std::sync::Arc;

use docmill::report::{
    chunk_report_filename, write_chunk_report, BatchSummary, ChunkJobOutcome, ChunkReport,
    ExplainLimits, ExplainReport, CHUNK_REPORT_TITLE,
};
use docmill::{
    convert_bytes, Chunker, ConverterConfig, DocumentConverter, DocumentSource, HybridChunker,
    PdfPipelineOptions, WordTokenizer,
};

#[test]
fn test_chunk_report_file() {
    let doc = convert_bytes("report.md", common::REPORT_MD.as_bytes().to_vec()).unwrap();
    let chunker = HybridChunker::new(Arc::new(WordTokenizer::new(64)));
    let chunks = chunker.chunk(&doc);
    let report = ChunkReport::new(CHUNK_REPORT_TITLE, "report.md", &chunks, &chunker);

    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("output_chunks");
    let path = write_chunk_report(&out_dir, "report", &report).unwrap();
    assert_eq!(path, out_dir.join(chunk_report_filename("report")));
    assert!(path.ends_with("report_chunks.txt"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Hybrid Chunking Result\n======================\n"));
    assert!(text.contains("Source: report.md\n"));
    assert!(text.contains("Number of chunks: 3\n"));
    assert!(text.contains("Max tokens per chunk: 64\n"));
    assert!(text.contains("Tokenizer: words\n"));
    assert!(text.contains("=== CHUNK 0 ===\nTokens (original): 8\nTokens (with context): 10\n"));
    assert!(text.contains(
        "--- Contextualized text ---\nQuarterly Report\nHighlights\nNew office opened\nTwo products shipped\n"
    ));
    assert!(text.contains("=== CHUNK 2 ==="));
    assert!(!text.contains("=== CHUNK 3 ==="));
}

#[test]
fn test_explain_pdf() {
    let config = ConverterConfig {
        pdf: PdfPipelineOptions::new().with_ocr(false),
        ..Default::default()
    };
    let result = DocumentConverter::from_config(&config)
        .convert(DocumentSource::bytes("report.pdf", common::report_pdf()))
        .unwrap();

    let text = ExplainReport::new("report.pdf")
        .render(&result.document)
        .unwrap();
    assert!(text.contains("DOCUMENT STRUCTURE EXPLAINED"));
    assert!(text.contains("Source: report.pdf\n"));
    assert!(text.contains("Pages: 2\n"));
    assert!(text.contains("[title] → \"Annual Summary\""));
    assert!(text.contains("  prov: page 1, bbox("));
    assert!(text.contains("\"schema_name\": \"DoclingDocument\""));
    assert!(!text.contains("TABLES\n"));
}

#[test]
fn test_explain_limits() {
    let doc = convert_bytes("report.md", common::REPORT_MD.as_bytes().to_vec()).unwrap();
    let limits = ExplainLimits::new()
        .with_max_texts(2)
        .with_markdown_chars(10)
        .with_json_preview(1, 1);
    let text = ExplainReport::new("report.md")
        .with_limits(limits)
        .render(&doc)
        .unwrap();

    let more = doc.texts.len() - 2;
    assert!(text.contains(&format!("... and {} more text items", more)));
    assert!(text.contains("# Quarterl\n\n... [TRUNCATED - full markdown has"));
    assert!(text.contains("--- tables[0] ---\n  self_ref: #/tables/0\n  rows: 3\n  columns: 2\n"));
    assert!(text.contains("more)"));
}

#[test]
fn test_batch_summary_json() {
    let mut summary = BatchSummary::with_output_dir("output_chunks");
    summary.push(ChunkJobOutcome::success("report.md", 3, "output_chunks/report_chunks.txt"));
    summary.push(ChunkJobOutcome::failed("broken.pdf", "invalid file header"));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["outcomes"][0]["status"], "success");
    assert_eq!(json["outcomes"][0]["chunks"], 3);
    assert_eq!(json["outcomes"][1]["source"], "broken.pdf");

    let text = summary.render();
    assert!(text.contains("Output directory: output_chunks\n"));
    assert!(text.contains("  - broken.pdf: invalid file header\n"));
}
