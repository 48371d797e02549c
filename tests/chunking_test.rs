//! Integration tests for hierarchical and hybrid chunking.

mod common;

use std::sync::Arc;

use docmill::chunking::{DocChunk, HierarchicalChunker, HuggingFaceTokenizer, HybridChunker};
use docmill::{convert_bytes, Chunker, Document, Tokenizer, WordTokenizer};

fn report() -> Document {
    convert_bytes("report.md", common::REPORT_MD.as_bytes().to_vec()).unwrap()
}

fn long_guide(sentences: usize) -> String {
    let mut md = String::from("# Guide\n\n");
    let body: Vec<String> = (0..sentences)
        .map(|s| {
            let words: Vec<String> = (0..10).map(|w| format!("word{}", s * 10 + w)).collect();
            format!("{}.", words.join(" "))
        })
        .collect();
    md.push_str(&body.join(" "));
    md.push('\n');
    md
}

#[test]
fn test_hierarchical_chunks_follow_sections() {
    let doc = report();
    let chunks = HierarchicalChunker::new().chunk(&doc);
    assert_eq!(chunks.len(), 3);

    assert_eq!(chunks[0].text, "Revenue grew in every region during the quarter.");
    assert_eq!(chunks[0].meta.headings, vec!["Quarterly Report"]);

    assert_eq!(chunks[1].text, "New office opened\nTwo products shipped");
    assert_eq!(chunks[1].meta.headings, vec!["Quarterly Report", "Highlights"]);
    assert_eq!(chunks[1].meta.doc_items.len(), 2);

    assert!(chunks[2].text.starts_with("| Region | Sales |"));
    assert_eq!(chunks[2].meta.headings, vec!["Quarterly Report", "Figures"]);
    assert_eq!(
        chunks[2].meta.origin.as_ref().map(|o| o.filename.as_str()),
        Some("report.md")
    );
}

#[test]
fn test_unmerged_list_items() {
    let doc = report();
    let chunks = HierarchicalChunker::new().with_merge_list_items(false).chunk(&doc);
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[1].text, "New office opened");
    assert_eq!(chunks[2].text, "Two products shipped");
}

#[test]
fn test_hybrid_keeps_sections_apart() {
    let doc = report();
    let chunker = HybridChunker::new(Arc::new(WordTokenizer::new(64)));
    let chunks = chunker.chunk(&doc);
    assert_eq!(chunks.len(), 3);
    assert_eq!(
        chunker.contextualize(&chunks[1]),
        "Quarterly Report\nHighlights\nNew office opened\nTwo products shipped"
    );
}

#[test]
fn test_hybrid_respects_budget() {
    let doc = convert_bytes("guide.md", long_guide(12).into_bytes()).unwrap();
    let tokenizer = Arc::new(WordTokenizer::new(20));
    let chunker = HybridChunker::new(tokenizer.clone());
    let chunks = chunker.chunk(&doc);

    assert!(chunks.len() >= 6);
    for chunk in &chunks {
        assert!(tokenizer.count_tokens(&chunker.contextualize(chunk)) <= 20);
        assert_eq!(chunk.meta.headings, vec!["Guide"]);
    }
    let words: usize = chunks.iter().map(|c| tokenizer.count_tokens(&c.text)).sum();
    assert_eq!(words, 120);
    assert!(chunks[0].text.starts_with("word0 word1"));
    assert!(chunks.last().unwrap().text.ends_with("word119."));
}

#[test]
fn test_chunks_serialize_with_refs() {
    let doc = report();
    let chunks = HybridChunker::new(Arc::new(WordTokenizer::new(64))).chunk(&doc);
    let json = serde_json::to_value(&chunks).unwrap();
    assert_eq!(json[0]["meta"]["doc_items"][0]["$ref"], "#/texts/1");
    assert_eq!(json[2]["meta"]["headings"][1], "Figures");

    let back: Vec<DocChunk> = serde_json::from_value(json).unwrap();
    assert_eq!(back.len(), chunks.len());
    assert_eq!(back[1].text, chunks[1].text);
}

#[test]
fn test_hybrid_with_tokenizer_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokenizer.json");
    std::fs::write(
        &path,
        r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": {"[UNK]": 0}, "unk_token": "[UNK]"}
        }"#,
    )
    .unwrap();
    let tokenizer = HuggingFaceTokenizer::from_file(&path, 16).unwrap();
    let chunker = HybridChunker::new(Arc::new(tokenizer));
    assert_eq!(chunker.max_tokens(), 16);

    let doc = convert_bytes("guide.md", long_guide(4).into_bytes()).unwrap();
    let chunks = chunker.chunk(&doc);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunker.tokenizer().count_tokens(&chunker.contextualize(chunk)) <= 16);
    }
}
