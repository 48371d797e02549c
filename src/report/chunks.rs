//! Per-document chunk report.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::chunking::{Chunker, DocChunk, HybridChunker};
use crate::error::Result;

const RULE_WIDTH: usize = 60;

/// Default report title.
pub const CHUNK_REPORT_TITLE: &str = "Hybrid Chunking Result";

/// One chunk with its token counts.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkEntry {
    pub text: String,
    pub contextualized: String,
    pub tokens: usize,
    pub context_tokens: usize,
}

/// Chunks of one document, ready to print.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub title: String,
    pub source: String,
    pub max_tokens: usize,
    pub tokenizer: String,
    pub chunks: Vec<ChunkEntry>,
}

impl ChunkReport {
    /// Count tokens of each chunk with and without context.
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        chunks: &[DocChunk],
        chunker: &HybridChunker,
    ) -> Self {
        let tokenizer = chunker.tokenizer();
        let chunks = chunks
            .iter()
            .map(|chunk| {
                let contextualized = chunker.contextualize(chunk);
                ChunkEntry {
                    tokens: tokenizer.count_tokens(&chunk.text),
                    context_tokens: tokenizer.count_tokens(&contextualized),
                    text: chunk.text.clone(),
                    contextualized,
                }
            })
            .collect();
        Self {
            title: title.into(),
            source: source.into(),
            max_tokens: tokenizer.max_tokens(),
            tokenizer: tokenizer.name(),
            chunks,
        }
    }

    /// Plain-text report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", self.title));
        out.push_str(&format!("{}\n", "=".repeat(self.title.chars().count().max(1))));
        out.push_str(&format!("Source: {}\n", self.source));
        out.push_str(&format!("Number of chunks: {}\n", self.chunks.len()));
        out.push_str(&format!("Max tokens per chunk: {}\n", self.max_tokens));
        out.push_str(&format!("Tokenizer: {}\n", self.tokenizer));
        out.push_str(&format!("\n{}\n\n", "=".repeat(RULE_WIDTH)));

        for (i, entry) in self.chunks.iter().enumerate() {
            out.push_str(&format!("=== CHUNK {} ===\n", i));
            out.push_str(&format!("Tokens (original): {}\n", entry.tokens));
            out.push_str(&format!("Tokens (with context): {}\n\n", entry.context_tokens));
            out.push_str("--- Original text ---\n");
            out.push_str(&format!("{}\n\n", entry.text));
            out.push_str("--- Contextualized text ---\n");
            out.push_str(&format!("{}\n\n", entry.contextualized));
            out.push_str(&format!("{}\n\n", "-".repeat(RULE_WIDTH)));
        }
        out
    }
}

/// File name of the chunk report for `stem`.
pub fn chunk_report_filename(stem: &str) -> String {
    format!("{}_chunks.txt", stem)
}

/// Write `<dir>/<stem>_chunks.txt`, creating `dir` as needed.
pub fn write_chunk_report(dir: &Path, stem: &str, report: &ChunkReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(chunk_report_filename(stem));
    std::fs::write(&path, report.render())?;
    log::debug!("Wrote {} chunks to {}", report.chunks.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::WordTokenizer;
    use crate::model::{DocItemLabel, Document};
    use std::sync::Arc;

    fn report() -> ChunkReport {
        let mut doc = Document::new("guide");
        doc.add_heading("Start", 1, None, None);
        doc.add_text(DocItemLabel::Paragraph, "Read this first.", None, None);
        let chunker = HybridChunker::new(Arc::new(WordTokenizer::new(64)));
        let chunks = chunker.chunk(&doc);
        ChunkReport::new("Chunks", "guide.md", &chunks, &chunker)
    }

    #[test]
    fn test_render_layout() {
        let text = report().render();
        assert!(text.starts_with("Chunks\n======\nSource: guide.md\nNumber of chunks: 1\n"));
        assert!(text.contains("Max tokens per chunk: 64\nTokenizer: words\n"));
        assert!(text.contains("=== CHUNK 0 ===\nTokens (original): 3\nTokens (with context): 4\n"));
        assert!(text.contains("--- Original text ---\nRead this first.\n"));
        assert!(text.contains("--- Contextualized text ---\nStart\nRead this first.\n"));
        assert!(text.trim_end().ends_with(&"-".repeat(RULE_WIDTH)));
    }

    #[test]
    fn test_write_chunk_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let path = write_chunk_report(&out, "guide", &report()).unwrap();
        assert_eq!(path, out.join("guide_chunks.txt"));
        assert!(std::fs::read_to_string(path).unwrap().contains("=== CHUNK 0 ==="));
    }
}
