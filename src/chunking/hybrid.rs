//! Token-aware refinement of hierarchical chunks.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use super::{item_text, join_context, Chunker, DocChunk, DocMeta, HierarchicalChunker, Tokenizer};
use crate::model::{Document, NodeRef};

/// Separator levels tried in order when a text must be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SplitLevel {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

impl SplitLevel {
    fn next(self) -> Option<Self> {
        match self {
            SplitLevel::Paragraph => Some(SplitLevel::Line),
            SplitLevel::Line => Some(SplitLevel::Sentence),
            SplitLevel::Sentence => Some(SplitLevel::Word),
            SplitLevel::Word => Some(SplitLevel::Char),
            SplitLevel::Char => None,
        }
    }

    fn joiner(self) -> &'static str {
        match self {
            SplitLevel::Paragraph => "\n\n",
            SplitLevel::Line => "\n",
            SplitLevel::Sentence | SplitLevel::Word => " ",
            SplitLevel::Char => "",
        }
    }

    fn pieces(self, text: &str) -> Vec<&str> {
        let pieces: Vec<&str> = match self {
            SplitLevel::Paragraph => text.split("\n\n").collect(),
            SplitLevel::Line => text.lines().collect(),
            SplitLevel::Sentence => text.unicode_sentences().collect(),
            SplitLevel::Word => text.split_whitespace().collect(),
            SplitLevel::Char => text.graphemes(true).collect(),
        };
        match self {
            SplitLevel::Char => pieces,
            _ => pieces
                .into_iter()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

/// Chunker that fits hierarchical chunks to a token budget.
pub struct HybridChunker {
    tokenizer: Arc<dyn Tokenizer>,
    inner: HierarchicalChunker,
    merge_peers: bool,
    delim: String,
}

impl std::fmt::Debug for HybridChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridChunker")
            .field("tokenizer", &self.tokenizer.name())
            .field("max_tokens", &self.tokenizer.max_tokens())
            .field("merge_peers", &self.merge_peers)
            .finish()
    }
}

impl HybridChunker {
    /// Chunker with peer merging and a newline delimiter.
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            inner: HierarchicalChunker::default(),
            merge_peers: true,
            delim: "\n".to_string(),
        }
    }

    /// Toggle merging of undersized neighbours.
    pub fn with_merge_peers(mut self, merge: bool) -> Self {
        self.merge_peers = merge;
        self
    }

    /// Separator between headings, captions and text.
    pub fn with_delim(mut self, delim: impl Into<String>) -> Self {
        self.delim = delim.into();
        self
    }

    /// Replace the structural pass.
    pub fn with_inner(mut self, inner: HierarchicalChunker) -> Self {
        self.inner = inner;
        self
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub fn max_tokens(&self) -> usize {
        self.tokenizer.max_tokens()
    }

    fn count(&self, chunk: &DocChunk) -> usize {
        self.tokenizer.count_tokens(&self.contextualize(chunk))
    }

    fn fits(&self, chunk: &DocChunk) -> bool {
        self.count(chunk) <= self.max_tokens()
    }

    /// Greedy windows of whole items, each fitting the budget where
    /// possible. A single oversized item keeps its own window.
    fn split_by_doc_items(&self, doc: &Document, chunk: DocChunk) -> Vec<DocChunk> {
        if chunk.meta.doc_items.len() <= 1 || self.fits(&chunk) {
            return vec![chunk];
        }

        // captions are grouped with their table or picture
        let units = item_units(doc, &chunk.meta.doc_items);
        if units.len() <= 1 {
            return vec![chunk];
        }

        let mut out = Vec::new();
        let mut window: Option<DocChunk> = None;
        for (refs, text) in units {
            let unit = DocChunk::new(text, DocMeta { doc_items: refs, ..chunk.meta.clone() });
            window = Some(match window.take() {
                None => unit,
                Some(current) => {
                    let candidate = self.concat(&current, &unit);
                    if self.fits(&candidate) {
                        candidate
                    } else {
                        out.push(current);
                        unit
                    }
                }
            });
        }
        out.extend(window);
        out
    }

    /// Split an oversized single-item chunk on text boundaries.
    fn split_by_text(&self, chunk: DocChunk) -> Vec<DocChunk> {
        let max = self.max_tokens();
        if self.count(&chunk) <= max {
            return vec![chunk];
        }

        let context = DocChunk::new(String::new(), chunk.meta.clone());
        let context_tokens = self.count(&context);
        if context_tokens >= max {
            log::warn!(
                "Headings and captions use {} of {} tokens; splitting into words",
                context_tokens,
                max
            );
            return SplitLevel::Word
                .pieces(&chunk.text)
                .into_iter()
                .map(|word| DocChunk::new(word, chunk.meta.clone()))
                .collect();
        }

        let mut budget = max - context_tokens;
        loop {
            let pieces = split_text(&chunk.text, budget, SplitLevel::Paragraph, self.tokenizer.as_ref());
            let pieces: Vec<DocChunk> = pieces
                .into_iter()
                .map(|text| DocChunk::new(text, chunk.meta.clone()))
                .collect();
            // token counts are not always additive across the delimiter
            let overflow = pieces
                .iter()
                .map(|p| self.count(p).saturating_sub(max))
                .max()
                .unwrap_or(0);
            if overflow == 0 || budget <= 1 {
                return pieces;
            }
            budget = budget.saturating_sub(overflow).max(1);
        }
    }

    fn merge_peers(&self, chunks: Vec<DocChunk>) -> Vec<DocChunk> {
        let mut out: Vec<DocChunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if let Some(last) = out.last_mut() {
                if last.meta.headings == chunk.meta.headings
                    && last.meta.captions == chunk.meta.captions
                {
                    let merged = self.concat(last, &chunk);
                    if self.fits(&merged) {
                        *last = merged;
                        continue;
                    }
                }
            }
            out.push(chunk);
        }
        out
    }

    fn concat(&self, a: &DocChunk, b: &DocChunk) -> DocChunk {
        let mut meta = a.meta.clone();
        for item in &b.meta.doc_items {
            if !meta.doc_items.contains(item) {
                meta.doc_items.push(item.clone());
            }
        }
        DocChunk::new(format!("{}{}{}", a.text, self.delim, b.text), meta)
    }
}

impl Chunker for HybridChunker {
    fn chunk(&self, doc: &Document) -> Vec<DocChunk> {
        let structural = self.inner.chunk(doc);
        let structural_count = structural.len();

        let mut chunks: Vec<DocChunk> = structural
            .into_iter()
            .flat_map(|c| self.split_by_doc_items(doc, c))
            .flat_map(|c| self.split_by_text(c))
            .filter(|c| !c.text.trim().is_empty())
            .collect();
        if self.merge_peers {
            chunks = self.merge_peers(chunks);
        }

        log::debug!(
            "Hybrid chunking of {}: {} structural chunks -> {} chunks (max {} tokens)",
            doc.name,
            structural_count,
            chunks.len(),
            self.max_tokens()
        );
        chunks
    }

    fn contextualize(&self, chunk: &DocChunk) -> String {
        join_context(chunk, &self.delim)
    }
}

/// Item references of a chunk grouped into units with their text. A caption
/// travels with the table or picture listed before it.
fn item_units(doc: &Document, refs: &[NodeRef]) -> Vec<(Vec<NodeRef>, String)> {
    let mut units: Vec<(Vec<NodeRef>, String)> = Vec::new();
    for r in refs {
        let owned_caption = doc
            .resolve(r)
            .and_then(|node| node.parent().cloned())
            .is_some_and(|parent| units.last().is_some_and(|(last, _)| last[0] == parent));
        if owned_caption {
            if let Some((last, _)) = units.last_mut() {
                last.push(r.clone());
            }
            continue;
        }
        if let Some(text) = item_text(doc, r) {
            units.push((vec![r.clone()], text));
        }
    }
    units
}

/// Recursively split `text` so every piece fits `budget` tokens.
fn split_text(text: &str, budget: usize, level: SplitLevel, tokenizer: &dyn Tokenizer) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if tokenizer.count_tokens(text) <= budget {
        return vec![text.to_string()];
    }

    let pieces = level.pieces(text);
    let Some(next) = level.next() else {
        // characters: take as many graphemes as fit, at least one
        return pack(pieces, budget, level.joiner(), tokenizer);
    };
    if pieces.len() <= 1 {
        return split_text(text, budget, next, tokenizer);
    }

    let mut fitted: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for piece in pieces {
        if tokenizer.count_tokens(piece) <= budget {
            fitted.push(piece);
        } else {
            out.extend(pack(std::mem::take(&mut fitted), budget, level.joiner(), tokenizer));
            out.extend(split_text(piece, budget, next, tokenizer));
        }
    }
    out.extend(pack(fitted, budget, level.joiner(), tokenizer));
    out
}

/// Greedily join consecutive pieces while the result fits.
fn pack(pieces: Vec<&str>, budget: usize, joiner: &str, tokenizer: &dyn Tokenizer) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if current.is_empty() {
            current.push_str(piece);
            continue;
        }
        let candidate = format!("{}{}{}", current, joiner, piece);
        if tokenizer.count_tokens(&candidate) <= budget {
            current = candidate;
        } else {
            out.push(std::mem::replace(&mut current, piece.to_string()));
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out.retain(|s| !s.trim().is_empty());
    out
}
