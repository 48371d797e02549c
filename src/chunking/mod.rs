//! Splitting documents into retrieval chunks.
//!
//! [`HierarchicalChunker`] yields one chunk per structural element, carrying
//! the section headings above it. [`HybridChunker`] refines those chunks to
//! fit a token budget: oversized chunks are split, undersized neighbours
//! under the same headings are merged.
//!
//! ```no_run
//! use std::sync::Arc;
//! use docmill::chunking::{Chunker, HybridChunker, WordTokenizer};
//!
//! let doc = docmill::convert_file("paper.pdf")?;
//! let chunker = HybridChunker::new(Arc::new(WordTokenizer::new(64)));
//! for chunk in chunker.chunk(&doc) {
//!     println!("{}", chunker.contextualize(&chunk));
//! }
//! # Ok::<(), docmill::Error>(())
//! ```

mod hierarchical;
mod hybrid;
mod tokenizer;

pub use hierarchical::HierarchicalChunker;
pub use hybrid::HybridChunker;
pub use tokenizer::{
    cached_tokenizer_path, default_cache_dir, HuggingFaceTokenizer, Tokenizer, WordTokenizer,
    CACHE_DIR_ENV, DEFAULT_MODEL_ID,
};

use serde::{Deserialize, Serialize};

use crate::export::table_markdown;
use crate::model::{Document, DocumentOrigin, NodeItem, NodeRef};

/// Chunk metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Items whose content the chunk holds
    pub doc_items: Vec<NodeRef>,
    /// Enclosing headings, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
    /// Captions of the table the chunk holds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captions: Vec<String>,
    /// Source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<DocumentOrigin>,
}

/// A piece of document text with its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocChunk {
    pub text: String,
    pub meta: DocMeta,
}

impl DocChunk {
    /// Chunk with text and metadata.
    pub fn new(text: impl Into<String>, meta: DocMeta) -> Self {
        Self {
            text: text.into(),
            meta,
        }
    }
}

/// Turns a document into chunks.
pub trait Chunker {
    /// Chunks in document order.
    fn chunk(&self, doc: &Document) -> Vec<DocChunk>;

    /// Text to embed: headings, captions and text on separate lines.
    fn contextualize(&self, chunk: &DocChunk) -> String {
        join_context(chunk, "\n")
    }
}

pub(crate) fn join_context(chunk: &DocChunk, delim: &str) -> String {
    let mut parts = Vec::with_capacity(3);
    if !chunk.meta.headings.is_empty() {
        parts.push(chunk.meta.headings.join(delim));
    }
    if !chunk.meta.captions.is_empty() {
        parts.push(chunk.meta.captions.join(delim));
    }
    parts.push(chunk.text.clone());
    parts.join(delim)
}

/// Chunk text contributed by a single item.
pub(crate) fn item_text(doc: &Document, r: &NodeRef) -> Option<String> {
    match doc.resolve(r)? {
        NodeItem::Text(t) => Some(t.text.clone()),
        NodeItem::Table(t) => Some(table_markdown(&t.data, false)),
        NodeItem::Picture(p) => {
            let captions: Vec<&str> = doc.texts_of(&p.captions).collect();
            Some(captions.join("\n"))
        }
        NodeItem::Group(_) => None,
    }
    .filter(|text| !text.trim().is_empty())
}
