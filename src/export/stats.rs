//! Export result with statistics.

use serde::{Deserialize, Serialize};

/// Rendered content together with what went into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    /// The rendered content (Markdown or text)
    pub content: String,

    /// Statistics
    pub stats: ExportStats,
}

/// Statistics collected while exporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    /// Pages that contributed at least one item
    pub page_count: u32,

    /// Paragraph-like text items
    pub paragraph_count: u32,

    /// Titles and section headers
    pub heading_count: u32,

    /// Tables
    pub table_count: u32,

    /// Pictures
    pub picture_count: u32,

    /// List items
    pub list_item_count: u32,

    /// Code blocks
    pub code_count: u32,

    /// Whitespace-separated words in the output
    pub word_count: u32,

    /// Non-whitespace characters in the output
    pub char_count: u32,
}

impl ExportStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExportStats) {
        self.page_count += other.page_count;
        self.paragraph_count += other.paragraph_count;
        self.heading_count += other.heading_count;
        self.table_count += other.table_count;
        self.picture_count += other.picture_count;
        self.list_item_count += other.list_item_count;
        self.code_count += other.code_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
    }
}
