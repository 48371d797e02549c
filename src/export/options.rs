//! Export options and configuration.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Options for Markdown and plain text export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// Text emitted in place of each picture
    pub image_placeholder: String,

    /// Escape `_` outside of code so identifiers survive rendering
    pub escape_underscores: bool,

    /// Render page headers and footers
    pub include_furniture: bool,

    /// Inserted between items that sit on different pages
    pub page_break_placeholder: Option<String>,

    /// How to render tables with merged cells
    pub table_mode: TableMode,

    /// Spaces per list nesting level
    pub indent: usize,

    /// Pages to include
    pub pages: PageSelection,

    /// Drop all Markdown markup (headings, list markers, fences)
    pub strict_text: bool,
}

impl MarkdownOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the picture placeholder.
    pub fn with_image_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.image_placeholder = placeholder.into();
        self
    }

    /// Enable or disable underscore escaping.
    pub fn with_escape_underscores(mut self, escape: bool) -> Self {
        self.escape_underscores = escape;
        self
    }

    /// Include page headers and footers.
    pub fn with_furniture(mut self, include: bool) -> Self {
        self.include_furniture = include;
        self
    }

    /// Mark page transitions with `placeholder`.
    pub fn with_page_break(mut self, placeholder: impl Into<String>) -> Self {
        self.page_break_placeholder = Some(placeholder.into());
        self
    }

    /// Set the table mode.
    pub fn with_table_mode(mut self, mode: TableMode) -> Self {
        self.table_mode = mode;
        self
    }

    /// Set list indentation width.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Restrict output to selected pages.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Produce plain text instead of Markdown.
    pub fn strict_text(mut self) -> Self {
        self.strict_text = true;
        self.escape_underscores = false;
        self
    }
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            image_placeholder: "<!-- image -->".to_string(),
            escape_underscores: true,
            include_furniture: false,
            page_break_placeholder: None,
            table_mode: TableMode::Markdown,
            indent: 4,
            pages: PageSelection::All,
            strict_text: false,
        }
    }
}

/// How to render tables with merged cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    /// Always use pipe tables; spanned values repeat
    #[default]
    Markdown,
    /// Use HTML tables when any cell spans
    Html,
}

/// Page selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Whether every page is selected.
    pub fn is_all(&self) -> bool {
        matches!(self, PageSelection::All)
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start = parse_page(start)?;
                let end = parse_page(end)?;
                if start > end {
                    return Err(format!("Invalid page range: {}", s));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            match part.split_once('-') {
                Some((start, end)) => pages.extend(parse_page(start)?..=parse_page(end)?),
                None => pages.push(parse_page(part)?),
            }
        }
        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

fn parse_page(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("Invalid page number: {:?}", s.trim())),
        Ok(n) => Ok(n),
    }
}
