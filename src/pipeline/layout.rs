//! Layout analysis over positioned text cells.
//!
//! Cells are grouped into columns, lines and blocks. Font-size statistics
//! collected over the whole document decide which lines are headings; the
//! first words of a block decide list items and captions. All coordinates
//! use a top-left origin, so `y` grows down the page.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::sanitize::{is_cjk, join_lines};
use super::table_structure::{DetectedTable, TableDetector};
use crate::backend::{PageImage, TextCell};
use crate::model::{BoundingBox, Size};

/// Fraction of the page height treated as the header or footer band.
pub const MARGIN_BAND: f32 = 0.08;

static RE_CAPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(figure|fig\.|table|tab\.|chart|exhibit)\s*[0-9IVX]+[a-z]?\b").unwrap()
});

const BULLET_GLYPHS: &[char] = &[
    '•', '·', '○', '▪', '◦', '▸', '▹', '►', '■', '●', '※', '□', '◆', '◇', '▶', '▷', '☞', '➤',
    '➜', '✓', '❖',
];

/// Font statistics for heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common)
    pub body_size: f32,
    /// Font sizes larger than body (potential headings), largest first
    pub heading_sizes: Vec<f32>,
    /// All observed font sizes (x10) with character counts
    pub size_histogram: HashMap<i32, usize>,
}

impl FontStatistics {
    /// Collect statistics over all cells of a document.
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = &'a TextCell>) -> Self {
        let mut stats = Self::default();
        for cell in cells {
            stats.add_size(cell.font_size, cell.text.chars().count().max(1));
        }
        stats.analyze();
        stats
    }

    /// Add a font size observation weighted by character count.
    pub fn add_size(&mut self, size: f32, weight: usize) {
        let key = (size * 10.0) as i32;
        *self.size_histogram.entry(key).or_insert(0) += weight;
    }

    /// Calculate body size and heading sizes.
    pub fn analyze(&mut self) {
        let Some((&body_key, _)) = self
            .size_histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
        else {
            self.body_size = 12.0;
            return;
        };
        self.body_size = body_key as f32 / 10.0;

        let mut larger: Vec<f32> = self
            .size_histogram
            .keys()
            .map(|k| *k as f32 / 10.0)
            .filter(|s| *s > self.body_size + 0.5)
            .collect();
        larger.sort_by(|a, b| b.total_cmp(a));
        self.heading_sizes = larger;
    }

    /// Heading level for a font size (1-6, or 0 for body text).
    pub fn heading_level(&self, font_size: f32) -> u8 {
        if font_size < self.body_size + 1.5 {
            return 0;
        }
        for (i, &size) in self.heading_sizes.iter().enumerate() {
            if font_size >= size - 0.5 {
                return (i + 1).min(6) as u8;
            }
        }
        5
    }

    /// Level given to bold body-size headings: one below the smallest
    /// size-based heading.
    pub fn bold_heading_level(&self) -> u8 {
        (self.heading_sizes.len() + 1).min(6) as u8
    }
}

/// A detected column in the page layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl Column {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A box belongs to a column if its left edge or its center is inside.
    pub fn contains_box(&self, bbox: &BoundingBox) -> bool {
        self.contains(bbox.l) || self.contains((bbox.l + bbox.r) / 2.0)
    }
}

/// Cells on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// Cells sorted by X position
    pub cells: Vec<TextCell>,
    /// Union of the cell boxes
    pub bbox: BoundingBox,
    /// Dominant font size, weighted by text length
    pub font_size: f32,
    /// Heading level (1-6), 0 for body lines
    pub heading_level: u8,
}

impl TextLine {
    /// Create a line from cells. Returns `None` for an empty set.
    pub fn from_cells(mut cells: Vec<TextCell>) -> Option<Self> {
        cells.sort_by(|a, b| a.bbox.l.total_cmp(&b.bbox.l));
        let bbox = cells.iter().map(|c| c.bbox).reduce(|a, b| a.union(&b))?;

        let total: usize = cells.iter().map(|c| c.text.chars().count()).sum();
        let font_size = if total > 0 {
            cells
                .iter()
                .map(|c| c.font_size * c.text.chars().count() as f32)
                .sum::<f32>()
                / total as f32
        } else {
            cells[0].font_size
        };

        Some(Self {
            cells,
            bbox,
            font_size,
            heading_level: 0,
        })
    }

    /// Baseline of the line.
    pub fn y(&self) -> f32 {
        self.bbox.b
    }

    /// Left edge of the line.
    pub fn x(&self) -> f32 {
        self.bbox.l
    }

    /// Whether the line was marked as a heading.
    pub fn is_heading(&self) -> bool {
        self.heading_level > 0
    }

    /// Combined text of the cells.
    ///
    /// A space goes between cells separated by more than a fifth of an
    /// average character width, except between two CJK characters.
    pub fn text(&self) -> String {
        let mut result = String::new();
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                let prev = &self.cells[i - 1];
                let gap = cell.bbox.l - prev.bbox.r;
                let chars = cell.text.chars().count();
                let avg_char_width = if chars > 0 && cell.bbox.width() > 0.0 {
                    cell.bbox.width() / chars as f32
                } else {
                    cell.font_size * 0.5
                };

                let prev_last = prev.text.chars().last();
                let next_first = cell.text.chars().next();
                let both_cjk = prev_last.is_some_and(is_cjk) && next_first.is_some_and(is_cjk);
                let has_space = prev_last.is_some_and(char::is_whitespace)
                    || next_first.is_some_and(char::is_whitespace);

                if gap > avg_char_width * 0.2 && !both_cjk && !has_space {
                    result.push(' ');
                }
            }
            result.push_str(&cell.text);
        }
        result
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold: usize = self
            .cells
            .iter()
            .filter(|c| c.is_bold)
            .map(|c| c.text.chars().count())
            .sum();
        let total: usize = self.cells.iter().map(|c| c.text.chars().count()).sum();
        total > 0 && bold as f32 / total as f32 > 0.5
    }

    /// Check if all letters in the line are uppercase.
    pub fn is_uppercase(&self) -> bool {
        let text = self.text();
        let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
        letters.peek().is_some() && letters.all(|c| c.is_uppercase())
    }
}

/// Page margin band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarginBand {
    /// Top of the page
    Top,
    /// Bottom of the page
    Bottom,
}

/// What a block is.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Document title
    Title,
    /// Section header with level 1-6
    SectionHeader(u8),
    /// List item; `text` holds the content without the marker
    ListItem {
        /// Numbered rather than bulleted
        enumerated: bool,
        /// The marker as printed
        marker: String,
    },
    /// Figure or table caption
    Caption,
    /// Repeated page header
    PageHeader,
    /// Repeated page footer or page number
    PageFooter,
    /// Body text
    Text,
}

/// A text block (paragraph, heading, list item...).
#[derive(Debug, Clone)]
pub struct LayoutBlock {
    /// The lines in this block
    pub lines: Vec<TextLine>,
    /// Union of the line boxes
    pub bbox: BoundingBox,
    /// Classification
    pub kind: BlockKind,
    /// Set when the block lies in the header or footer band
    pub margin: Option<MarginBand>,
    /// Cleaned block text
    pub text: String,
}

impl LayoutBlock {
    fn new(lines: Vec<TextLine>) -> Option<Self> {
        let bbox = lines.iter().map(|l| l.bbox).reduce(|a, b| a.union(&b))?;
        let texts: Vec<String> = lines.iter().map(TextLine::text).collect();
        Some(Self {
            text: join_lines(&texts),
            lines,
            bbox,
            kind: BlockKind::Text,
            margin: None,
        })
    }

    /// Lowest heading level among the block's heading lines.
    pub fn heading_level(&self) -> u8 {
        self.lines
            .iter()
            .filter(|l| l.is_heading())
            .map(|l| l.heading_level)
            .min()
            .unwrap_or(0)
    }

    /// Whether the block becomes furniture.
    pub fn is_furniture(&self) -> bool {
        matches!(self.kind, BlockKind::PageHeader | BlockKind::PageFooter)
    }
}

/// An element of a page in reading order.
#[derive(Debug, Clone)]
pub enum PageElement {
    /// A text block
    Block(LayoutBlock),
    /// A table built from aligned cells
    Table(DetectedTable),
    /// An embedded image
    Picture(PageImage),
}

impl PageElement {
    /// Location on the page.
    pub fn bbox(&self) -> BoundingBox {
        match self {
            Self::Block(b) => b.bbox,
            Self::Table(t) => t.bbox,
            Self::Picture(p) => p.bbox,
        }
    }
}

/// Layout analyzer for a single page.
pub struct LayoutAnalyzer<'a> {
    stats: &'a FontStatistics,
}

impl<'a> LayoutAnalyzer<'a> {
    /// Create an analyzer using document-wide font statistics.
    pub fn new(stats: &'a FontStatistics) -> Self {
        Self { stats }
    }

    /// Lay out a page: columns, tables, lines, blocks, pictures.
    ///
    /// Elements come back in reading order: column by column, top to bottom
    /// inside each column.
    pub fn analyze_page(
        &self,
        cells: Vec<TextCell>,
        images: Vec<PageImage>,
        page_size: Size,
        tables: Option<&TableDetector>,
    ) -> Vec<PageElement> {
        let columns = self.detect_columns(&cells);
        log::trace!("{} columns", columns.len());

        let mut column_cells: Vec<Vec<TextCell>> = vec![Vec::new(); columns.len().max(1)];
        for cell in cells {
            let idx = column_index(&columns, &cell.bbox);
            column_cells[idx].push(cell);
        }
        let mut column_images: Vec<Vec<PageImage>> = vec![Vec::new(); column_cells.len()];
        for image in images {
            let idx = column_index(&columns, &image.bbox);
            column_images[idx].push(image);
        }

        let mut elements = Vec::new();
        for (cells, images) in column_cells.into_iter().zip(column_images) {
            let (found, cells) = match tables {
                Some(detector) => detector.detect(cells),
                None => (Vec::new(), cells),
            };

            let obstacles: Vec<BoundingBox> = found
                .iter()
                .map(|t| t.bbox)
                .chain(images.iter().map(|i| i.bbox))
                .collect();
            let lines = self.detect_headings(self.group_cells_into_lines(cells));
            let mut column: Vec<PageElement> = self
                .group_lines_into_blocks(lines, &obstacles)
                .into_iter()
                .map(|block| PageElement::Block(self.classify(block, page_size)))
                .collect();
            column.extend(found.into_iter().map(PageElement::Table));
            column.extend(images.into_iter().map(PageElement::Picture));
            column.sort_by(|a, b| a.bbox().t.total_cmp(&b.bbox().t));
            elements.extend(column);
        }
        elements
    }

    /// Detect one or two text columns from a vertical gutter.
    pub fn detect_columns(&self, cells: &[TextCell]) -> Vec<Column> {
        let Some(min_x) = cells.iter().map(|c| c.bbox.l).reduce(f32::min) else {
            return vec![];
        };
        let max_x = cells.iter().map(|c| c.bbox.r).fold(min_x, f32::max);
        let single = vec![Column {
            left: min_x - 10.0,
            right: max_x + 10.0,
            index: 0,
        }];

        let width = max_x - min_x;
        if width < 250.0 {
            return single;
        }

        let slice_width = 3.0;
        let num_slices = (width / slice_width) as usize + 1;
        let mut occupancy = vec![0usize; num_slices];
        for cell in cells {
            let start = ((cell.bbox.l - min_x) / slice_width) as usize;
            let end = ((cell.bbox.r - min_x) / slice_width) as usize;
            for slot in occupancy
                .iter_mut()
                .take(end.min(num_slices - 1) + 1)
                .skip(start)
            {
                *slot += 1;
            }
        }

        // a few full-width cells (titles, rules) may cross the gutter
        let allowed = cells.len() / 40;
        let search_start = num_slices * 15 / 100;
        let search_end = num_slices * 85 / 100;
        let center = num_slices as f32 / 2.0;

        let mut best: Option<(usize, usize, f32)> = None;
        let mut gap_start = 0;
        let mut gap_len = 0;
        let consider = |start: usize, len: usize, best: &mut Option<(usize, usize, f32)>| {
            let gap_width = len as f32 * slice_width;
            if gap_width < 10.0 {
                return;
            }
            let dist = ((start as f32 + len as f32 / 2.0) - center).abs();
            let (best_width, best_dist) = best
                .map(|(_, l, d)| (l as f32 * slice_width, d))
                .unwrap_or((0.0, f32::MAX));
            if gap_width > best_width * 1.5 || (gap_width >= best_width * 0.7 && dist < best_dist) {
                *best = Some((start, len, dist));
            }
        };
        for (i, &count) in occupancy
            .iter()
            .enumerate()
            .take(search_end)
            .skip(search_start)
        {
            if count <= allowed {
                if gap_len == 0 {
                    gap_start = i;
                }
                gap_len += 1;
            } else {
                if gap_len > 0 {
                    consider(gap_start, gap_len, &mut best);
                }
                gap_len = 0;
            }
        }
        if gap_len > 0 {
            consider(gap_start, gap_len, &mut best);
        }

        let Some((start, len, _)) = best else {
            return single;
        };
        if (len as f32 * slice_width) < 12.0 {
            return single;
        }
        let gutter = min_x + (start as f32 + len as f32 / 2.0) * slice_width;
        if gutter - min_x < 80.0 || max_x - gutter < 80.0 {
            return single;
        }

        let left = cells
            .iter()
            .filter(|c| (c.bbox.l + c.bbox.r) / 2.0 < gutter)
            .count();
        let right = cells.len() - left;
        let min_cells = (cells.len() / 10).max(2);
        if left < min_cells || right < min_cells {
            return single;
        }

        log::debug!("two columns, gutter at x={:.1}", gutter);
        vec![
            Column {
                left: min_x - 10.0,
                right: gutter,
                index: 0,
            },
            Column {
                left: gutter,
                right: max_x + 10.0,
                index: 1,
            },
        ]
    }

    /// Group cells of one column into lines by baseline, top to bottom.
    pub fn group_cells_into_lines(&self, mut cells: Vec<TextCell>) -> Vec<TextLine> {
        cells.sort_by(|a, b| {
            a.bbox
                .b
                .total_cmp(&b.bbox.b)
                .then(a.bbox.l.total_cmp(&b.bbox.l))
        });

        let mut lines = Vec::new();
        let mut current: Vec<TextCell> = Vec::new();
        let mut current_y: Option<f32> = None;

        for cell in cells {
            let tolerance = cell.font_size * 0.3;
            match current_y {
                Some(y) if (cell.bbox.b - y).abs() <= tolerance => current.push(cell),
                _ => {
                    lines.extend(TextLine::from_cells(std::mem::take(&mut current)));
                    current_y = Some(cell.bbox.b);
                    current.push(cell);
                }
            }
        }
        lines.extend(TextLine::from_cells(current));
        lines
    }

    /// Mark heading lines from the font statistics.
    pub fn detect_headings(&self, mut lines: Vec<TextLine>) -> Vec<TextLine> {
        for line in &mut lines {
            line.heading_level = self.stats.heading_level(line.font_size);
        }
        lines
    }

    /// Group lines into blocks based on spacing, font size and indentation.
    ///
    /// A block never continues across an obstacle (table or picture) lying
    /// between two of its lines.
    pub fn group_lines_into_blocks(
        &self,
        lines: Vec<TextLine>,
        obstacles: &[BoundingBox],
    ) -> Vec<LayoutBlock> {
        let spacing = typical_line_spacing(&lines);
        let mut blocks = Vec::new();
        let mut current: Vec<TextLine> = Vec::new();

        for line in lines {
            let brk = current
                .last()
                .is_some_and(|prev| {
                    should_break_block(prev, &line, spacing)
                        || obstacles.iter().any(|o| {
                            let mid = (o.t + o.b) / 2.0;
                            mid > prev.y() && mid < line.y()
                        })
                });
            if brk {
                blocks.extend(LayoutBlock::new(std::mem::take(&mut current)));
            }
            current.push(line);
        }
        blocks.extend(LayoutBlock::new(current));
        blocks
    }

    /// Classify a block.
    pub fn classify(&self, mut block: LayoutBlock, page_size: Size) -> LayoutBlock {
        let band = page_size.height * MARGIN_BAND;
        if block.bbox.b <= band {
            block.margin = Some(MarginBand::Top);
        } else if block.bbox.t >= page_size.height - band {
            block.margin = Some(MarginBand::Bottom);
        }

        let level = block.heading_level();
        block.kind = if is_caption(&block.text) {
            BlockKind::Caption
        } else if level > 0 {
            BlockKind::SectionHeader(level)
        } else if let Some((marker, rest, enumerated)) = split_list_marker(&block.text) {
            let (marker, rest) = (marker.to_string(), rest.to_string());
            block.text = rest;
            BlockKind::ListItem { enumerated, marker }
        } else if self.is_bold_heading(&block) {
            BlockKind::SectionHeader(self.stats.bold_heading_level())
        } else {
            BlockKind::Text
        };
        block
    }

    fn is_bold_heading(&self, block: &LayoutBlock) -> bool {
        let [line] = block.lines.as_slice() else {
            return false;
        };
        let text = block.text.trim();
        line.is_bold()
            && text.chars().count() <= 80
            && text.chars().any(char::is_alphabetic)
            && !text.ends_with(['.', ',', ';', ':'])
    }
}

fn column_index(columns: &[Column], bbox: &BoundingBox) -> usize {
    columns
        .iter()
        .position(|c| c.contains_box(bbox))
        .unwrap_or(0)
}

/// Median baseline distance between consecutive lines.
fn typical_line_spacing(lines: &[TextLine]) -> f32 {
    let mut spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[1].y() - w[0].y()).abs())
        .filter(|s| *s > 0.1)
        .collect();
    if spacings.is_empty() {
        return 12.0;
    }
    spacings.sort_by(f32::total_cmp);
    spacings[spacings.len() / 2]
}

fn should_break_block(prev: &TextLine, curr: &TextLine, avg_spacing: f32) -> bool {
    let spacing = (curr.y() - prev.y()).abs();

    if prev.is_heading() || curr.is_heading() {
        // wrapped heading lines stay together
        return !(prev.heading_level == curr.heading_level && spacing <= avg_spacing * 1.5);
    }
    if spacing > avg_spacing * 1.5 {
        return true;
    }
    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }
    if (prev.x() - curr.x()).abs() > 20.0 {
        return true;
    }
    let text = curr.text();
    split_list_marker(&text).is_some() || is_caption(&text)
}

/// Whether a block starts like a figure or table caption.
pub fn is_caption(text: &str) -> bool {
    RE_CAPTION.is_match(text.trim_start())
}

/// Check if text is a bullet marker (•, -, etc.).
pub(crate) fn is_bullet_marker(text: &str) -> bool {
    let trimmed = text.trim();
    matches!(trimmed, "-" | "–" | "—" | "*")
        || (trimmed.chars().count() == 1 && trimmed.starts_with(BULLET_GLYPHS))
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
pub(crate) fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }
    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let mut chars = cleaned.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.' | ')'), None) if c.is_alphabetic()
    )
}

/// Split a leading list marker off `text`.
///
/// Returns `(marker, rest, enumerated)`. Bare numbers are not markers here
/// since body text often starts with one.
pub fn split_list_marker(text: &str) -> Option<(&str, &str, bool)> {
    let trimmed = text.trim_start();
    let (token, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (trimmed, ""),
    };

    if !rest.is_empty() {
        if is_bullet_marker(token) {
            return Some((token, rest, false));
        }
        let numbered = token.ends_with(['.', ')'])
            && token.chars().count() <= 4
            && is_number_marker(token);
        let parenthesized = token.starts_with('(')
            && token.ends_with(')')
            && token.len() > 2
            && token[1..token.len() - 1].chars().all(|c| c.is_ascii_digit());
        if numbered || parenthesized {
            return Some((token, rest, true));
        }
    }

    // bullet glyph glued to the text ("•Item")
    let first = trimmed.chars().next()?;
    if BULLET_GLYPHS.contains(&first) {
        let rest = trimmed[first.len_utf8()..].trim_start();
        if !rest.is_empty() {
            return Some((&trimmed[..first.len_utf8()], rest, false));
        }
    }
    None
}
