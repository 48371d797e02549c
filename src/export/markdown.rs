//! Markdown export.

use std::collections::{BTreeSet, HashSet};

use crate::model::{
    DocItemLabel, Document, GroupItem, GroupLabel, NodeItem, NodeRef, PictureItem, TableData, TableItem,
    TextItem,
};

use super::{ExportResult, ExportStats, MarkdownOptions, TableMode};

/// Export a document to Markdown.
pub fn export_to_markdown(doc: &Document, options: &MarkdownOptions) -> String {
    MarkdownSerializer::new(doc, options.clone())
        .serialize()
        .content
}

/// Export a document to Markdown with statistics.
pub fn export_to_markdown_with_stats(doc: &Document, options: &MarkdownOptions) -> ExportResult {
    MarkdownSerializer::new(doc, options.clone()).serialize()
}

/// Walks the document tree and renders one block per item.
///
/// Lists are rendered as a single block, so items stay on consecutive
/// lines. Captions are rendered with their table or picture and skipped
/// when met again as children.
pub struct MarkdownSerializer<'a> {
    doc: &'a Document,
    options: MarkdownOptions,
    stats: ExportStats,
    blocks: Vec<String>,
    consumed: HashSet<&'a NodeRef>,
    last_page: Option<u32>,
    pages_seen: BTreeSet<u32>,
}

impl<'a> MarkdownSerializer<'a> {
    /// Create a new serializer.
    pub fn new(doc: &'a Document, options: MarkdownOptions) -> Self {
        Self {
            doc,
            options,
            stats: ExportStats::new(),
            blocks: Vec::new(),
            consumed: HashSet::new(),
            last_page: None,
            pages_seen: BTreeSet::new(),
        }
    }

    /// Render the document.
    pub fn serialize(mut self) -> ExportResult {
        let doc = self.doc;
        if self.options.include_furniture {
            self.visit_children(&doc.furniture.children, 0);
        }
        self.visit_children(&doc.body.children, 0);

        let content = self.blocks.join("\n\n");
        self.stats.count_text(&content);
        self.stats.page_count = self.pages_seen.len() as u32;
        ExportResult {
            content,
            stats: self.stats,
        }
    }

    fn visit_children(&mut self, children: &'a [NodeRef], depth: usize) {
        let doc = self.doc;
        for child_ref in children {
            match doc.resolve(child_ref) {
                Some(child) => self.visit(child, depth),
                None => log::warn!("Dangling reference {} skipped", child_ref),
            }
        }
    }

    fn visit(&mut self, node: NodeItem<'a>, depth: usize) {
        if self.consumed.contains(node.self_ref()) || !self.selected(&node) {
            return;
        }
        match node {
            NodeItem::Group(group) if group.label.is_list() => {
                let mut lines = Vec::new();
                self.list_lines(group, depth, &mut lines);
                if !lines.is_empty() {
                    self.push_block(lines.join("\n"));
                }
            }
            NodeItem::Group(group) => self.visit_children(&group.children, depth),
            NodeItem::Text(text) => {
                self.mark_page(&node);
                if let Some(block) = self.text_block(text) {
                    self.push_block(block);
                }
                self.visit_children(&text.children, depth);
            }
            NodeItem::Table(table) => {
                self.mark_page(&node);
                self.table_blocks(table);
            }
            NodeItem::Picture(picture) => {
                self.mark_page(&node);
                self.picture_blocks(picture);
            }
        }
    }

    fn selected(&self, node: &NodeItem<'_>) -> bool {
        let prov = node.prov();
        self.options.pages.is_all()
            || prov.is_empty()
            || prov.iter().any(|p| self.options.pages.includes(p.page_no))
    }

    /// Track pages and emit the page break placeholder on page transitions.
    fn mark_page(&mut self, node: &NodeItem<'_>) {
        let Some(page) = node.prov().first().map(|p| p.page_no) else {
            return;
        };
        self.pages_seen.insert(page);
        if let (Some(last), Some(placeholder)) =
            (self.last_page, self.options.page_break_placeholder.clone())
        {
            if last != page {
                self.blocks.push(placeholder);
            }
        }
        self.last_page = Some(page);
    }

    fn push_block(&mut self, block: String) {
        if !block.trim().is_empty() {
            self.blocks.push(block);
        }
    }

    fn list_lines(&mut self, group: &'a GroupItem, depth: usize, lines: &mut Vec<String>) {
        let doc = self.doc;
        let indent = " ".repeat(self.options.indent * depth);
        let mut counter = 0;
        for child_ref in &group.children {
            let Some(child) = doc.resolve(child_ref) else {
                continue;
            };
            if !self.selected(&child) {
                continue;
            }
            match child {
                NodeItem::Text(item) if item.label == DocItemLabel::ListItem => {
                    counter += 1;
                    self.mark_page(&child);
                    self.stats.list_item_count += 1;
                    let marker = if self.options.strict_text {
                        String::new()
                    } else if group.label == GroupLabel::OrderedList
                        || item.enumerated == Some(true)
                    {
                        format!("{}. ", counter)
                    } else {
                        "- ".to_string()
                    };
                    lines.push(format!("{}{}{}", indent, marker, self.escape(&item.text)));
                    self.list_item_children(item, depth, lines);
                }
                NodeItem::Group(sub) if sub.label.is_list() => {
                    self.list_lines(sub, depth + 1, lines)
                }
                NodeItem::Text(item) => {
                    self.mark_page(&child);
                    if let Some(block) = self.text_block(item) {
                        lines.push(format!("{}{}", indent, block));
                    }
                }
                other => {
                    // Tables or pictures inside a list end the list block.
                    if !lines.is_empty() {
                        self.push_block(std::mem::take(lines).join("\n"));
                    }
                    self.visit(other, depth);
                }
            }
        }
    }

    fn list_item_children(&mut self, item: &'a TextItem, depth: usize, lines: &mut Vec<String>) {
        let doc = self.doc;
        for sub_ref in &item.children {
            match doc.resolve(sub_ref) {
                Some(NodeItem::Group(sub)) if sub.label.is_list() => {
                    self.list_lines(sub, depth + 1, lines)
                }
                Some(NodeItem::Text(sub)) => {
                    if let Some(block) = self.text_block(sub) {
                        let indent = " ".repeat(self.options.indent * (depth + 1));
                        lines.push(format!("{}{}", indent, block));
                    }
                }
                _ => {}
            }
        }
    }

    fn text_block(&mut self, item: &TextItem) -> Option<String> {
        let text = item.text.trim();
        if text.is_empty() {
            return None;
        }
        let strict = self.options.strict_text;
        let block = match item.label {
            DocItemLabel::Title => {
                self.stats.heading_count += 1;
                if strict {
                    text.to_string()
                } else {
                    format!("# {}", self.escape(text))
                }
            }
            DocItemLabel::SectionHeader => {
                self.stats.heading_count += 1;
                if strict {
                    text.to_string()
                } else {
                    let level = item.level.unwrap_or(1) as usize;
                    format!("{} {}", "#".repeat((level + 1).min(6)), self.escape(text))
                }
            }
            DocItemLabel::Code => {
                self.stats.code_count += 1;
                if strict {
                    item.text.clone()
                } else {
                    format!(
                        "```{}\n{}\n```",
                        item.code_language.as_deref().unwrap_or_default(),
                        item.text.trim_end()
                    )
                }
            }
            DocItemLabel::Formula => {
                if strict {
                    text.to_string()
                } else {
                    format!("$${}$$", text)
                }
            }
            DocItemLabel::CheckboxSelected if !strict => format!("- [x] {}", self.escape(text)),
            DocItemLabel::CheckboxUnselected if !strict => format!("- [ ] {}", self.escape(text)),
            DocItemLabel::ListItem => {
                // A list item outside of any list group.
                self.stats.list_item_count += 1;
                if strict {
                    text.to_string()
                } else {
                    format!("- {}", self.escape(text))
                }
            }
            _ => {
                self.stats.paragraph_count += 1;
                self.escape(text)
            }
        };
        Some(block)
    }

    fn caption_block(&mut self, captions: &'a [NodeRef]) -> Option<String> {
        let doc = self.doc;
        let mut texts = Vec::new();
        for cap_ref in captions {
            self.consumed.insert(cap_ref);
            if let Some(text) = doc.resolve(cap_ref).and_then(|n| n.text()) {
                if !text.trim().is_empty() {
                    texts.push(self.escape(text.trim()));
                }
            }
        }
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(" "))
        }
    }

    fn table_blocks(&mut self, table: &'a TableItem) {
        self.stats.table_count += 1;
        if let Some(caption) = self.caption_block(&table.captions) {
            self.push_block(caption);
        }
        let rendered = if self.options.strict_text {
            table.data.plain_text()
        } else if self.options.table_mode == TableMode::Html && table.data.has_merged_cells() {
            table_html(&table.data)
        } else {
            table_markdown(&table.data, self.options.escape_underscores)
        };
        self.push_block(rendered);
    }

    fn picture_blocks(&mut self, picture: &'a PictureItem) {
        self.stats.picture_count += 1;
        if let Some(caption) = self.caption_block(&picture.captions) {
            self.push_block(caption);
        }
        if !self.options.strict_text {
            self.push_block(self.options.image_placeholder.clone());
        }
    }

    fn escape(&self, text: &str) -> String {
        if self.options.escape_underscores {
            escape_underscores(text)
        } else {
            text.to_string()
        }
    }
}

/// Escape underscores, leaving inline code spans untouched.
pub(crate) fn escape_underscores(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_code = false;
    let mut prev = '\0';
    for c in text.chars() {
        match c {
            '`' => in_code = !in_code,
            '_' if !in_code && prev != '\\' => result.push('\\'),
            _ => {}
        }
        result.push(c);
        prev = c;
    }
    result
}

fn cell_text(text: &str, escape: bool) -> String {
    let text = text.replace(['\n', '\r'], " ").replace('|', "\\|");
    let text = text.trim();
    if escape {
        escape_underscores(text)
    } else {
        text.to_string()
    }
}

/// Render a table grid as a pipe table. The first row is the header.
pub fn table_markdown(data: &TableData, escape: bool) -> String {
    let grid = data.grid();
    if grid.is_empty() || data.num_cols == 0 {
        return String::new();
    }

    let rows: Vec<Vec<String>> = grid
        .iter()
        .map(|row| row.iter().map(|c| cell_text(&c.text, escape)).collect())
        .collect();

    let mut widths = vec![3usize; data.num_cols];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render_row = |row: &[String]| -> String {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| {
                let pad = w - cell.chars().count();
                format!(" {}{} ", cell, " ".repeat(pad))
            })
            .collect();
        format!("|{}|", cells.join("|"))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    let separator: Vec<String> = widths.iter().map(|&w| "-".repeat(w + 2)).collect();
    lines.push(format!("|{}|", separator.join("|")));
    for row in &rows[1..] {
        lines.push(render_row(row));
    }
    lines.join("\n")
}

/// Render a table with `rowspan`/`colspan` preserved.
pub fn table_html(data: &TableData) -> String {
    let mut output = String::from("<table>\n");
    for r in 0..data.num_rows {
        output.push_str("<tr>");
        let mut cells: Vec<_> = data
            .table_cells
            .iter()
            .filter(|c| c.start_row_offset_idx == r)
            .collect();
        cells.sort_by_key(|c| c.start_col_offset_idx);
        for cell in cells {
            let tag = if cell.column_header { "th" } else { "td" };
            let mut attrs = String::new();
            if cell.row_span > 1 {
                attrs.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
            }
            if cell.col_span > 1 {
                attrs.push_str(&format!(" colspan=\"{}\"", cell.col_span));
            }
            output.push_str(&format!(
                "<{}{}>{}</{}>",
                tag,
                attrs,
                escape_html(&cell.text),
                tag
            ));
        }
        output.push_str("</tr>\n");
    }
    output.push_str("</table>");
    output
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::PageSelection;
    use crate::model::{BoundingBox, ProvenanceItem, TableCell};

    fn prov(page: u32) -> Option<ProvenanceItem> {
        Some(ProvenanceItem::new(page, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1))
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let mut doc = Document::new("d");
        doc.add_title("Annual Report", None, None);
        doc.add_heading("Revenue", 1, None, None);
        doc.add_heading("By region", 2, None, None);
        doc.add_text(DocItemLabel::Text, "Numbers went up.", None, None);

        let md = export_to_markdown(&doc, &MarkdownOptions::default());
        assert_eq!(
            md,
            "# Annual Report\n\n## Revenue\n\n### By region\n\nNumbers went up."
        );
    }

    #[test]
    fn test_nested_lists() {
        let mut doc = Document::new("d");
        let list = doc.add_list_group(false, None);
        let first = doc.add_list_item("first", false, None, None, Some(&list));
        let nested = doc.add_list_group(true, Some(&first));
        doc.add_list_item("inner a", true, None, None, Some(&nested));
        doc.add_list_item("inner b", true, None, None, Some(&nested));
        doc.add_list_item("second", false, None, None, Some(&list));

        let md = export_to_markdown(&doc, &MarkdownOptions::default());
        assert_eq!(md, "- first\n    1. inner a\n    2. inner b\n- second");
    }

    #[test]
    fn test_table_with_caption() {
        let mut doc = Document::new("d");
        let rows = vec![vec!["Name", "Qty"], vec!["apple_pie", "3"]];
        let table = doc.add_table(TableData::from_rows(&rows, 1), None, None);
        doc.add_caption(&table, "Table 1: Stock", None).unwrap();

        let md = export_to_markdown(&doc, &MarkdownOptions::default());
        let expected = "Table 1: Stock\n\n\
                        | Name       | Qty |\n\
                        |------------|-----|\n\
                        | apple\\_pie | 3   |";
        assert_eq!(md, expected);
    }

    #[test]
    fn test_picture_placeholder_and_caption_once() {
        let mut doc = Document::new("d");
        let pic = doc.add_picture(None, None, None);
        doc.add_caption(&pic, "Figure 2: Layout", None).unwrap();
        let result = export_to_markdown_with_stats(&doc, &MarkdownOptions::default());
        assert_eq!(result.content, "Figure 2: Layout\n\n<!-- image -->");
        assert_eq!(result.content.matches("Figure 2").count(), 1);
        assert_eq!(result.stats.picture_count, 1);
    }

    #[test]
    fn test_code_and_formula_not_escaped() {
        let mut doc = Document::new("d");
        doc.add_code("let snake_case = 1;", Some("rust".into()), None, None);
        doc.add_formula("a_1 + b_2", None, None);
        let md = export_to_markdown(&doc, &MarkdownOptions::default());
        assert_eq!(md, "```rust\nlet snake_case = 1;\n```\n\n$$a_1 + b_2$$");
    }

    #[test]
    fn test_furniture_and_page_breaks() {
        let mut doc = Document::new("d");
        doc.add_text(DocItemLabel::PageHeader, "Header", prov(1), None);
        doc.add_text(DocItemLabel::Text, "one", prov(1), None);
        doc.add_text(DocItemLabel::Text, "two", prov(2), None);

        let md = export_to_markdown(&doc, &MarkdownOptions::default());
        assert_eq!(md, "one\n\ntwo");

        let options = MarkdownOptions::default()
            .with_furniture(true)
            .with_page_break("<!-- page break -->");
        let md = export_to_markdown(&doc, &options);
        assert_eq!(md, "Header\n\none\n\n<!-- page break -->\n\ntwo");
    }

    #[test]
    fn test_page_selection() {
        let mut doc = Document::new("d");
        doc.add_text(DocItemLabel::Text, "one", prov(1), None);
        doc.add_text(DocItemLabel::Text, "two", prov(2), None);
        let options = MarkdownOptions::default().with_pages(PageSelection::Pages(vec![2]));
        let result = export_to_markdown_with_stats(&doc, &options);
        assert_eq!(result.content, "two");
        assert_eq!(result.stats.page_count, 1);
    }

    #[test]
    fn test_html_table_mode() {
        let mut data = TableData::new(2, 2);
        data.add_cell(TableCell::new("Merged", 0, 0).with_span(1, 2).column_header());
        data.add_cell(TableCell::new("a<b", 1, 0));
        data.add_cell(TableCell::new("c", 1, 1));
        let html = table_html(&data);
        assert!(html.contains("<th colspan=\"2\">Merged</th>"));
        assert!(html.contains("<td>a&lt;b</td><td>c</td>"));

        let md = table_markdown(&data, false);
        assert!(md.starts_with("| Merged | Merged |"));
    }

    #[test]
    fn test_strict_text() {
        let mut doc = Document::new("d");
        doc.add_title("Title_1", None, None);
        let list = doc.add_list_group(false, None);
        doc.add_list_item("item", false, None, None, Some(&list));
        let md = export_to_markdown(&doc, &MarkdownOptions::default().strict_text());
        assert_eq!(md, "Title_1\n\nitem");
    }

    #[test]
    fn test_escape_underscores() {
        assert_eq!(escape_underscores("a_b"), "a\\_b");
        assert_eq!(escape_underscores("`a_b` c_d"), "`a_b` c\\_d");
        assert_eq!(escape_underscores("already\\_done"), "already\\_done");
    }
}
