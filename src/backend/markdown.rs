//! Markdown reader built on `pulldown-cmark` events.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::{collapse_whitespace, DeclarativeBackend, InputDocument};
use crate::detect::InputFormat;
use crate::error::Result;
use crate::model::{DocItemLabel, Document, ImageRef, NodeRef, TableData};

/// Markdown backend.
#[derive(Debug, Default)]
pub struct MarkdownBackend;

impl MarkdownBackend {
    /// Create a new Markdown backend.
    pub fn new() -> Self {
        Self
    }
}

impl DeclarativeBackend for MarkdownBackend {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn supported_formats(&self) -> &[InputFormat] {
        &[InputFormat::Md]
    }

    fn convert(&self, input: &InputDocument) -> Result<Document> {
        let text = input.text();
        let mut builder = MdBuilder::new(input.new_document());
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        for event in Parser::new_ext(&text, options) {
            builder.event(event);
        }
        Ok(builder.finish())
    }
}

struct ListCtx {
    group: NodeRef,
    ordered: bool,
    next_number: u64,
}

#[derive(Default)]
struct ItemCtx {
    /// The list item, once its own text has been written
    node: Option<NodeRef>,
    checked: Option<bool>,
}

#[derive(Default)]
struct TableCtx {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    header_rows: usize,
    in_cell: bool,
}

struct ImageCtx {
    url: String,
    alt: String,
}

struct MdBuilder {
    doc: Document,
    buf: String,
    heading: Option<u8>,
    lists: Vec<ListCtx>,
    items: Vec<ItemCtx>,
    code: Option<(Option<String>, String)>,
    table: Option<TableCtx>,
    image: Option<ImageCtx>,
    html: String,
    title_seen: bool,
}

impl MdBuilder {
    fn new(doc: Document) -> Self {
        Self {
            doc,
            buf: String::new(),
            heading: None,
            lists: Vec::new(),
            items: Vec::new(),
            code: None,
            table: None,
            image: None,
            html: String::new(),
            title_seen: false,
        }
    }

    /// Parent for new blocks: the innermost list item if any, else the body.
    fn parent(&self) -> Option<NodeRef> {
        self.items.iter().rev().find_map(|i| i.node.clone())
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.text(&format!("`{}`", code)),
            Event::SoftBreak | Event::HardBreak => self.text(" "),
            Event::TaskListMarker(checked) => {
                if let Some(item) = self.items.last_mut() {
                    item.checked = Some(checked);
                }
            }
            Event::Html(html) => self.html.push_str(&html),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, code)) = self.code.as_mut() {
            code.push_str(text);
        } else if let Some(image) = self.image.as_mut() {
            image.alt.push_str(text);
        } else if let Some(table) = self.table.as_mut() {
            if table.in_cell {
                table.cell.push_str(text);
            }
        } else {
            self.buf.push_str(text);
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_paragraph();
                self.heading = Some(heading_level(level));
            }
            Tag::List(start) => {
                self.flush_item_text();
                let ordered = start.is_some();
                let parent = self.parent();
                let group = self.doc.add_list_group(ordered, parent.as_ref());
                self.lists.push(ListCtx {
                    group,
                    ordered,
                    next_number: start.unwrap_or(1),
                });
            }
            Tag::Item => self.items.push(ItemCtx::default()),
            Tag::CodeBlock(kind) => {
                self.flush_item_text();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|s| s.to_string()),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((lang, String::new()));
            }
            Tag::Table(_) => {
                self.flush_paragraph();
                self.table = Some(TableCtx::default());
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header_rows = 1;
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.in_cell = true;
                    table.cell.clear();
                }
            }
            Tag::Image { dest_url, .. } => {
                self.image = Some(ImageCtx {
                    url: dest_url.to_string(),
                    alt: String::new(),
                });
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                let text = collapse_whitespace(&std::mem::take(&mut self.buf));
                let level = self.heading.take().unwrap_or(1);
                if text.is_empty() {
                    return;
                }
                if level == 1 && !self.title_seen {
                    self.title_seen = true;
                    self.doc.add_title(text, None, None);
                } else {
                    self.doc.add_heading(text, level, None, None);
                }
            }
            TagEnd::Paragraph => {
                // Paragraphs inside an item extend the item's text.
                if self.items.last().is_some_and(|i| i.node.is_none()) {
                    self.buf.push(' ');
                } else {
                    self.flush_paragraph();
                }
            }
            TagEnd::Item => {
                self.flush_item_text();
                self.items.pop();
            }
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::CodeBlock => {
                if let Some((lang, code)) = self.code.take() {
                    let code = code.trim_end_matches('\n').to_string();
                    let parent = self.parent();
                    self.doc.add_code(code, lang, None, parent.as_ref());
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.in_cell = false;
                    let cell = collapse_whitespace(&table.cell);
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let data = TableData::from_rows(&table.rows, table.header_rows);
                    let parent = self.parent();
                    self.doc.add_table(data, None, parent.as_ref());
                }
            }
            TagEnd::Image => {
                if let Some(image) = self.image.take() {
                    self.flush_paragraph();
                    let parent = self.parent();
                    let pic = self.doc.add_picture(
                        Some(ImageRef::from_uri(image.url)),
                        None,
                        parent.as_ref(),
                    );
                    let alt = collapse_whitespace(&image.alt);
                    if !alt.is_empty() {
                        // Captions only fail for non-owner refs; `pic` is a picture.
                        let _ = self.doc.add_caption(&pic, alt, None);
                    }
                }
            }
            TagEnd::HtmlBlock => {
                let html = std::mem::take(&mut self.html);
                let text = collapse_whitespace(&strip_tags(&html));
                if !text.is_empty() {
                    let parent = self.parent();
                    self.doc.add_text(DocItemLabel::Text, text, None, parent.as_ref());
                }
            }
            _ => {}
        }
    }

    fn flush_paragraph(&mut self) {
        let text = collapse_whitespace(&std::mem::take(&mut self.buf));
        if text.is_empty() {
            return;
        }
        let parent = self.parent();
        self.doc.add_text(DocItemLabel::Text, text, None, parent.as_ref());
    }

    /// Write the innermost item's own text, once.
    fn flush_item_text(&mut self) {
        let Some(item) = self.items.last() else {
            self.flush_paragraph();
            return;
        };
        if item.node.is_some() {
            self.flush_paragraph();
            return;
        }
        let text = collapse_whitespace(&std::mem::take(&mut self.buf));
        let checked = item.checked;
        let Some(list) = self.lists.last_mut() else {
            return;
        };
        let group = list.group.clone();
        let node = match checked {
            Some(true) => self
                .doc
                .add_text(DocItemLabel::CheckboxSelected, text, None, Some(&group)),
            Some(false) => self
                .doc
                .add_text(DocItemLabel::CheckboxUnselected, text, None, Some(&group)),
            None => {
                let marker = if list.ordered {
                    let m = format!("{}.", list.next_number);
                    list.next_number += 1;
                    m
                } else {
                    "-".to_string()
                };
                let ordered = list.ordered;
                self.doc
                    .add_list_item(text, ordered, Some(marker), None, Some(&group))
            }
        };
        if let Some(item) = self.items.last_mut() {
            item.node = Some(node);
        }
    }

    fn finish(mut self) -> Document {
        self.flush_paragraph();
        self.doc
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Drop tags from raw HTML, keeping text content.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GroupLabel, IterOptions, NodeItem};

    fn convert(md: &str) -> Document {
        let input = InputDocument::new("test.md", InputFormat::Md, md.as_bytes().to_vec());
        MarkdownBackend::new().convert(&input).unwrap()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let doc = convert("# Title\n\nIntro text\nwraps here.\n\n## Section\n\n# Another top\n");
        let labels: Vec<_> = doc.texts.iter().map(|t| (t.label, t.level)).collect();
        assert_eq!(
            labels,
            vec![
                (DocItemLabel::Title, None),
                (DocItemLabel::Text, None),
                (DocItemLabel::SectionHeader, Some(2)),
                (DocItemLabel::SectionHeader, Some(1)),
            ]
        );
        assert_eq!(doc.texts[1].text, "Intro text wraps here.");
        assert_eq!(doc.name, "test");
    }

    #[test]
    fn test_nested_lists() {
        let doc = convert("1. one\n2. two\n   - inner\n3. three\n");
        assert_eq!(doc.groups.len(), 2);
        assert_eq!(doc.groups[0].label, GroupLabel::OrderedList);
        assert_eq!(doc.groups[0].children.len(), 3);
        let two = &doc.texts[1];
        assert_eq!(two.text, "two");
        assert_eq!(two.marker.as_deref(), Some("2."));
        assert_eq!(two.children, vec![doc.groups[1].self_ref.clone()]);
        assert_eq!(doc.texts[2].text, "inner");
        assert_eq!(doc.texts[2].enumerated, Some(false));
        doc.validate_tree().unwrap();
    }

    #[test]
    fn test_code_table_and_image() {
        let md = "```rust\nfn main() {}\n```\n\n| A | B |\n|---|---|\n| 1 | 2 |\n\n![A chart](chart.png)\n";
        let doc = convert(md);
        let code = &doc.texts[0];
        assert_eq!(code.label, DocItemLabel::Code);
        assert_eq!(code.code_language.as_deref(), Some("rust"));
        assert_eq!(code.text, "fn main() {}");

        let table = &doc.tables[0].data;
        assert_eq!((table.num_rows, table.num_cols), (2, 2));
        assert_eq!(table.header_row_count(), 1);
        assert_eq!(table.grid()[1][1].text, "2");

        let pic = &doc.pictures[0];
        assert_eq!(pic.image.as_ref().and_then(|i| i.uri.as_deref()), Some("chart.png"));
        assert_eq!(doc.texts_of(&pic.captions).collect::<Vec<_>>(), vec!["A chart"]);
    }

    #[test]
    fn test_task_list_and_quote() {
        let doc = convert("- [x] done\n- [ ] todo\n\n> quoted words\n");
        let labels: Vec<_> = doc
            .iterate_items(IterOptions::new())
            .filter_map(|(n, _)| match n {
                NodeItem::Text(t) => Some((t.label, t.text.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                (DocItemLabel::CheckboxSelected, "done".to_string()),
                (DocItemLabel::CheckboxUnselected, "todo".to_string()),
                (DocItemLabel::Text, "quoted words".to_string()),
            ]
        );
    }
}
