//! HTML reader: walks the `scraper` DOM and maps block elements to items.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node};

use super::{collapse_whitespace, DeclarativeBackend, InputDocument};
use crate::detect::InputFormat;
use crate::error::Result;
use crate::model::{DocItemLabel, Document, ImageRef, NodeRef, TableCell, TableData, MAX_SPAN};

/// HTML backend.
#[derive(Debug, Default)]
pub struct HtmlBackend;

impl HtmlBackend {
    /// Create a new HTML backend.
    pub fn new() -> Self {
        Self
    }
}

impl DeclarativeBackend for HtmlBackend {
    fn name(&self) -> &'static str {
        "html"
    }

    fn supported_formats(&self) -> &[InputFormat] {
        &[InputFormat::Html]
    }

    fn convert(&self, input: &InputDocument) -> Result<Document> {
        let html = Html::parse_document(&input.text());
        let mut walker = HtmlWalker {
            doc: input.new_document(),
            title_seen: false,
            inline: String::new(),
        };
        walker.walk(html.root_element(), None);
        walker.flush_inline(None);
        Ok(walker.doc)
    }
}

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "svg", "iframe", "nav"];
const INLINE: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "data", "dfn", "em", "i", "kbd", "mark", "q", "s",
    "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var", "label", "font", "del",
    "ins",
];

struct HtmlWalker {
    doc: Document,
    title_seen: bool,
    /// Loose inline text waiting for a block boundary
    inline: String,
}

impl HtmlWalker {
    fn walk(&mut self, el: ElementRef<'_>, parent: Option<&NodeRef>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.inline.push_str(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el, parent);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, parent: Option<&NodeRef>) {
        let name = el.value().name();
        if SKIPPED.contains(&name) {
            return;
        }
        if INLINE.contains(&name) {
            self.inline.push_str(&inline_text(el));
            return;
        }
        if name == "code" {
            self.inline.push('`');
            self.inline.push_str(&el.text().collect::<String>());
            self.inline.push('`');
            return;
        }
        if name == "br" {
            self.inline.push(' ');
            return;
        }

        self.flush_inline(parent);
        match name {
            "title" => {
                let text = collapse_whitespace(&el.text().collect::<String>());
                if !text.is_empty() && !self.title_seen {
                    self.title_seen = true;
                    self.doc.add_title(text, None, parent);
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                let text = collapse_whitespace(&inline_text(el));
                if text.is_empty() {
                    return;
                }
                if level == 1 && !self.title_seen {
                    self.title_seen = true;
                    self.doc.add_title(text, None, parent);
                } else {
                    self.doc.add_heading(text, level, None, parent);
                }
            }
            "p" => {
                self.walk(el, parent);
                self.flush_inline(parent);
            }
            "ul" | "ol" => self.list(el, name == "ol", parent),
            "table" => self.table(el, parent),
            "pre" => {
                let language = el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .chain(std::iter::once(el))
                    .find_map(code_language);
                let code = el.text().collect::<String>();
                let code = code.trim_matches('\n').to_string();
                if !code.trim().is_empty() {
                    self.doc.add_code(code, language, None, parent);
                }
            }
            "img" => {
                self.image(el, None, parent);
            }
            "figure" => self.figure(el, parent),
            "head" => {
                self.walk(el, parent);
                self.inline.clear();
            }
            "hr" | "meta" | "link" => {}
            _ => {
                self.walk(el, parent);
                self.flush_inline(parent);
            }
        }
    }

    fn flush_inline(&mut self, parent: Option<&NodeRef>) {
        let text = collapse_whitespace(&std::mem::take(&mut self.inline));
        if !text.is_empty() {
            self.doc.add_text(DocItemLabel::Text, text, None, parent);
        }
    }

    fn list(&mut self, el: ElementRef<'_>, ordered: bool, parent: Option<&NodeRef>) {
        let group = self.doc.add_list_group(ordered, parent);
        let mut number = 0;
        for li in el.children().filter_map(ElementRef::wrap) {
            if li.value().name() != "li" {
                continue;
            }
            number += 1;
            let mut own_text = String::new();
            let mut nested = Vec::new();
            for child in li.children() {
                match child.value() {
                    Node::Text(text) => own_text.push_str(text),
                    Node::Element(e) if matches!(e.name(), "ul" | "ol") => {
                        if let Some(sub) = ElementRef::wrap(child) {
                            nested.push(sub);
                        }
                    }
                    Node::Element(_) => {
                        if let Some(sub) = ElementRef::wrap(child) {
                            own_text.push(' ');
                            own_text.push_str(&inline_text(sub));
                        }
                    }
                    _ => {}
                }
            }
            let marker = if ordered {
                format!("{}.", number)
            } else {
                "-".to_string()
            };
            let item = self.doc.add_list_item(
                collapse_whitespace(&own_text),
                ordered,
                Some(marker),
                None,
                Some(&group),
            );
            for sub in nested {
                self.list(sub, sub.value().name() == "ol", Some(&item));
            }
        }
    }

    fn table(&mut self, el: ElementRef<'_>, parent: Option<&NodeRef>) {
        let mut rows: Vec<(ElementRef<'_>, bool)> = Vec::new();
        let mut caption = None;
        for child in el.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "tr" => rows.push((child, false)),
                "thead" | "tbody" | "tfoot" => {
                    let in_head = child.value().name() == "thead";
                    for tr in child.children().filter_map(ElementRef::wrap) {
                        if tr.value().name() == "tr" {
                            rows.push((tr, in_head));
                        }
                    }
                }
                "caption" => caption = Some(collapse_whitespace(&inline_text(child))),
                _ => {}
            }
        }

        let mut data = TableData::default();
        let mut occupied: HashSet<(usize, usize)> = HashSet::new();
        for (r, (tr, in_head)) in rows.iter().enumerate() {
            let cells: Vec<ElementRef<'_>> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .collect();
            let all_th = !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th");
            let mut c = 0;
            for cell_el in cells {
                while occupied.contains(&(r, c)) {
                    c += 1;
                }
                let row_span = span_attr(cell_el, "rowspan");
                let col_span = span_attr(cell_el, "colspan");
                let text = collapse_whitespace(&cell_el.text().collect::<String>());
                let mut cell = TableCell::new(text, r, c).with_span(row_span, col_span);
                if cell_el.value().name() == "th" {
                    cell = if *in_head || all_th {
                        cell.column_header()
                    } else {
                        cell.row_header()
                    };
                } else if *in_head {
                    cell = cell.column_header();
                }
                for dr in 0..row_span {
                    for dc in 0..col_span {
                        occupied.insert((r + dr, c + dc));
                    }
                }
                data.add_cell(cell);
                c += col_span;
            }
        }
        if data.is_empty() {
            return;
        }
        let table = self.doc.add_table(data, None, parent);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            let _ = self.doc.add_caption(&table, caption, None);
        }
    }

    fn image(&mut self, el: ElementRef<'_>, caption: Option<String>, parent: Option<&NodeRef>) {
        let image = el.value().attr("src").map(ImageRef::from_uri);
        let pic = self.doc.add_picture(image, None, parent);
        let caption = caption.or_else(|| {
            el.value()
                .attr("alt")
                .map(collapse_whitespace)
                .filter(|a| !a.is_empty())
        });
        if let Some(caption) = caption {
            let _ = self.doc.add_caption(&pic, caption, None);
        }
    }

    fn figure(&mut self, el: ElementRef<'_>, parent: Option<&NodeRef>) {
        let caption = el
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "figcaption")
            .map(|e| collapse_whitespace(&inline_text(e)))
            .filter(|c| !c.is_empty());
        let img = el
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "img");
        match img {
            Some(img) => self.image(img, caption, parent),
            None => {
                let pic = self.doc.add_picture(None, None, parent);
                if let Some(caption) = caption {
                    let _ = self.doc.add_caption(&pic, caption, None);
                }
            }
        }
    }
}

/// Text of an element with `script`/`style` content removed.
fn inline_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if SKIPPED.contains(&e.name()) => {}
            Node::Element(e) if e.name() == "br" => out.push(' '),
            Node::Element(_) => {
                if let Some(sub) = ElementRef::wrap(child) {
                    out.push_str(&inline_text(sub));
                }
            }
            _ => {}
        }
    }
    out
}

fn span_attr(el: ElementRef<'_>, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// `language-xyz` or `lang-xyz` class on a `pre`/`code` element.
fn code_language(el: ElementRef<'_>) -> Option<String> {
    el.value().classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .map(|s| s.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupLabel;

    fn convert(html: &str) -> Document {
        let input = InputDocument::new("page.html", InputFormat::Html, html.as_bytes().to_vec());
        HtmlBackend::new().convert(&input).unwrap()
    }

    #[test]
    fn test_headings_paragraphs_and_skips() {
        let doc = convert(
            "<html><head><title>Page</title><style>p{}</style></head>\
             <body><h1>Main</h1><p>Hello <b>bold</b> world</p>\
             <script>var x;</script><h3>Sub</h3></body></html>",
        );
        let texts: Vec<_> = doc.texts.iter().map(|t| (t.label, t.text.as_str())).collect();
        assert_eq!(
            texts,
            vec![
                (DocItemLabel::Title, "Page"),
                (DocItemLabel::SectionHeader, "Main"),
                (DocItemLabel::Text, "Hello bold world"),
                (DocItemLabel::SectionHeader, "Sub"),
            ]
        );
        assert_eq!(doc.texts[3].level, Some(3));
    }

    #[test]
    fn test_nested_list() {
        let doc = convert("<ol><li>First<ul><li>Inner</li></ul></li><li>Second</li></ol>");
        assert_eq!(doc.groups[0].label, GroupLabel::OrderedList);
        assert_eq!(doc.groups[1].label, GroupLabel::List);
        assert_eq!(doc.texts[0].text, "First");
        assert_eq!(doc.groups[1].parent, Some(doc.texts[0].self_ref.clone()));
        assert_eq!(doc.texts[2].marker.as_deref(), Some("2."));
        doc.validate_tree().unwrap();
    }

    #[test]
    fn test_table_spans_and_headers() {
        let doc = convert(
            "<table><caption>Sales</caption>\
             <tr><th colspan=\"2\">Region</th><th>Total</th></tr>\
             <tr><td rowspan=\"2\">North</td><td>Q1</td><td>10</td></tr>\
             <tr><td>Q2</td><td>12</td></tr></table>",
        );
        let table = &doc.tables[0];
        assert_eq!((table.data.num_rows, table.data.num_cols), (3, 3));
        let grid = table.data.grid();
        assert_eq!(grid[0][1].text, "Region");
        assert!(grid[0][2].column_header);
        assert_eq!(grid[2][0].text, "North");
        assert_eq!(grid[2][1].text, "Q2");
        assert_eq!(doc.texts_of(&table.captions).collect::<Vec<_>>(), vec!["Sales"]);
    }

    #[test]
    fn test_pre_figure_and_img() {
        let doc = convert(
            "<pre><code class=\"language-python\">print(1)\n</code></pre>\
             <figure><img src=\"a.png\"><figcaption>Figure 1: A</figcaption></figure>\
             <p><img src=\"b.jpg\" alt=\"Logo\"></p>",
        );
        assert_eq!(doc.texts[0].label, DocItemLabel::Code);
        assert_eq!(doc.texts[0].code_language.as_deref(), Some("python"));
        assert_eq!(doc.texts[0].text, "print(1)");
        assert_eq!(doc.pictures.len(), 2);
        assert_eq!(
            doc.texts_of(&doc.pictures[0].captions).collect::<Vec<_>>(),
            vec!["Figure 1: A"]
        );
        assert_eq!(doc.pictures[1].image.as_ref().map(|i| i.mimetype.as_str()), Some("image/jpeg"));
    }
}
