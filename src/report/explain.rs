//! Human-readable explanation of a converted document's structure.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::export::{export_to_dict, export_to_markdown, MarkdownOptions};
use crate::model::{Document, IterOptions, ProvenanceItem};

const WIDE_RULE: usize = 80;
const NARROW_RULE: usize = 40;

/// How much of each section the report shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainLimits {
    /// Characters of text shown per tree node
    pub tree_text_chars: usize,
    /// Text items listed in detail
    pub max_texts: usize,
    /// Characters shown per detailed text item
    pub text_chars: usize,
    /// Tables listed
    pub max_tables: usize,
    /// Characters of Markdown shown
    pub markdown_chars: usize,
    /// Body children in the JSON preview
    pub body_children: usize,
    /// Text items in the JSON preview
    pub json_texts: usize,
}

impl Default for ExplainLimits {
    fn default() -> Self {
        Self {
            tree_text_chars: 60,
            max_texts: 50,
            text_chars: 200,
            max_tables: 5,
            markdown_chars: 8000,
            body_children: 5,
            json_texts: 3,
        }
    }
}

impl ExplainLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_texts(mut self, max_texts: usize) -> Self {
        self.max_texts = max_texts;
        self
    }

    pub fn with_max_tables(mut self, max_tables: usize) -> Self {
        self.max_tables = max_tables;
        self
    }

    pub fn with_markdown_chars(mut self, markdown_chars: usize) -> Self {
        self.markdown_chars = markdown_chars;
        self
    }

    pub fn with_text_chars(mut self, tree: usize, detail: usize) -> Self {
        self.tree_text_chars = tree;
        self.text_chars = detail;
        self
    }

    pub fn with_json_preview(mut self, body_children: usize, texts: usize) -> Self {
        self.body_children = body_children;
        self.json_texts = texts;
        self
    }
}

/// Structure report for one document.
#[derive(Debug, Clone)]
pub struct ExplainReport {
    source: String,
    limits: ExplainLimits,
}

impl ExplainReport {
    /// Report for a document converted from `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            limits: ExplainLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ExplainLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ExplainLimits {
        &self.limits
    }

    /// Render all sections.
    pub fn render(&self, doc: &Document) -> Result<String> {
        let mut out = String::new();
        self.overview(doc, &mut out);
        self.element_tree(doc, &mut out);
        self.text_details(doc, &mut out);
        self.tables(doc, &mut out);
        self.markdown(doc, &mut out);
        self.json_preview(doc, &mut out)?;
        Ok(out)
    }

    fn overview(&self, doc: &Document, out: &mut String) {
        banner(out, "DOCUMENT STRUCTURE EXPLAINED");
        out.push_str(&format!("Source: {}\n", self.source));
        out.push_str(&format!("Document name: {}\n\n", doc.name));

        let stats = doc.statistics();
        out.push_str(&format!("{}\nSTATISTICS\n{}\n", "-".repeat(NARROW_RULE), "-".repeat(NARROW_RULE)));
        out.push_str(&format!("Text items: {}\n", stats.num_texts));
        out.push_str(&format!("Tables: {}\n", stats.num_tables));
        out.push_str(&format!("Pictures: {}\n", stats.num_pictures));
        out.push_str(&format!("Groups: {}\n", stats.num_groups));
        out.push_str(&format!("Pages: {}\n\n", stats.num_pages));
    }

    fn element_tree(&self, doc: &Document, out: &mut String) {
        banner(out, "ELEMENT TREE");
        out.push_str("How the elements nest:\n\n");
        for (node, level) in doc.iterate_items(IterOptions::new()) {
            out.push_str(&"  ".repeat(level));
            out.push_str(&format!("[{}]", node.label_name()));
            if let Some(text) = node.text().filter(|t| !t.is_empty()) {
                out.push_str(&format!(" → \"{}\"", preview(text, self.limits.tree_text_chars)));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    fn text_details(&self, doc: &Document, out: &mut String) {
        banner(out, "TEXT ITEMS IN DETAIL");
        for (i, item) in doc.texts.iter().take(self.limits.max_texts).enumerate() {
            out.push_str(&format!("--- texts[{}] ---\n", i));
            out.push_str(&format!("  self_ref: {}\n", item.self_ref.cref));
            out.push_str(&format!("  label: {}\n", item.label));
            if item.text.is_empty() {
                out.push_str("  text: (empty)\n");
            } else {
                out.push_str(&format!("  text: {}\n", preview(&item.text, self.limits.text_chars)));
            }
            for prov in &item.prov {
                out.push_str(&format!("  prov: {}\n", describe_prov(prov)));
            }
            out.push('\n');
        }
        if doc.texts.len() > self.limits.max_texts {
            out.push_str(&format!(
                "... and {} more text items\n\n",
                doc.texts.len() - self.limits.max_texts
            ));
        }
    }

    fn tables(&self, doc: &Document, out: &mut String) {
        if doc.tables.is_empty() {
            return;
        }
        banner(out, "TABLES");
        for (i, table) in doc.tables.iter().take(self.limits.max_tables).enumerate() {
            out.push_str(&format!("--- tables[{}] ---\n", i));
            out.push_str(&format!("  self_ref: {}\n", table.self_ref.cref));
            out.push_str(&format!("  rows: {}\n", table.data.num_rows));
            out.push_str(&format!("  columns: {}\n\n", table.data.num_cols));
        }
    }

    fn markdown(&self, doc: &Document, out: &mut String) {
        banner(out, "MARKDOWN EXPORT");
        let markdown = export_to_markdown(doc, &MarkdownOptions::default());
        let total = markdown.chars().count();
        if total > self.limits.markdown_chars {
            out.extend(markdown.chars().take(self.limits.markdown_chars));
            out.push_str(&format!(
                "\n\n... [TRUNCATED - full markdown has {} chars] ...\n",
                total
            ));
        } else {
            out.push_str(&markdown);
        }
        out.push_str("\n\n");
    }

    fn json_preview(&self, doc: &Document, out: &mut String) -> Result<()> {
        banner(out, "JSON STRUCTURE (excerpt)");
        let dict = export_to_dict(doc)?;
        let full_len = serde_json::to_string(&dict)?.chars().count();

        let children = dict["body"]["children"].as_array().cloned().unwrap_or_default();
        let hidden = children.len().saturating_sub(self.limits.body_children);
        let mut body = json!({
            "self_ref": dict["body"]["self_ref"],
            "children": children.into_iter().take(self.limits.body_children).collect::<Vec<_>>(),
        });
        if hidden > 0 {
            body["hint"] = Value::String(format!("... (+{} more)", hidden));
        }

        let texts: Vec<Value> = dict["texts"]
            .as_array()
            .map(|t| t.iter().take(self.limits.json_texts).cloned().collect())
            .unwrap_or_default();

        let preview = json!({
            "schema_name": dict["schema_name"],
            "version": dict["version"],
            "name": dict["name"],
            "origin": dict.get("origin").cloned().unwrap_or(Value::Null),
            "body": body,
            "texts_excerpt": texts,
            "hint": format!("Full JSON has {} chars", full_len),
        });
        out.push_str(&serde_json::to_string_pretty(&preview)?);
        out.push('\n');
        Ok(())
    }
}

fn banner(out: &mut String, title: &str) {
    let rule = "=".repeat(WIDE_RULE);
    out.push_str(&format!("{}\n{}\n{}\n\n", rule, title, rule));
}

/// First `max` characters, with `...` when cut.
fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn describe_prov(prov: &ProvenanceItem) -> String {
    let b = &prov.bbox;
    format!(
        "page {}, bbox({:.1}, {:.1}, {:.1}, {:.1})",
        prov.page_no, b.l, b.t, b.r, b.b
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, DocItemLabel, TableData};

    fn sample() -> Document {
        let mut doc = Document::new("explained");
        doc.add_title("A title that is quite long and keeps going past the preview limit", None, None);
        for i in 0..7 {
            let prov = ProvenanceItem::new(1, BoundingBox::new(10.0, 20.0, 110.0, 32.5), 6);
            doc.add_text(DocItemLabel::Paragraph, format!("para {i}"), Some(prov), None);
        }
        doc.add_table(TableData::from_rows(&[vec!["a", "b"], vec!["1", "2"]], 1), None, None);
        doc
    }

    #[test]
    fn test_sections() {
        let report = ExplainReport::new("explained.pdf").render(&sample()).unwrap();
        assert!(report.contains("Source: explained.pdf\nDocument name: explained\n"));
        assert!(report.contains("Text items: 8\nTables: 1\n"));
        assert!(report.contains("[title] → \"A title that is quite long and keeps going past the preview ...\""));
        assert!(report.contains("\n[paragraph] → \"para 0\""));
        assert!(report.contains("  prov: page 1, bbox(10.0, 20.0, 110.0, 32.5)"));
        assert!(report.contains("--- tables[0] ---\n  self_ref: #/tables/0\n  rows: 2\n  columns: 2\n"));
        assert!(report.contains("\"schema_name\": \"DoclingDocument\""));
        assert!(report.contains("(+4 more)"));
    }

    #[test]
    fn test_tree_skips_groups() {
        let mut doc = Document::new("lists");
        doc.add_heading("Steps", 1, None, None);
        let list = doc.add_list_group(false, None);
        doc.add_list_item("mix", false, None, None, Some(&list));
        doc.add_list_item("bake", false, None, None, Some(&list));
        let report = ExplainReport::new("lists.md").render(&doc).unwrap();

        assert!(!report.contains("[list]"));
        assert!(report.contains("\n[list_item] → \"mix\"\n[list_item] → \"bake\"\n"));
    }

    #[test]
    fn test_limits() {
        let limits = ExplainLimits::new()
            .with_max_texts(2)
            .with_markdown_chars(10)
            .with_json_preview(1, 1);
        let report = ExplainReport::new("x")
            .with_limits(limits)
            .render(&sample())
            .unwrap();
        assert!(report.contains("--- texts[1] ---"));
        assert!(!report.contains("--- texts[2] ---"));
        assert!(report.contains("... and 6 more text items"));
        assert!(report.contains("[TRUNCATED - full markdown has"));
        assert!(report.contains("(+8 more)"));
    }

    #[test]
    fn test_limits_from_json() {
        let limits: ExplainLimits = serde_json::from_str(r#"{"max_texts": 10}"#).unwrap();
        assert_eq!(limits.max_texts, 10);
        assert_eq!(limits.markdown_chars, 8000);
    }
}
