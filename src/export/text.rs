//! Plain text and indented debug-tree export.

use std::collections::HashSet;

use crate::model::{Document, IterOptions, NodeItem};

use super::{MarkdownOptions, MarkdownSerializer};

/// Export a document as plain text: one block per item, no markup.
pub fn export_to_text(doc: &Document) -> String {
    MarkdownSerializer::new(doc, MarkdownOptions::default().strict_text())
        .serialize()
        .content
}

/// Options for [`export_to_indented_text`].
#[derive(Debug, Clone)]
pub struct IndentedTextOptions {
    /// Indentation per level
    pub indent: String,
    /// Truncate texts longer than this (in characters); `None` keeps them whole
    pub max_text_len: Option<usize>,
    /// Show group nodes
    pub include_groups: bool,
}

impl Default for IndentedTextOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            max_text_len: None,
            include_groups: true,
        }
    }
}

impl IndentedTextOptions {
    /// Truncate texts to `max_text_len` characters.
    pub fn with_max_text_len(mut self, max_text_len: usize) -> Self {
        self.max_text_len = Some(max_text_len);
        self
    }
}

/// One line per node: `item-N at level L: label: text`.
pub fn export_to_indented_text(doc: &Document, options: &IndentedTextOptions) -> String {
    let iter = if options.include_groups {
        IterOptions::new().with_groups()
    } else {
        IterOptions::new()
    };

    let mut printed_captions = HashSet::new();
    let mut lines = Vec::new();
    for (i, (node, level)) in doc.iterate_items(iter).enumerate() {
        if printed_captions.contains(node.self_ref()) {
            continue;
        }
        let prefix = options.indent.repeat(level);
        match node {
            NodeItem::Group(group) => lines.push(format!(
                "{}item-{} at level {}: {}: group {}",
                prefix, i, level, group.label, group.name
            )),
            NodeItem::Text(text) => lines.push(format!(
                "{}item-{} at level {}: {}: {}",
                prefix,
                i,
                level,
                text.label,
                truncate_middle(&text.text, options.max_text_len)
            )),
            NodeItem::Table(table) => {
                lines.push(format!(
                    "{}item-{} at level {}: {} with [{}x{}]",
                    prefix, i, level, table.label, table.data.num_rows, table.data.num_cols
                ));
                for cap in &table.captions {
                    printed_captions.insert(cap);
                    if let Some(text) = doc.resolve(cap).and_then(|n| n.text()) {
                        lines.push(format!(
                            "{}item-{} at level {}: caption: {}",
                            options.indent.repeat(level + 1),
                            i,
                            level + 1,
                            text
                        ));
                    }
                }
            }
            NodeItem::Picture(picture) => {
                lines.push(format!("{}item-{} at level {}: {}", prefix, i, level, picture.label));
                for cap in &picture.captions {
                    printed_captions.insert(cap);
                    if let Some(text) = doc.resolve(cap).and_then(|n| n.text()) {
                        lines.push(format!(
                            "{}item-{} at level {}: caption: {}",
                            options.indent.repeat(level + 1),
                            i,
                            level + 1,
                            text
                        ));
                    }
                }
            }
        }
    }
    lines.join("\n")
}

/// Keep the head and tail of `text` around a ` ... ` marker.
pub(crate) fn truncate_middle(text: &str, max_len: Option<usize>) -> String {
    const MIDDLE: &str = " ... ";
    let Some(max_len) = max_len else {
        return text.to_string();
    };
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < max_len + MIDDLE.len() {
        return text.to_string();
    }
    let head = max_len.saturating_sub(MIDDLE.len()) / 2;
    let tail = max_len - head;
    let mut out: String = chars[..head].iter().collect();
    out.push_str(MIDDLE);
    out.extend(&chars[chars.len() - tail..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocItemLabel, TableData};

    #[test]
    fn test_plain_text() {
        let mut doc = Document::new("d");
        doc.add_heading("Section_A", 1, None, None);
        doc.add_text(DocItemLabel::Text, "Body text.", None, None);
        doc.add_table(
            TableData::from_rows(&[vec!["a", "b"], vec!["1", "2"]], 1),
            None,
            None,
        );
        assert_eq!(export_to_text(&doc), "Section_A\n\nBody text.\n\na\tb\n1\t2");
    }

    #[test]
    fn test_indented_tree() {
        let mut doc = Document::new("d");
        doc.add_title("A fairly long document title", None, None);
        let list = doc.add_list_group(false, None);
        doc.add_list_item("item", false, None, None, Some(&list));
        let table = doc.add_table(TableData::from_rows(&[vec!["x"]], 1), None, None);
        doc.add_caption(&table, "Table 1", None).unwrap();

        let tree = export_to_indented_text(&doc, &IndentedTextOptions::default());
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines[0], "item-0 at level 0: unspecified: group _root_");
        assert_eq!(lines[1], "  item-1 at level 1: title: A fairly long document title");
        assert_eq!(lines[2], "  item-2 at level 1: list: group list");
        assert_eq!(lines[3], "    item-3 at level 2: list_item: item");
        assert_eq!(lines[4], "  item-4 at level 1: table with [1x1]");
        assert_eq!(lines[5], "    item-4 at level 2: caption: Table 1");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_truncate_middle() {
        assert_eq!(truncate_middle("short", Some(16)), "short");
        let long = "abcdefghijklmnopqrstuvwxyz";
        let cut = truncate_middle(long, Some(16));
        assert_eq!(cut, "abcde ... pqrstuvwxyz");
        assert_eq!(truncate_middle(long, None), long);
    }
}
