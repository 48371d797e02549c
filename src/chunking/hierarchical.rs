//! One chunk per structural element.

use std::collections::BTreeMap;

use super::{item_text, Chunker, DocChunk, DocMeta};
use crate::model::{
    ContentLayer, DocItemLabel, Document, IterOptions, NodeItem, NodeKind, NodeRef, TextItem,
};

/// Chunks along the document structure.
///
/// Headings are not emitted; they become the `headings` of the chunks that
/// follow them.
#[derive(Debug, Clone)]
pub struct HierarchicalChunker {
    /// Emit consecutive items of one list as a single chunk
    pub merge_list_items: bool,
}

impl HierarchicalChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set list merging.
    pub fn with_merge_list_items(mut self, merge: bool) -> Self {
        self.merge_list_items = merge;
        self
    }
}

impl Default for HierarchicalChunker {
    fn default() -> Self {
        Self {
            merge_list_items: true,
        }
    }
}

/// A list being collected.
struct PendingList {
    parent: Option<NodeRef>,
    items: Vec<NodeRef>,
    lines: Vec<String>,
}

struct ChunkState<'a> {
    doc: &'a Document,
    headings: BTreeMap<u8, String>,
    list: Option<PendingList>,
    chunks: Vec<DocChunk>,
}

impl<'a> ChunkState<'a> {
    fn meta(&self, doc_items: Vec<NodeRef>, captions: Vec<String>) -> DocMeta {
        DocMeta {
            doc_items,
            headings: self.headings.values().cloned().collect(),
            captions,
            origin: self.doc.origin.clone(),
        }
    }

    fn push(&mut self, text: String, doc_items: Vec<NodeRef>, captions: Vec<String>) {
        if text.trim().is_empty() {
            return;
        }
        let meta = self.meta(doc_items, captions);
        self.chunks.push(DocChunk::new(text, meta));
    }

    fn flush_list(&mut self) {
        if let Some(list) = self.list.take() {
            self.push(list.lines.join("\n"), list.items, Vec::new());
        }
    }

    fn set_heading(&mut self, level: u8, text: &str) {
        self.flush_list();
        self.headings.retain(|&l, _| l < level);
        self.headings.insert(level, text.trim().to_string());
    }

    fn add_list_item(&mut self, item: &TextItem) {
        if item.text.trim().is_empty() {
            return;
        }
        let same_list = self
            .list
            .as_ref()
            .is_some_and(|list| list.parent == item.parent);
        if !same_list {
            self.flush_list();
            self.list = Some(PendingList {
                parent: item.parent.clone(),
                items: Vec::new(),
                lines: Vec::new(),
            });
        }
        if let Some(list) = self.list.as_mut() {
            list.items.push(item.self_ref.clone());
            list.lines.push(item.text.clone());
        }
    }
}

/// Captions are emitted with their table or picture.
fn is_owned_caption(item: &TextItem) -> bool {
    item.label == DocItemLabel::Caption
        && item
            .parent
            .as_ref()
            .and_then(NodeRef::kind)
            .is_some_and(|kind| matches!(kind, NodeKind::Tables | NodeKind::Pictures))
}

impl Chunker for HierarchicalChunker {
    fn chunk(&self, doc: &Document) -> Vec<DocChunk> {
        let mut state = ChunkState {
            doc,
            headings: BTreeMap::new(),
            list: None,
            chunks: Vec::new(),
        };

        for (node, _level) in doc.iterate_items(IterOptions::new()) {
            if node.content_layer() == ContentLayer::Furniture {
                continue;
            }
            match node {
                NodeItem::Text(item) => match item.label {
                    DocItemLabel::Title => state.set_heading(0, &item.text),
                    DocItemLabel::SectionHeader => {
                        state.set_heading(item.level.unwrap_or(1).max(1), &item.text)
                    }
                    DocItemLabel::PageHeader | DocItemLabel::PageFooter => {}
                    DocItemLabel::ListItem if self.merge_list_items => state.add_list_item(item),
                    _ if is_owned_caption(item) => {}
                    _ => {
                        state.flush_list();
                        state.push(item.text.clone(), vec![item.self_ref.clone()], Vec::new());
                    }
                },
                NodeItem::Table(table) => {
                    state.flush_list();
                    let Some(text) = item_text(doc, &table.self_ref) else {
                        continue;
                    };
                    let captions: Vec<String> =
                        doc.texts_of(&table.captions).map(str::to_string).collect();
                    let mut items = vec![table.self_ref.clone()];
                    items.extend(table.captions.iter().cloned());
                    state.push(text, items, captions);
                }
                NodeItem::Picture(picture) => {
                    state.flush_list();
                    // caption text is the chunk body, so it is not repeated as context
                    let Some(text) = item_text(doc, &picture.self_ref) else {
                        continue;
                    };
                    let mut items = vec![picture.self_ref.clone()];
                    items.extend(picture.captions.iter().cloned());
                    state.push(text, items, Vec::new());
                }
                NodeItem::Group(_) => {}
            }
        }
        state.flush_list();

        log::debug!("Hierarchical chunking of {} produced {} chunks", doc.name, state.chunks.len());
        state.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableData;

    fn sample() -> Document {
        let mut doc = Document::new("sample");
        doc.add_title("Handbook", None, None);
        doc.add_text(DocItemLabel::PageHeader, "ACME Corp", None, None);
        doc.add_heading("Setup", 1, None, None);
        doc.add_text(DocItemLabel::Paragraph, "Install the tools.", None, None);
        let list = doc.add_list_group(false, None);
        doc.add_list_item("compiler", false, None, None, Some(&list));
        doc.add_list_item("linker", false, None, None, Some(&list));
        doc.add_heading("Details", 2, None, None);
        let table = doc.add_table(
            TableData::from_rows(&[vec!["Tool", "Version"], vec!["cc", "12"]], 1),
            None,
            None,
        );
        doc.add_caption(&table, "Table 1: Versions", None).unwrap();
        doc.add_picture(None, None, None);
        let figure = doc.add_picture(None, None, None);
        doc.add_caption(&figure, "Figure 1: Layout", None).unwrap();
        doc.add_heading("Usage", 1, None, None);
        doc.add_code("make all", None, None, None);
        doc
    }

    #[test]
    fn test_heading_stack_and_elements() {
        let doc = sample();
        let chunks = HierarchicalChunker::new().chunk(&doc);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts[0], "Install the tools.");
        assert_eq!(texts[1], "compiler\nlinker");
        assert!(texts[2].contains("| Tool"));
        assert_eq!(texts[3], "Figure 1: Layout");
        assert_eq!(texts[4], "make all");
        assert_eq!(chunks.len(), 5);

        assert_eq!(chunks[0].meta.headings, vec!["Handbook", "Setup"]);
        assert_eq!(chunks[1].meta.doc_items.len(), 2);
        assert_eq!(chunks[2].meta.headings, vec!["Handbook", "Setup", "Details"]);
        assert_eq!(chunks[2].meta.captions, vec!["Table 1: Versions"]);
        assert!(chunks[3].meta.captions.is_empty());
        // a level 1 heading drops the level 2 entry
        assert_eq!(chunks[4].meta.headings, vec!["Handbook", "Usage"]);
    }

    #[test]
    fn test_items_referenced_once() {
        let doc = sample();
        let chunks = HierarchicalChunker::new().chunk(&doc);
        let mut seen = std::collections::HashSet::new();
        for chunk in &chunks {
            for r in &chunk.meta.doc_items {
                assert!(seen.insert(r.clone()), "{} referenced twice", r.cref);
            }
        }
        assert!(!chunks.iter().any(|c| c.text.contains("ACME")));
    }

    #[test]
    fn test_unmerged_lists() {
        let doc = sample();
        let chunks = HierarchicalChunker::new().with_merge_list_items(false).chunk(&doc);
        assert_eq!(chunks[1].text, "compiler");
        assert_eq!(chunks[2].text, "linker");
        assert_eq!(chunks.len(), 6);
    }
}
