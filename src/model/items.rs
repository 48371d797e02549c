//! Document nodes: groups, texts, tables and pictures.

use serde::{Deserialize, Serialize};

use super::{
    ContentLayer, DocItemLabel, GroupLabel, ImageRef, NodeRef, ProvenanceItem, TableData,
};

/// A grouping node (list, slide, section, ...). Groups carry no content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupItem {
    /// Pointer to this node
    pub self_ref: NodeRef,
    /// Containing node (`None` for the roots)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeRef>,
    /// Children in document order
    pub children: Vec<NodeRef>,
    /// Layer
    pub content_layer: ContentLayer,
    /// Free-form group name
    pub name: String,
    /// Group label
    pub label: GroupLabel,
}

impl GroupItem {
    pub(crate) fn root(self_ref: NodeRef, name: &str, layer: ContentLayer) -> Self {
        Self {
            self_ref,
            parent: None,
            children: Vec::new(),
            content_layer: layer,
            name: name.to_string(),
            label: GroupLabel::Unspecified,
        }
    }
}

/// A text-bearing item: paragraphs, headings, list items, code, formulas, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextItem {
    /// Pointer to this node
    pub self_ref: NodeRef,
    /// Containing node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeRef>,
    /// Children in document order
    pub children: Vec<NodeRef>,
    /// Layer
    pub content_layer: ContentLayer,
    /// Semantic label
    pub label: DocItemLabel,
    /// Page provenance
    pub prov: Vec<ProvenanceItem>,
    /// Text as found in the source, before sanitizing
    pub orig: String,
    /// Normalized text
    pub text: String,
    /// Heading level (1-based) for section headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Whether a list item belongs to an enumerated list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<bool>,
    /// Original list marker ("-", "3.", "a)")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Language tag for code blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
}

/// A table and its grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableItem {
    /// Pointer to this node
    pub self_ref: NodeRef,
    /// Containing node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeRef>,
    /// Children in document order (captions, footnotes)
    pub children: Vec<NodeRef>,
    /// Layer
    pub content_layer: ContentLayer,
    /// Always [`DocItemLabel::Table`] or [`DocItemLabel::DocumentIndex`]
    pub label: DocItemLabel,
    /// Page provenance
    pub prov: Vec<ProvenanceItem>,
    /// Caption text items
    pub captions: Vec<NodeRef>,
    /// Grid contents
    pub data: TableData,
}

/// A picture, optionally with its image bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureItem {
    /// Pointer to this node
    pub self_ref: NodeRef,
    /// Containing node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeRef>,
    /// Children in document order (captions, OCR text inside the picture)
    pub children: Vec<NodeRef>,
    /// Layer
    pub content_layer: ContentLayer,
    /// Always [`DocItemLabel::Picture`]
    pub label: DocItemLabel,
    /// Page provenance
    pub prov: Vec<ProvenanceItem>,
    /// Caption text items
    pub captions: Vec<NodeRef>,
    /// Image payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

/// Borrowed view of any node.
#[derive(Debug, Clone, Copy)]
pub enum NodeItem<'a> {
    Group(&'a GroupItem),
    Text(&'a TextItem),
    Table(&'a TableItem),
    Picture(&'a PictureItem),
}

impl<'a> NodeItem<'a> {
    /// Pointer to this node.
    pub fn self_ref(&self) -> &'a NodeRef {
        match self {
            NodeItem::Group(g) => &g.self_ref,
            NodeItem::Text(t) => &t.self_ref,
            NodeItem::Table(t) => &t.self_ref,
            NodeItem::Picture(p) => &p.self_ref,
        }
    }

    /// Containing node.
    pub fn parent(&self) -> Option<&'a NodeRef> {
        match self {
            NodeItem::Group(g) => g.parent.as_ref(),
            NodeItem::Text(t) => t.parent.as_ref(),
            NodeItem::Table(t) => t.parent.as_ref(),
            NodeItem::Picture(p) => p.parent.as_ref(),
        }
    }

    /// Children in document order.
    pub fn children(&self) -> &'a [NodeRef] {
        match self {
            NodeItem::Group(g) => &g.children,
            NodeItem::Text(t) => &t.children,
            NodeItem::Table(t) => &t.children,
            NodeItem::Picture(p) => &p.children,
        }
    }

    /// Page provenance; empty for groups.
    pub fn prov(&self) -> &'a [ProvenanceItem] {
        match self {
            NodeItem::Group(_) => &[],
            NodeItem::Text(t) => &t.prov,
            NodeItem::Table(t) => &t.prov,
            NodeItem::Picture(p) => &p.prov,
        }
    }

    /// Layer of the node.
    pub fn content_layer(&self) -> ContentLayer {
        match self {
            NodeItem::Group(g) => g.content_layer,
            NodeItem::Text(t) => t.content_layer,
            NodeItem::Table(t) => t.content_layer,
            NodeItem::Picture(p) => p.content_layer,
        }
    }

    /// Label as its wire name.
    pub fn label_name(&self) -> &'static str {
        match self {
            NodeItem::Group(g) => g.label.as_str(),
            NodeItem::Text(t) => t.label.as_str(),
            NodeItem::Table(t) => t.label.as_str(),
            NodeItem::Picture(p) => p.label.as_str(),
        }
    }

    /// Item label, `None` for groups.
    pub fn doc_label(&self) -> Option<DocItemLabel> {
        match self {
            NodeItem::Group(_) => None,
            NodeItem::Text(t) => Some(t.label),
            NodeItem::Table(t) => Some(t.label),
            NodeItem::Picture(p) => Some(p.label),
        }
    }

    /// Text content for text items.
    pub fn text(&self) -> Option<&'a str> {
        match self {
            NodeItem::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Whether this is a group node.
    pub fn is_group(&self) -> bool {
        matches!(self, NodeItem::Group(_))
    }

    /// Whether the node has provenance on `page_no`.
    pub fn on_page(&self, page_no: u32) -> bool {
        self.prov().iter().any(|p| p.page_no == page_no)
    }
}
