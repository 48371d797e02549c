//! The structured document and its builders.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{
    ContentLayer, DocItemLabel, GroupItem, GroupLabel, ImageRef, ItemIter, IterOptions, NodeItem,
    NodeKind, NodeRef, PictureItem, ProvenanceItem, Size, TableData, TableItem, TextItem,
};
use crate::error::{Error, Result};

/// Schema name written into every serialized document.
pub const SCHEMA_NAME: &str = "DoclingDocument";
/// Schema version written into every serialized document.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOrigin {
    /// MIME type of the source
    pub mimetype: String,
    /// First 8 bytes of the SHA-256 of the source, big endian
    pub binary_hash: u64,
    /// Source file name
    pub filename: String,
    /// Source URL, if fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A page of the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageItem {
    /// 1-based page number
    pub page_no: u32,
    /// Page size in points
    pub size: Size,
    /// Rendered page image, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

/// Item counts, as shown by `info` and the structure report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub num_texts: usize,
    pub num_tables: usize,
    pub num_pictures: usize,
    pub num_groups: usize,
    pub num_pages: usize,
}

/// A converted document.
///
/// Items live in flat arrays (`texts`, `tables`, ...) and form a tree through
/// `parent`/`children` references rooted at `body`. Page headers and footers
/// hang off `furniture` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Always [`SCHEMA_NAME`]
    pub schema_name: String,
    /// Always [`SCHEMA_VERSION`]
    pub version: String,
    /// Document name (file stem)
    pub name: String,
    /// Source information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<DocumentOrigin>,
    /// Root for page furniture
    pub furniture: GroupItem,
    /// Root for body content
    pub body: GroupItem,
    /// Grouping nodes
    pub groups: Vec<GroupItem>,
    /// Text items
    pub texts: Vec<TextItem>,
    /// Pictures
    pub pictures: Vec<PictureItem>,
    /// Tables
    pub tables: Vec<TableItem>,
    /// Pages keyed by page number
    pub pages: BTreeMap<u32, PageItem>,
}

impl Document {
    /// Create an empty document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_name: SCHEMA_NAME.to_string(),
            version: SCHEMA_VERSION.to_string(),
            name: name.into(),
            origin: None,
            furniture: GroupItem::root(NodeRef::furniture(), "_root_", ContentLayer::Furniture),
            body: GroupItem::root(NodeRef::body(), "_root_", ContentLayer::Body),
            groups: Vec::new(),
            texts: Vec::new(),
            pictures: Vec::new(),
            tables: Vec::new(),
            pages: BTreeMap::new(),
        }
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: DocumentOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    // ====== Builders ======

    /// Register a page.
    pub fn add_page(&mut self, page_no: u32, size: Size) {
        self.pages.insert(
            page_no,
            PageItem {
                page_no,
                size,
                image: None,
            },
        );
    }

    /// Add a group under `parent` (default: body).
    pub fn add_group(
        &mut self,
        label: GroupLabel,
        name: impl Into<String>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let self_ref = NodeRef::new(NodeKind::Groups, self.groups.len());
        let parent = self.attach(parent, &self_ref);
        let layer = self.layer_of(&parent);
        self.groups.push(GroupItem {
            self_ref: self_ref.clone(),
            parent: Some(parent),
            children: Vec::new(),
            content_layer: layer,
            name: name.into(),
            label,
        });
        self_ref
    }

    /// Add a list group (`ordered` selects an enumerated list).
    pub fn add_list_group(&mut self, ordered: bool, parent: Option<&NodeRef>) -> NodeRef {
        if ordered {
            self.add_group(GroupLabel::OrderedList, "ordered list", parent)
        } else {
            self.add_group(GroupLabel::List, "list", parent)
        }
    }

    /// Add a text item. Page headers and footers default to the furniture root.
    pub fn add_text(
        &mut self,
        label: DocItemLabel,
        text: impl Into<String>,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let text = text.into();
        let furniture = NodeRef::furniture();
        let parent = match parent {
            None if label.is_furniture() => Some(&furniture),
            other => other,
        };
        let self_ref = NodeRef::new(NodeKind::Texts, self.texts.len());
        let parent = self.attach(parent, &self_ref);
        let layer = self.layer_of(&parent);
        self.texts.push(TextItem {
            self_ref: self_ref.clone(),
            parent: Some(parent),
            children: Vec::new(),
            content_layer: layer,
            label,
            prov: prov.into_iter().collect(),
            orig: text.clone(),
            text,
            level: None,
            enumerated: None,
            marker: None,
            code_language: None,
        });
        self_ref
    }

    /// Add the document title.
    pub fn add_title(
        &mut self,
        text: impl Into<String>,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        self.add_text(DocItemLabel::Title, text, prov, parent)
    }

    /// Add a section header at `level` (clamped to 1..=6).
    pub fn add_heading(
        &mut self,
        text: impl Into<String>,
        level: u8,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let r = self.add_text(DocItemLabel::SectionHeader, text, prov, parent);
        if let Some(item) = self.text_mut(&r) {
            item.level = Some(level.clamp(1, 6));
        }
        r
    }

    /// Add a list item. `parent` should be a list group.
    pub fn add_list_item(
        &mut self,
        text: impl Into<String>,
        enumerated: bool,
        marker: Option<String>,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let r = self.add_text(DocItemLabel::ListItem, text, prov, parent);
        if let Some(item) = self.text_mut(&r) {
            item.enumerated = Some(enumerated);
            item.marker = marker;
        }
        r
    }

    /// Add a code block.
    pub fn add_code(
        &mut self,
        text: impl Into<String>,
        language: Option<String>,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let r = self.add_text(DocItemLabel::Code, text, prov, parent);
        if let Some(item) = self.text_mut(&r) {
            item.code_language = language;
        }
        r
    }

    /// Add a formula.
    pub fn add_formula(
        &mut self,
        text: impl Into<String>,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        self.add_text(DocItemLabel::Formula, text, prov, parent)
    }

    /// Add a table.
    pub fn add_table(
        &mut self,
        data: TableData,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let self_ref = NodeRef::new(NodeKind::Tables, self.tables.len());
        let parent = self.attach(parent, &self_ref);
        let layer = self.layer_of(&parent);
        self.tables.push(TableItem {
            self_ref: self_ref.clone(),
            parent: Some(parent),
            children: Vec::new(),
            content_layer: layer,
            label: DocItemLabel::Table,
            prov: prov.into_iter().collect(),
            captions: Vec::new(),
            data,
        });
        self_ref
    }

    /// Add a picture.
    pub fn add_picture(
        &mut self,
        image: Option<ImageRef>,
        prov: Option<ProvenanceItem>,
        parent: Option<&NodeRef>,
    ) -> NodeRef {
        let self_ref = NodeRef::new(NodeKind::Pictures, self.pictures.len());
        let parent = self.attach(parent, &self_ref);
        let layer = self.layer_of(&parent);
        self.pictures.push(PictureItem {
            self_ref: self_ref.clone(),
            parent: Some(parent),
            children: Vec::new(),
            content_layer: layer,
            label: DocItemLabel::Picture,
            prov: prov.into_iter().collect(),
            captions: Vec::new(),
            image,
        });
        self_ref
    }

    /// Add a caption owned by a table or picture. The caption becomes a child
    /// of its owner and is listed in the owner's `captions`.
    pub fn add_caption(
        &mut self,
        owner: &NodeRef,
        text: impl Into<String>,
        prov: Option<ProvenanceItem>,
    ) -> Result<NodeRef> {
        let (kind, idx) = owner.parse()?;
        if !matches!(kind, NodeKind::Tables | NodeKind::Pictures) || self.resolve(owner).is_none()
        {
            return Err(Error::InvalidRef(owner.cref.clone()));
        }
        let r = self.add_text(DocItemLabel::Caption, text, prov, Some(owner));
        match kind {
            NodeKind::Tables => self.tables[idx].captions.push(r.clone()),
            _ => self.pictures[idx].captions.push(r.clone()),
        }
        Ok(r)
    }

    /// Link `child` under `parent`, falling back to body for unknown parents.
    /// Returns the effective parent.
    fn attach(&mut self, parent: Option<&NodeRef>, child: &NodeRef) -> NodeRef {
        let parent = parent.cloned().unwrap_or_else(NodeRef::body);
        match self.children_mut(&parent) {
            Some(children) => {
                children.push(child.clone());
                parent
            }
            None => {
                log::warn!("Unknown parent {}, attaching {} to body", parent, child);
                self.body.children.push(child.clone());
                NodeRef::body()
            }
        }
    }

    fn layer_of(&self, r: &NodeRef) -> ContentLayer {
        self.resolve(r)
            .map(|n| n.content_layer())
            .unwrap_or_default()
    }

    fn children_mut(&mut self, r: &NodeRef) -> Option<&mut Vec<NodeRef>> {
        let (kind, idx) = r.parse().ok()?;
        match kind {
            NodeKind::Body => Some(&mut self.body.children),
            NodeKind::Furniture => Some(&mut self.furniture.children),
            NodeKind::Groups => self.groups.get_mut(idx).map(|g| &mut g.children),
            NodeKind::Texts => self.texts.get_mut(idx).map(|t| &mut t.children),
            NodeKind::Tables => self.tables.get_mut(idx).map(|t| &mut t.children),
            NodeKind::Pictures => self.pictures.get_mut(idx).map(|p| &mut p.children),
        }
    }

    fn text_mut(&mut self, r: &NodeRef) -> Option<&mut TextItem> {
        match r.parse().ok()? {
            (NodeKind::Texts, idx) => self.texts.get_mut(idx),
            _ => None,
        }
    }

    // ====== Queries ======

    /// Resolve a reference to a borrowed node.
    pub fn resolve(&self, r: &NodeRef) -> Option<NodeItem<'_>> {
        let (kind, idx) = r.parse().ok()?;
        match kind {
            NodeKind::Body => Some(NodeItem::Group(&self.body)),
            NodeKind::Furniture => Some(NodeItem::Group(&self.furniture)),
            NodeKind::Groups => self.groups.get(idx).map(NodeItem::Group),
            NodeKind::Texts => self.texts.get(idx).map(NodeItem::Text),
            NodeKind::Tables => self.tables.get(idx).map(NodeItem::Table),
            NodeKind::Pictures => self.pictures.get(idx).map(NodeItem::Picture),
        }
    }

    /// Text of the referenced text items, skipping anything that does not resolve.
    pub fn texts_of<'a>(&'a self, refs: &'a [NodeRef]) -> impl Iterator<Item = &'a str> + 'a {
        refs.iter().filter_map(|r| self.resolve(r).and_then(|n| n.text()))
    }

    /// Walk the tree in document order.
    pub fn iterate_items(&self, options: IterOptions) -> ItemIter<'_> {
        ItemIter::new(self, options)
    }

    /// Number of pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Item counts.
    pub fn statistics(&self) -> DocumentStats {
        DocumentStats {
            num_texts: self.texts.len(),
            num_tables: self.tables.len(),
            num_pictures: self.pictures.len(),
            num_groups: self.groups.len(),
            num_pages: self.pages.len(),
        }
    }

    /// Check the tree invariants: pointer shapes, resolvable children,
    /// parent back-links and no node listed twice.
    pub fn validate_tree(&self) -> Result<()> {
        let check_self = |r: &NodeRef, kind: NodeKind, idx: usize| -> Result<()> {
            if *r != NodeRef::new(kind, idx) {
                return Err(Error::InvalidRef(format!(
                    "{} stored at #/{}/{}",
                    r,
                    kind.as_str(),
                    idx
                )));
            }
            Ok(())
        };
        for (i, g) in self.groups.iter().enumerate() {
            check_self(&g.self_ref, NodeKind::Groups, i)?;
        }
        for (i, t) in self.texts.iter().enumerate() {
            check_self(&t.self_ref, NodeKind::Texts, i)?;
        }
        for (i, t) in self.tables.iter().enumerate() {
            check_self(&t.self_ref, NodeKind::Tables, i)?;
        }
        for (i, p) in self.pictures.iter().enumerate() {
            check_self(&p.self_ref, NodeKind::Pictures, i)?;
        }

        let mut seen = HashSet::new();
        let mut stack = vec![NodeItem::Group(&self.body), NodeItem::Group(&self.furniture)];
        while let Some(node) = stack.pop() {
            for child_ref in node.children() {
                if !seen.insert(child_ref) {
                    return Err(Error::InvalidRef(format!("{} listed twice", child_ref)));
                }
                let child = self
                    .resolve(child_ref)
                    .ok_or_else(|| Error::InvalidRef(child_ref.cref.clone()))?;
                if child.parent() != Some(node.self_ref()) {
                    return Err(Error::InvalidRef(format!(
                        "{} has parent {:?}, expected {}",
                        child_ref,
                        child.parent().map(|p| p.cref.as_str()),
                        node.self_ref()
                    )));
                }
                stack.push(child);
            }
        }
        Ok(())
    }
}
