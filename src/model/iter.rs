//! Depth-first traversal in document order.

use super::{Document, NodeItem, NodeRef};

/// Options for [`Document::iterate_items`].
#[derive(Debug, Clone, Default)]
pub struct IterOptions {
    /// Also yield group nodes (including the root)
    pub with_groups: bool,
    /// Descend into picture children
    pub traverse_pictures: bool,
    /// Only yield items with provenance on this page
    pub page_no: Option<u32>,
    /// Walk the furniture root before the body
    pub include_furniture: bool,
}

impl IterOptions {
    /// Default options: content items only, body only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield groups as well.
    pub fn with_groups(mut self) -> Self {
        self.with_groups = true;
        self
    }

    /// Descend into pictures.
    pub fn traverse_pictures(mut self) -> Self {
        self.traverse_pictures = true;
        self
    }

    /// Restrict to one page.
    pub fn page(mut self, page_no: u32) -> Self {
        self.page_no = Some(page_no);
        self
    }

    /// Include page headers and footers.
    pub fn include_furniture(mut self) -> Self {
        self.include_furniture = true;
        self
    }
}

/// Iterator over `(item, level)` pairs.
///
/// The level counts yielded ancestors, so without groups the children of
/// a list sit at the same level as the paragraphs around the list.
pub struct ItemIter<'a> {
    doc: &'a Document,
    options: IterOptions,
    stack: Vec<(NodeItem<'a>, usize)>,
}

impl<'a> ItemIter<'a> {
    pub(crate) fn new(doc: &'a Document, options: IterOptions) -> Self {
        let mut stack = vec![(NodeItem::Group(&doc.body), 0)];
        if options.include_furniture {
            stack.push((NodeItem::Group(&doc.furniture), 0));
        }
        Self {
            doc,
            options,
            stack,
        }
    }

    fn should_yield(&self, node: &NodeItem<'a>) -> bool {
        if node.is_group() {
            return self.options.with_groups;
        }
        match self.options.page_no {
            Some(page) => node.on_page(page),
            None => true,
        }
    }

    fn push_children(&mut self, children: &'a [NodeRef], level: usize) {
        for child_ref in children.iter().rev() {
            match self.doc.resolve(child_ref) {
                Some(child) => self.stack.push((child, level)),
                None => log::warn!("Dangling reference {} skipped", child_ref),
            }
        }
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = (NodeItem<'a>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, level)) = self.stack.pop() {
            let yielded = self.should_yield(&node);
            let descend = self.options.traverse_pictures || !matches!(node, NodeItem::Picture(_));
            if descend {
                let child_level = if yielded { level + 1 } else { level };
                self.push_children(node.children(), child_level);
            }
            if yielded {
                return Some((node, level));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, DocItemLabel, ProvenanceItem};

    fn sample() -> Document {
        let mut doc = Document::new("sample");
        doc.add_title("Title", None, None);
        let list = doc.add_list_group(false, None);
        doc.add_list_item("one", false, None, None, Some(&list));
        doc.add_list_item("two", false, None, None, Some(&list));
        let pic = doc.add_picture(None, None, None);
        doc.add_caption(&pic, "Figure 1", None).unwrap();
        doc.add_text(DocItemLabel::PageFooter, "page 1", None, None);
        doc.add_text(DocItemLabel::Text, "after", None, None);
        doc
    }

    fn labels(doc: &Document, options: IterOptions) -> Vec<(String, usize)> {
        doc.iterate_items(options)
            .map(|(n, l)| (n.label_name().to_string(), l))
            .collect()
    }

    #[test]
    fn test_default_iteration() {
        let doc = sample();
        assert_eq!(
            labels(&doc, IterOptions::new()),
            vec![
                ("title".into(), 0),
                ("list_item".into(), 0),
                ("list_item".into(), 0),
                ("picture".into(), 0),
                ("text".into(), 0),
            ]
        );
    }

    #[test]
    fn test_with_groups_and_pictures() {
        let doc = sample();
        let items = labels(&doc, IterOptions::new().with_groups().traverse_pictures());
        assert_eq!(items[0], ("unspecified".into(), 0));
        assert_eq!(items[1], ("title".into(), 1));
        assert_eq!(items[2], ("list".into(), 1));
        assert_eq!(items[3], ("list_item".into(), 2));
        assert_eq!(items[5], ("picture".into(), 1));
        assert_eq!(items[6], ("caption".into(), 2));
    }

    #[test]
    fn test_furniture_first() {
        let doc = sample();
        let items = labels(&doc, IterOptions::new().include_furniture());
        assert_eq!(items[0], ("page_footer".into(), 0));
        assert_eq!(items.len(), 6);
    }

    #[test]
    fn test_page_filter() {
        let mut doc = Document::new("d");
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        doc.add_text(DocItemLabel::Text, "p1", Some(ProvenanceItem::new(1, bbox, 2)), None);
        doc.add_text(DocItemLabel::Text, "p2", Some(ProvenanceItem::new(2, bbox, 2)), None);
        let texts: Vec<&str> = doc
            .iterate_items(IterOptions::new().page(2))
            .filter_map(|(n, _)| n.text())
            .collect();
        assert_eq!(texts, vec!["p2"]);
    }
}
