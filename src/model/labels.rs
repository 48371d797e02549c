//! Item and group labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic label of a document item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocItemLabel {
    Title,
    SectionHeader,
    Paragraph,
    Text,
    ListItem,
    Caption,
    Footnote,
    PageHeader,
    PageFooter,
    Code,
    Formula,
    Reference,
    CheckboxSelected,
    CheckboxUnselected,
    Table,
    Picture,
    DocumentIndex,
}

impl DocItemLabel {
    /// Wire name (`section_header`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DocItemLabel::Title => "title",
            DocItemLabel::SectionHeader => "section_header",
            DocItemLabel::Paragraph => "paragraph",
            DocItemLabel::Text => "text",
            DocItemLabel::ListItem => "list_item",
            DocItemLabel::Caption => "caption",
            DocItemLabel::Footnote => "footnote",
            DocItemLabel::PageHeader => "page_header",
            DocItemLabel::PageFooter => "page_footer",
            DocItemLabel::Code => "code",
            DocItemLabel::Formula => "formula",
            DocItemLabel::Reference => "reference",
            DocItemLabel::CheckboxSelected => "checkbox_selected",
            DocItemLabel::CheckboxUnselected => "checkbox_unselected",
            DocItemLabel::Table => "table",
            DocItemLabel::Picture => "picture",
            DocItemLabel::DocumentIndex => "document_index",
        }
    }

    /// Labels that belong in the furniture layer.
    pub fn is_furniture(&self) -> bool {
        matches!(self, DocItemLabel::PageHeader | DocItemLabel::PageFooter)
    }

    /// Labels that start or continue the heading hierarchy.
    pub fn is_heading(&self) -> bool {
        matches!(self, DocItemLabel::Title | DocItemLabel::SectionHeader)
    }
}

impl fmt::Display for DocItemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of a grouping node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupLabel {
    #[default]
    Unspecified,
    List,
    OrderedList,
    Chapter,
    Section,
    Sheet,
    Slide,
    FormArea,
    KeyValueArea,
    CommentSection,
    Inline,
    PictureArea,
}

impl GroupLabel {
    /// Wire name (`ordered_list`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLabel::Unspecified => "unspecified",
            GroupLabel::List => "list",
            GroupLabel::OrderedList => "ordered_list",
            GroupLabel::Chapter => "chapter",
            GroupLabel::Section => "section",
            GroupLabel::Sheet => "sheet",
            GroupLabel::Slide => "slide",
            GroupLabel::FormArea => "form_area",
            GroupLabel::KeyValueArea => "key_value_area",
            GroupLabel::CommentSection => "comment_section",
            GroupLabel::Inline => "inline",
            GroupLabel::PictureArea => "picture_area",
        }
    }

    /// Whether this group holds list items.
    pub fn is_list(&self) -> bool {
        matches!(self, GroupLabel::List | GroupLabel::OrderedList)
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer an item is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentLayer {
    #[default]
    Body,
    Furniture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for label in [
            DocItemLabel::SectionHeader,
            DocItemLabel::CheckboxUnselected,
            DocItemLabel::PageFooter,
        ] {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
        }
        let json = serde_json::to_string(&GroupLabel::OrderedList).unwrap();
        assert_eq!(json, "\"ordered_list\"");
    }

    #[test]
    fn test_predicates() {
        assert!(DocItemLabel::PageHeader.is_furniture());
        assert!(!DocItemLabel::Text.is_furniture());
        assert!(DocItemLabel::Title.is_heading());
        assert!(GroupLabel::OrderedList.is_list());
        assert!(!GroupLabel::Slide.is_list());
    }
}
