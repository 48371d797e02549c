//! Structured document model.
//!
//! A [`Document`] keeps its items in flat arrays and links them into a tree
//! with [`NodeRef`] pointers, so the JSON form is stable and every item can
//! be addressed as `#/<array>/<index>`.

mod document;
mod items;
mod iter;
mod labels;
mod picture;
mod provenance;
mod refs;
mod table;

pub use document::{
    Document, DocumentOrigin, DocumentStats, PageItem, SCHEMA_NAME, SCHEMA_VERSION,
};
pub use items::{GroupItem, NodeItem, PictureItem, TableItem, TextItem};
pub use iter::{ItemIter, IterOptions};
pub use labels::{ContentLayer, DocItemLabel, GroupLabel};
pub use picture::{detect_mime_type, ImageRef, Size};
pub use provenance::{BoundingBox, CoordOrigin, ProvenanceItem};
pub use refs::{NodeKind, NodeRef};
pub use table::{TableCell, TableData, MAX_SPAN};
