//! Conversion pipelines.
//!
//! A pipeline turns a loaded [`InputDocument`] into a [`Document`]. Markup
//! and office formats go through [`SimplePipeline`], which hands the whole
//! input to a declarative backend. PDF and image inputs go through
//! [`StandardPdfPipeline`], which works page by page:
//!
//! 1. text cells from the backend, sanitized
//! 2. OCR for pages with too little text
//! 3. layout analysis into columns, lines and blocks
//! 4. table detection from aligned cells
//! 5. assembly into document items

mod assemble;
mod layout;
mod options;
mod sanitize;
mod simple;
mod standard_pdf;
mod table_structure;

pub use self::assemble::{assemble, PageLayout};
pub use self::layout::{
    is_caption, split_list_marker, BlockKind, Column, FontStatistics, LayoutAnalyzer, LayoutBlock,
    MarginBand, PageElement, TextLine, MARGIN_BAND,
};
pub use self::options::{PdfBackendKind, PdfPipelineOptions};
pub use self::sanitize::{is_page_number, join_lines, sanitize_cell};
pub use self::simple::SimplePipeline;
pub use self::standard_pdf::StandardPdfPipeline;
pub use self::table_structure::{DetectedTable, TableDetector, TableDetectorConfig, TableRow};

use crate::backend::{DocumentMetadata, InputDocument};
use crate::convert::{ErrorItem, Timings};
use crate::error::Result;
use crate::model::Document;

/// What a pipeline produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The converted document
    pub document: Document,
    /// Recoverable failures (usually per page)
    pub errors: Vec<ErrorItem>,
    /// Per-stage durations
    pub timings: Timings,
    /// Source metadata, for paginated inputs
    pub metadata: Option<DocumentMetadata>,
}

impl PipelineOutput {
    /// Output with no errors or timings.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            errors: Vec::new(),
            timings: Timings::new(),
            metadata: None,
        }
    }
}

/// A conversion pipeline.
pub trait Pipeline: Send + Sync {
    /// Pipeline name for logs.
    fn name(&self) -> &'static str;

    /// Convert one input.
    ///
    /// Returns `Err` when nothing could be converted. Page-level failures
    /// are reported through [`PipelineOutput::errors`].
    fn execute(&self, input: &InputDocument) -> Result<PipelineOutput>;
}
