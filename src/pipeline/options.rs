//! PDF pipeline options and configuration.

use serde::{Deserialize, Serialize};

use crate::backend::{
    ImagePageBackend, InputDocument, LopdfBackend, PaginatedBackend, PdfToTextBackend,
};
use crate::detect::InputFormat;
use crate::error::Result;
use crate::export::PageSelection;
use crate::ocr::OcrOptions;

/// Options for the standard PDF pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfPipelineOptions {
    /// Run OCR on pages without enough programmatic text
    pub do_ocr: bool,

    /// Detect tables from aligned text
    pub do_table_structure: bool,

    /// OCR configuration
    pub ocr_options: OcrOptions,

    /// Attach rendered page images to `pages`
    pub generate_page_images: bool,

    /// Keep image bytes on pictures
    pub generate_picture_images: bool,

    /// Render scale for OCR and page images (1.0 = 72 DPI)
    pub images_scale: f32,

    /// Pages to convert
    pub page_range: PageSelection,

    /// Process pages on the rayon pool
    pub parallel: bool,

    /// OCR a page when its embedded bitmaps cover at least this fraction of it
    pub bitmap_area_threshold: f32,
}

impl PdfPipelineOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable OCR.
    pub fn with_ocr(mut self, do_ocr: bool) -> Self {
        self.do_ocr = do_ocr;
        self
    }

    /// Set OCR options.
    pub fn with_ocr_options(mut self, options: OcrOptions) -> Self {
        self.ocr_options = options;
        self
    }

    /// Enable or disable table detection.
    pub fn with_table_structure(mut self, enabled: bool) -> Self {
        self.do_table_structure = enabled;
        self
    }

    /// Keep rendered page images.
    pub fn with_page_images(mut self, enabled: bool) -> Self {
        self.generate_page_images = enabled;
        self
    }

    /// Keep picture bytes.
    pub fn with_picture_images(mut self, enabled: bool) -> Self {
        self.generate_picture_images = enabled;
        self
    }

    /// Set the render scale.
    pub fn with_images_scale(mut self, scale: f32) -> Self {
        self.images_scale = scale.max(0.1);
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.page_range = pages;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the bitmap coverage from which a page is OCRed.
    pub fn with_bitmap_area_threshold(mut self, threshold: f32) -> Self {
        self.bitmap_area_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

impl Default for PdfPipelineOptions {
    fn default() -> Self {
        Self {
            do_ocr: true,
            do_table_structure: true,
            ocr_options: OcrOptions::default(),
            generate_page_images: false,
            generate_picture_images: true,
            images_scale: 2.0,
            page_range: PageSelection::All,
            parallel: true,
            bitmap_area_threshold: 0.05,
        }
    }
}

/// Which reader feeds the PDF pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfBackendKind {
    /// Native content stream interpretation
    #[default]
    Lopdf,
    /// poppler's `pdftotext -bbox`
    PdfToText,
}

impl PdfBackendKind {
    /// Parse a CLI name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lopdf" | "native" => Some(Self::Lopdf),
            "pdftotext" | "poppler" => Some(Self::PdfToText),
            _ => None,
        }
    }

    /// Open a paginated backend for `input`. Image inputs always use the
    /// image backend.
    pub fn open(&self, input: &InputDocument) -> Result<Box<dyn PaginatedBackend>> {
        if input.format == InputFormat::Image {
            return Ok(Box::new(ImagePageBackend::new(input)?));
        }
        Ok(match self {
            Self::Lopdf => Box::new(LopdfBackend::new(input)?),
            Self::PdfToText => Box::new(PdfToTextBackend::new(input)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_options_builder() {
        let options = PdfPipelineOptions::new()
            .with_ocr(false)
            .with_table_structure(false)
            .with_pages(PageSelection::Pages(vec![2]))
            .with_bitmap_area_threshold(2.0)
            .sequential();

        assert!(!options.do_ocr);
        assert!(!options.do_table_structure);
        assert!(!options.parallel);
        assert!(options.page_range.includes(2));
        assert!(!options.page_range.includes(1));
        assert_eq!(options.bitmap_area_threshold, 1.0);
    }

    #[test]
    fn test_default_options() {
        let options = PdfPipelineOptions::default();
        assert!(options.do_ocr);
        assert!(options.do_table_structure);
        assert!(options.parallel);
        assert_eq!(options.bitmap_area_threshold, 0.05);
    }

    #[test]
    fn test_options_from_json() {
        let options: PdfPipelineOptions =
            serde_json::from_str(r#"{"do_ocr": false, "ocr_options": {"lang": ["deu"]}}"#).unwrap();
        assert!(!options.do_ocr);
        assert_eq!(options.ocr_options.lang_arg(), "deu");
        assert!(options.do_table_structure);
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(PdfBackendKind::from_name("pdftotext"), Some(PdfBackendKind::PdfToText));
        assert_eq!(PdfBackendKind::from_name("LOPDF"), Some(PdfBackendKind::Lopdf));
        assert_eq!(PdfBackendKind::from_name("mupdf"), None);
    }
}
