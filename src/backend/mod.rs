//! Per-format readers.
//!
//! Two kinds of backends exist:
//!
//! - [`DeclarativeBackend`]s turn the whole input into a [`Document`] in one
//!   call. Markup and office formats (Markdown, HTML, CSV, DOCX, PPTX,
//!   AsciiDoc) work this way.
//! - [`PaginatedBackend`]s expose pages, text cells and embedded images so the
//!   PDF pipeline can run layout analysis and OCR on them. PDF and image
//!   inputs work this way.
//!
//! # Example
//!
//! ```no_run
//! use docmill::backend::{BackendRegistry, InputDocument};
//! use docmill::InputFormat;
//!
//! fn main() -> docmill::Result<()> {
//!     let registry = BackendRegistry::with_defaults();
//!     let input = InputDocument::new("notes.md", InputFormat::Md, b"# Notes".to_vec());
//!     let doc = registry.convert(&input)?;
//!     assert_eq!(doc.texts.len(), 1);
//!     Ok(())
//! }
//! ```

mod asciidoc;
mod csv;
mod docx;
mod html;
mod image;
mod markdown;
mod pdf;
mod pdftotext;
mod pptx;

pub use self::asciidoc::AsciiDocBackend;
pub use self::csv::{CsvBackend, CsvOptions};
pub use self::docx::DocxBackend;
pub use self::html::HtmlBackend;
pub use self::image::ImagePageBackend;
pub use self::markdown::MarkdownBackend;
pub use self::pdf::{parse_pdf_date, LopdfBackend};
pub use self::pdftotext::PdfToTextBackend;
pub use self::pptx::PptxBackend;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::detect::{mime_type_for, InputFormat};
use crate::error::{Error, Result};
use crate::model::{BoundingBox, Document, DocumentOrigin, ImageRef, Size};
use crate::ocr::PageRasterizer;

/// A loaded input, ready for a backend.
#[derive(Debug, Clone)]
pub struct InputDocument {
    /// File name, including extension
    pub name: String,
    /// Detected format
    pub format: InputFormat,
    /// Raw bytes
    pub bytes: Arc<Vec<u8>>,
    /// MIME type
    pub mimetype: String,
    /// First 8 bytes of the SHA-256 of `bytes`, big endian
    pub hash: u64,
    /// Source URL, when fetched over HTTP
    pub uri: Option<String>,
}

impl InputDocument {
    /// Wrap in-memory bytes.
    pub fn new(name: impl Into<String>, format: InputFormat, bytes: Vec<u8>) -> Self {
        let hash = binary_hash(&bytes);
        let mimetype = mime_type_for(format, &bytes).to_string();
        Self {
            name: name.into(),
            format,
            bytes: Arc::new(bytes),
            mimetype,
            hash,
            uri: None,
        }
    }

    /// Record the URL the bytes were fetched from.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// File name without extension; used as the document name.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Size of the input in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the input has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Origin record for documents built from this input.
    pub fn origin(&self) -> DocumentOrigin {
        DocumentOrigin {
            mimetype: self.mimetype.clone(),
            binary_hash: self.hash,
            filename: self.name.clone(),
            uri: self.uri.clone(),
        }
    }

    /// Empty document named after the input, with its origin filled in.
    pub fn new_document(&self) -> Document {
        Document::new(self.stem()).with_origin(self.origin())
    }

    /// Input bytes as UTF-8 text, lossy, without a leading BOM.
    pub fn text(&self) -> String {
        let bytes = self.bytes.as_slice();
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// First 8 bytes of the SHA-256 digest as a big-endian integer.
pub fn binary_hash(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// A backend that converts a whole input in one call.
pub trait DeclarativeBackend: Send + Sync {
    /// Backend name for logs and error items.
    fn name(&self) -> &'static str;

    /// Formats this backend reads.
    fn supported_formats(&self) -> &[InputFormat];

    /// Convert the input into a document.
    fn convert(&self, input: &InputDocument) -> Result<Document>;

    /// Whether this backend reads `format`.
    fn supports(&self, format: InputFormat) -> bool {
        self.supported_formats().contains(&format)
    }
}

/// Registry of declarative backends keyed by format.
pub struct BackendRegistry {
    by_format: HashMap<InputFormat, Arc<dyn DeclarativeBackend>>,
    by_name: HashMap<&'static str, Arc<dyn DeclarativeBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_format: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry with every built-in declarative backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MarkdownBackend::new()));
        registry.register(Arc::new(HtmlBackend::new()));
        registry.register(Arc::new(CsvBackend::new(CsvOptions::default())));
        registry.register(Arc::new(DocxBackend::new()));
        registry.register(Arc::new(PptxBackend::new()));
        registry.register(Arc::new(AsciiDocBackend::new()));
        registry
    }

    /// Register a backend. Later registrations win for shared formats.
    pub fn register(&mut self, backend: Arc<dyn DeclarativeBackend>) {
        for format in backend.supported_formats() {
            self.by_format.insert(*format, Arc::clone(&backend));
        }
        self.by_name.insert(backend.name(), backend);
    }

    /// Backend for a format.
    pub fn get(&self, format: InputFormat) -> Option<Arc<dyn DeclarativeBackend>> {
        self.by_format.get(&format).cloned()
    }

    /// Backend by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn DeclarativeBackend>> {
        self.by_name.get(name).cloned()
    }

    /// Whether some backend reads `format`.
    pub fn supports(&self, format: InputFormat) -> bool {
        self.by_format.contains_key(&format)
    }

    /// Convert with the backend registered for the input's format.
    pub fn convert(&self, input: &InputDocument) -> Result<Document> {
        let backend = self
            .get(input.format)
            .ok_or_else(|| Error::backend(input.format, "no declarative backend registered"))?;
        log::debug!("Converting {} with {} backend", input.name, backend.name());
        backend.convert(input)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ====== Paginated backends ======

/// A positioned run of text on a page.
///
/// Boxes use a top-left origin in page points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    /// Text content
    pub text: String,
    /// Location on the page
    pub bbox: BoundingBox,
    /// Font size in points
    pub font_size: f32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
    /// Whether the font appears to be bold
    pub is_bold: bool,
    /// Whether the font appears to be italic
    pub is_italic: bool,
    /// Produced by OCR rather than read from the file
    pub from_ocr: bool,
    /// OCR confidence in 0..=1 (1.0 for programmatic text)
    pub confidence: f32,
}

impl TextCell {
    /// Create a programmatic cell.
    pub fn new(text: impl Into<String>, bbox: BoundingBox, font_size: f32, font_name: &str) -> Self {
        let lower = font_name.to_lowercase();
        Self {
            text: text.into(),
            bbox,
            font_size,
            font_name: font_name.to_string(),
            is_bold: lower.contains("bold") || lower.contains("black") || lower.contains("heavy"),
            is_italic: lower.contains("italic") || lower.contains("oblique"),
            from_ocr: false,
            confidence: 1.0,
        }
    }

    /// Create a cell from OCR output. The font size is estimated from the box height.
    pub fn from_ocr(text: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        let font_size = (bbox.height() / 1.2).max(1.0);
        Self {
            from_ocr: true,
            confidence,
            ..Self::new(text, bbox, font_size, "OCR")
        }
    }
}

/// An image placed on a page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Where the image is drawn, top-left origin
    pub bbox: BoundingBox,
    /// Encoded image, when it could be extracted as-is
    pub image: Option<ImageRef>,
}

/// Document-level metadata from the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Format version, e.g. "1.7" for PDF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Total number of pages in the source
    pub page_count: u32,
}

/// A page-oriented reader used by the PDF pipeline.
///
/// Page numbers are 1-based.
pub trait PaginatedBackend: Send + Sync {
    /// Backend name for logs and error items.
    fn name(&self) -> &'static str;

    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Page size in points.
    fn page_size(&self, page_no: u32) -> Result<Size>;

    /// Programmatic text cells of a page.
    fn text_cells(&self, page_no: u32) -> Result<Vec<TextCell>>;

    /// Images placed on a page.
    fn page_images(&self, page_no: u32) -> Result<Vec<PageImage>>;

    /// Render a page to an encoded bitmap at `72 * scale` DPI.
    fn render_page(&self, page_no: u32, scale: f32, rasterizer: &dyn PageRasterizer)
        -> Result<Vec<u8>>;

    /// Source metadata.
    fn metadata(&self) -> DocumentMetadata;

    /// Fail early for out-of-range pages.
    fn check_page(&self, page_no: u32) -> Result<()> {
        let count = self.page_count();
        if page_no == 0 || page_no > count {
            return Err(Error::PageOutOfRange(page_no, count));
        }
        Ok(())
    }
}

/// Cell text helper shared by backends: trims and collapses inner whitespace.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unescaped attribute value by local name (namespace prefix ignored).
pub(crate) fn xml_attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullBackend;

    impl DeclarativeBackend for NullBackend {
        fn name(&self) -> &'static str {
            "null"
        }

        fn supported_formats(&self) -> &[InputFormat] {
            &[InputFormat::Md]
        }

        fn convert(&self, input: &InputDocument) -> Result<Document> {
            Ok(input.new_document())
        }
    }

    #[test]
    fn test_input_document_origin() {
        let input = InputDocument::new("dir/report.final.md", InputFormat::Md, b"abc".to_vec());
        assert_eq!(input.stem(), "report.final");
        assert_eq!(input.mimetype, "text/markdown");
        let origin = input.origin();
        assert_eq!(origin.binary_hash, binary_hash(b"abc"));
        assert_eq!(origin.filename, "dir/report.final.md");
    }

    #[test]
    fn test_binary_hash_is_sha256_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(binary_hash(b"abc"), 0xba7816bf8f01cfea);
    }

    #[test]
    fn test_registry_lookup_and_override() {
        let mut registry = BackendRegistry::with_defaults();
        assert!(registry.supports(InputFormat::Html));
        assert!(!registry.supports(InputFormat::Pdf));
        assert_eq!(registry.get(InputFormat::Md).map(|b| b.name()), Some("markdown"));

        registry.register(Arc::new(NullBackend));
        assert_eq!(registry.get(InputFormat::Md).map(|b| b.name()), Some("null"));
        assert!(registry.get_by_name("null").is_some());
    }

    #[test]
    fn test_registry_missing_backend() {
        let registry = BackendRegistry::new();
        let input = InputDocument::new("a.pdf", InputFormat::Pdf, b"%PDF-1.4".to_vec());
        assert!(matches!(registry.convert(&input), Err(Error::Backend { .. })));
    }

    #[test]
    fn test_text_strips_bom() {
        let input = InputDocument::new("a.csv", InputFormat::Csv, b"\xEF\xBB\xBFa,b".to_vec());
        assert_eq!(input.text(), "a,b");
    }

    #[test]
    fn test_text_cell_font_flags() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let cell = TextCell::new("x", bbox, 12.0, "Helvetica-BoldOblique");
        assert!(cell.is_bold && cell.is_italic);
        let ocr = TextCell::from_ocr("y", BoundingBox::new(0.0, 0.0, 10.0, 12.0), 0.9);
        assert!(ocr.from_ocr);
        assert!((ocr.font_size - 10.0).abs() < 1e-3);
    }
}
