//! # docmill
//!
//! Converts documents (PDF, scanned images, DOCX, PPTX, HTML, AsciiDoc, CSV,
//! Markdown) into one structured [`Document`] model, exports it to Markdown,
//! text, JSON or YAML, and splits it into token-bounded chunks for
//! retrieval.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docmill::{convert_file, export_to_markdown, MarkdownOptions};
//!
//! fn main() -> docmill::Result<()> {
//!     let doc = convert_file("report.pdf")?;
//!     println!("{}", export_to_markdown(&doc, &MarkdownOptions::default()));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Layout analysis**: text blocks, reading order, headings, lists and
//!   tables recovered from PDF glyph positions
//! - **OCR**: scanned pages go through Tesseract
//! - **Declarative backends**: Office and markup formats parsed directly
//! - **Chunking**: structure-aware chunks fitted to a tokenizer budget
//! - **Parallel processing**: Rayon over PDF pages

pub mod backend;
pub mod chunking;
pub mod convert;
pub mod detect;
pub mod error;
pub mod export;
pub mod model;
pub mod ocr;
pub mod pipeline;
pub mod report;

pub use backend::{BackendRegistry, DeclarativeBackend, DocumentMetadata, InputDocument};
pub use chunking::{
    Chunker, DocChunk, DocMeta, HierarchicalChunker, HuggingFaceTokenizer, HybridChunker,
    Tokenizer, WordTokenizer,
};
pub use convert::{
    ConversionResult, ConversionStatus, ConverterConfig, DocumentConverter, DocumentSource,
    ErrorItem, FormatOption,
};
pub use detect::{detect_format_from_bytes, detect_format_from_path, InputFormat};
pub use error::{Error, Result};
pub use export::{
    export_to_indented_text, export_to_json, export_to_markdown, export_to_text, export_to_yaml,
    load_from_json, IndentedTextOptions, JsonFormat, MarkdownOptions,
};
pub use model::{DocItemLabel, Document, IterOptions, NodeRef};
pub use ocr::{OcrEngine, OcrOptions};
pub use pipeline::{PdfBackendKind, PdfPipelineOptions};

use std::path::Path;

/// Convert a file or URL with the default converter.
///
/// # Example
///
/// ```no_run
/// let doc = docmill::convert_file("slides.pptx").unwrap();
/// println!("{} texts", doc.texts.len());
/// ```
pub fn convert_file(source: impl Into<DocumentSource>) -> Result<Document> {
    let result = DocumentConverter::new().convert(source)?;
    Ok(result.document)
}

/// Convert bytes whose format is detected from content and `name`.
pub fn convert_bytes(name: &str, data: Vec<u8>) -> Result<Document> {
    convert_file(DocumentSource::bytes(name, data))
}

/// Convert a file to Markdown.
///
/// # Example
///
/// ```no_run
/// let markdown = docmill::to_markdown("report.pdf").unwrap();
/// std::fs::write("report.md", markdown).unwrap();
/// ```
pub fn to_markdown<P: AsRef<Path>>(path: P) -> Result<String> {
    let doc = convert_file(path.as_ref())?;
    Ok(export_to_markdown(&doc, &MarkdownOptions::default()))
}

/// Convert a file to JSON.
pub fn to_json<P: AsRef<Path>>(path: P, format: JsonFormat) -> Result<String> {
    let doc = convert_file(path.as_ref())?;
    export_to_json(&doc, format)
}

/// Convert a file to YAML.
pub fn to_yaml<P: AsRef<Path>>(path: P) -> Result<String> {
    let doc = convert_file(path.as_ref())?;
    export_to_yaml(&doc)
}

/// Convert on the blocking thread pool.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> docmill::Result<()> {
/// let doc = docmill::convert_file_async("report.pdf").await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "async")]
pub async fn convert_file_async(source: impl Into<DocumentSource>) -> Result<Document> {
    let source = source.into();
    tokio::task::spawn_blocking(move || convert_file(source))
        .await
        .map_err(|e| Error::Other(format!("conversion task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_bytes_markdown() {
        let doc = convert_bytes("notes.md", b"# Notes\n\n- one\n- two\n".to_vec()).unwrap();
        assert_eq!(doc.name, "notes");
        assert_eq!(doc.groups.len(), 1);
        let markdown = export_to_markdown(&doc, &MarkdownOptions::default());
        assert!(markdown.starts_with("# Notes"));
    }

    #[test]
    fn test_convert_bytes_unknown() {
        let result = convert_bytes("blob.bin", vec![0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(Error::UnknownFormat(_))));
    }

    #[test]
    fn test_convert_missing_file() {
        assert!(matches!(
            convert_file("/nonexistent/file.pdf"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_to_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "name,qty\napple,3\n").unwrap();
        let yaml = to_yaml(&path).unwrap();
        assert!(yaml.contains("schema_name: DoclingDocument"));
        assert!(yaml.contains("apple"));
    }
}
