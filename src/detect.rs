//! Input format detection.
//!
//! Detection looks at magic bytes first and falls back to the file
//! extension, so a mislabelled PDF or a DOCX without an extension still
//! reaches the right backend.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Input formats understood by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Portable Document Format
    Pdf,
    /// Raster image (PNG, JPEG, TIFF, BMP, GIF, WEBP)
    Image,
    /// Office Open XML word processing document
    Docx,
    /// Office Open XML presentation
    Pptx,
    /// HTML page
    Html,
    /// AsciiDoc markup
    Asciidoc,
    /// Comma (or otherwise) separated values
    Csv,
    /// Markdown
    Md,
}

impl InputFormat {
    /// Every supported format, in declaration order.
    pub const ALL: [InputFormat; 8] = [
        InputFormat::Pdf,
        InputFormat::Image,
        InputFormat::Docx,
        InputFormat::Pptx,
        InputFormat::Html,
        InputFormat::Asciidoc,
        InputFormat::Csv,
        InputFormat::Md,
    ];

    /// File extensions (lowercase, without dot) mapped to this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            InputFormat::Pdf => &["pdf"],
            InputFormat::Image => &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"],
            InputFormat::Docx => &["docx", "docm", "dotx"],
            InputFormat::Pptx => &["pptx", "pptm", "potx"],
            InputFormat::Html => &["html", "htm", "xhtml"],
            InputFormat::Asciidoc => &["adoc", "asciidoc", "asc"],
            InputFormat::Csv => &["csv"],
            InputFormat::Md => &["md", "markdown"],
        }
    }

    /// MIME types associated with this format. The first entry is canonical.
    pub fn mime_types(&self) -> &'static [&'static str] {
        match self {
            InputFormat::Pdf => &["application/pdf"],
            InputFormat::Image => &[
                "image/png",
                "image/jpeg",
                "image/tiff",
                "image/bmp",
                "image/gif",
                "image/webp",
            ],
            InputFormat::Docx => {
                &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
            }
            InputFormat::Pptx => {
                &["application/vnd.openxmlformats-officedocument.presentationml.presentation"]
            }
            InputFormat::Html => &["text/html", "application/xhtml+xml"],
            InputFormat::Asciidoc => &["text/asciidoc"],
            InputFormat::Csv => &["text/csv"],
            InputFormat::Md => &["text/markdown"],
        }
    }

    /// Look up a format by extension (case-insensitive, without dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Parse a format name as used on the command line (`pdf`, `md`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(InputFormat::Pdf),
            "image" | "img" => Some(InputFormat::Image),
            "docx" => Some(InputFormat::Docx),
            "pptx" => Some(InputFormat::Pptx),
            "html" => Some(InputFormat::Html),
            "asciidoc" | "adoc" => Some(InputFormat::Asciidoc),
            "csv" => Some(InputFormat::Csv),
            "md" | "markdown" => Some(InputFormat::Md),
            _ => None,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputFormat::Pdf => "pdf",
            InputFormat::Image => "image",
            InputFormat::Docx => "docx",
            InputFormat::Pptx => "pptx",
            InputFormat::Html => "html",
            InputFormat::Asciidoc => "asciidoc",
            InputFormat::Csv => "csv",
            InputFormat::Md => "md",
        };
        f.write_str(name)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Bytes of the header read when sniffing a file on disk.
const SNIFF_LEN: u64 = 8192;

/// Detect the input format of a file on disk.
///
/// # Example
/// ```no_run
/// use docmill::detect::{detect_format_from_path, InputFormat};
///
/// let format = detect_format_from_path("report.pdf").unwrap();
/// assert_eq!(format, InputFormat::Pdf);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<InputFormat> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut header = Vec::new();
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut header)?;

    // ZIP containers need the central directory, which lives at the end.
    if header.starts_with(ZIP_MAGIC) {
        let data = std::fs::read(path)?;
        return detect_format_from_bytes(&data, &name);
    }
    detect_format_from_bytes(&header, &name)
}

/// Detect the input format from in-memory data and an optional file name.
pub fn detect_format_from_bytes(data: &[u8], name: &str) -> Result<InputFormat> {
    if let Some(format) = sniff_magic(data) {
        return Ok(format);
    }

    let by_ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(InputFormat::from_extension);
    if let Some(format) = by_ext {
        return Ok(format);
    }

    if looks_like_html(data) {
        return Ok(InputFormat::Html);
    }

    Err(Error::UnknownFormat(if name.is_empty() {
        "<unnamed input>".to_string()
    } else {
        name.to_string()
    }))
}

fn sniff_magic(data: &[u8]) -> Option<InputFormat> {
    if is_pdf(data) {
        return Some(InputFormat::Pdf);
    }
    if image_mime_type(data).is_some() {
        return Some(InputFormat::Image);
    }
    if data.starts_with(ZIP_MAGIC) {
        return sniff_ooxml(data);
    }
    None
}

/// Tell DOCX and PPTX apart by their main part.
fn sniff_ooxml(data: &[u8]) -> Option<InputFormat> {
    let archive = zip::ZipArchive::new(Cursor::new(data)).ok()?;
    let mut names = archive.file_names();
    names.find_map(|name| match name {
        "word/document.xml" => Some(InputFormat::Docx),
        "ppt/presentation.xml" => Some(InputFormat::Pptx),
        _ => None,
    })
}

fn looks_like_html(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(512)]).to_ascii_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Check if bytes start with a PDF header.
pub fn is_pdf(data: &[u8]) -> bool {
    data.len() >= PDF_MAGIC.len() + 3 && data.starts_with(PDF_MAGIC)
}

/// MIME type of a raster image, detected from magic bytes.
pub fn image_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if data.starts_with(b"BM") && data.len() > 14 {
        Some("image/bmp")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Best MIME type for an input of `format` with content `data`.
pub fn mime_type_for(format: InputFormat, data: &[u8]) -> &'static str {
    if format == InputFormat::Image {
        if let Some(mime) = image_mime_type(data) {
            return mime;
        }
    }
    format.mime_types()[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entry: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(entry, options).unwrap();
            zip.write_all(b"<xml/>").unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_detect_pdf_by_magic() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        assert_eq!(
            detect_format_from_bytes(data, "misnamed.txt").unwrap(),
            InputFormat::Pdf
        );
        assert!(is_pdf(data));
        assert!(!is_pdf(b"%PDF-"));
    }

    #[test]
    fn test_detect_images() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(detect_format_from_bytes(&png, "").unwrap(), InputFormat::Image);
        assert_eq!(image_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(mime_type_for(InputFormat::Image, &png), "image/png");
    }

    #[test]
    fn test_detect_ooxml() {
        let docx = zip_with("word/document.xml");
        assert_eq!(detect_format_from_bytes(&docx, "").unwrap(), InputFormat::Docx);

        let pptx = zip_with("ppt/presentation.xml");
        assert_eq!(detect_format_from_bytes(&pptx, "deck").unwrap(), InputFormat::Pptx);
    }

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(
            detect_format_from_bytes(b"a|b\n1|2\n", "csv-pipe.csv").unwrap(),
            InputFormat::Csv
        );
        assert_eq!(
            detect_format_from_bytes(b"= Title\n", "doc.ADOC").unwrap(),
            InputFormat::Asciidoc
        );
        assert_eq!(
            detect_format_from_bytes(b"# Hi", "README.md").unwrap(),
            InputFormat::Md
        );
    }

    #[test]
    fn test_detect_html_without_extension() {
        let data = b"  <!DOCTYPE html><html><body>x</body></html>";
        assert_eq!(detect_format_from_bytes(data, "page").unwrap(), InputFormat::Html);
    }

    #[test]
    fn test_detect_unknown() {
        let result = detect_format_from_bytes(b"plain words", "notes.xyz");
        assert!(matches!(result, Err(Error::UnknownFormat(name)) if name == "notes.xyz"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(InputFormat::from_name("MD"), Some(InputFormat::Md));
        assert_eq!(InputFormat::from_name("adoc"), Some(InputFormat::Asciidoc));
        assert_eq!(InputFormat::from_name("xlsx"), None);
        assert_eq!(InputFormat::Pptx.to_string(), "pptx");
        assert_eq!(InputFormat::from_extension("JPEG"), Some(InputFormat::Image));
    }
}
