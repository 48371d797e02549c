//! Error types for docmill.

use std::io;
use thiserror::Error;

use crate::detect::InputFormat;

/// Result type alias for docmill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during conversion, export and chunking.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input format could not be recognized.
    #[error("Unknown input format: {0}")]
    UnknownFormat(String),

    /// The input format is recognized but not on the converter's whitelist.
    #[error("Format {0} is not allowed by this converter")]
    FormatNotAllowed(InputFormat),

    /// Error parsing PDF structure.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// A format backend failed to read its input.
    #[error("{format} backend error: {message}")]
    Backend {
        /// The format being read.
        format: InputFormat,
        /// What went wrong.
        message: String,
    },

    /// OCR engine failure (missing binary, bad output).
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Tokenizer could not be loaded or failed to encode.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// HTTP fetch failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// ZIP container error (DOCX, PPTX).
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A `$ref` pointer did not resolve or was malformed.
    #[error("Invalid reference: {0}")]
    InvalidRef(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Input exceeds the configured size limit.
    #[error("Input is {size} bytes, limit is {limit}")]
    FileTooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// Input has more pages than the configured limit.
    #[error("Document has {pages} pages, limit is {limit}")]
    TooManyPages {
        /// Page count of the input.
        pages: u32,
        /// Configured maximum.
        limit: u32,
    },

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a backend error for `format`.
    pub fn backend(format: InputFormat, message: impl Into<String>) -> Self {
        Error::Backend {
            format,
            message: message.into(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::Pdf(err.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );

        let err = Error::FormatNotAllowed(InputFormat::Csv);
        assert_eq!(err.to_string(), "Format csv is not allowed by this converter");

        let err = Error::backend(InputFormat::Docx, "missing word/document.xml");
        assert_eq!(
            err.to_string(),
            "docx backend error: missing word/document.xml"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
