//! Where inputs come from: files, URLs or memory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::InputDocument;
use crate::detect::detect_format_from_bytes;
use crate::error::{Error, Result};

/// Name used when a URL carries no usable file name.
const FALLBACK_NAME: &str = "download";

/// An input to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Local file
    Path(PathBuf),
    /// `http(s)` URL, fetched on conversion
    Url(String),
    /// In-memory bytes with a file name (used for format detection)
    Bytes {
        /// File name, extension included
        name: String,
        /// Raw bytes
        data: Vec<u8>,
    },
}

impl DocumentSource {
    /// Wrap in-memory bytes.
    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            name: name.into(),
            data,
        }
    }

    /// Display name: the path, URL or file name.
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    /// Whether the source must be fetched over HTTP.
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Read the bytes and detect the format.
    ///
    /// `max_file_size` is checked before the body is read whenever the size
    /// is known up front.
    pub fn load(&self, timeout: Option<Duration>, max_file_size: Option<u64>) -> Result<InputDocument> {
        match self {
            Self::Path(path) => load_path(path, max_file_size),
            Self::Url(url) => fetch_url(url, timeout, max_file_size),
            Self::Bytes { name, data } => {
                check_size(data.len() as u64, max_file_size)?;
                let format = detect_format_from_bytes(data, name)?;
                Ok(InputDocument::new(name.clone(), format, data.clone()))
            }
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<&str> for DocumentSource {
    fn from(s: &str) -> Self {
        if is_url(s) {
            Self::Url(s.to_string())
        } else {
            Self::Path(PathBuf::from(s))
        }
    }
}

impl From<String> for DocumentSource {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// Whether a string is an `http(s)` URL.
pub fn is_url(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn check_size(size: u64, limit: Option<u64>) -> Result<()> {
    match limit {
        Some(limit) if size > limit => Err(Error::FileTooLarge { size, limit }),
        _ => Ok(()),
    }
}

fn load_path(path: &Path, max_file_size: Option<u64>) -> Result<InputDocument> {
    let size = std::fs::metadata(path)?.len();
    check_size(size, max_file_size)?;
    let data = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let format = detect_format_from_bytes(&data, &name)?;
    log::debug!("Loaded {} ({} bytes, {})", path.display(), data.len(), format);
    Ok(InputDocument::new(name, format, data))
}

fn fetch_url(url: &str, timeout: Option<Duration>, max_file_size: Option<u64>) -> Result<InputDocument> {
    log::info!("Downloading {}", url);
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(concat!("docmill/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    let response = client.get(url).send().map_err(|e| {
        if e.is_timeout() {
            Error::Http(format!("GET {url}: timed out"))
        } else {
            Error::Http(format!("GET {url}: {e}"))
        }
    })?;
    if !response.status().is_success() {
        return Err(Error::Http(format!("HTTP {} for {url}", response.status())));
    }
    if let Some(length) = response.content_length() {
        check_size(length, max_file_size)?;
    }

    let name = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_content_disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    let data = response.bytes()?.to_vec();
    check_size(data.len() as u64, max_file_size)?;
    let format = detect_format_from_bytes(&data, &name)?;
    log::debug!("Fetched {} as {} ({} bytes, {})", url, name, data.len(), format);
    Ok(InputDocument::new(name, format, data).with_uri(url))
}

/// File name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987) wins over `filename`.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for part in value.split(';').map(str::trim) {
        let Some((key, val)) = part.split_once('=') else {
            continue;
        };
        let val = val.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'lang'percent-encoded
                let encoded = val.rsplit('\'').next().unwrap_or(val);
                extended = Some(percent_decode(encoded));
            }
            "filename" => plain = Some(val.to_string()),
            _ => {}
        }
    }
    extended
        .or(plain)
        .map(|n| base_name(&n).to_string())
        .filter(|n| !n.is_empty())
}

/// Last non-empty path segment of a URL.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    Some(percent_decode(last))
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::InputFormat;
    use std::io::Write;

    #[test]
    fn test_source_from_str() {
        assert!(DocumentSource::from("https://example.com/a.pdf").is_url());
        assert!(DocumentSource::from("HTTP://example.com/a.pdf").is_url());
        assert_eq!(
            DocumentSource::from("docs/a.pdf"),
            DocumentSource::Path(PathBuf::from("docs/a.pdf"))
        );
        assert!(!is_url("ftp://example.com/a.pdf"));
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            filename_from_content_disposition(
                "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''Q3%20report.pdf"
            ),
            Some("Q3 report.pdf".to_string())
        );
        assert_eq!(
            filename_from_content_disposition("inline; filename=../../etc/passwd"),
            Some("passwd".to_string())
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://arxiv.org/pdf/2408.09869v5.pdf?download=1"),
            Some("2408.09869v5.pdf".to_string())
        );
        assert_eq!(
            filename_from_url("https://example.com/docs/my%20file.docx/"),
            Some("my file.docx".to_string())
        );
        assert_eq!(filename_from_url("https://example.com/"), None);
    }

    #[test]
    fn test_load_path_and_size_limit() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        file.write_all(b"# Heading\n\nSome text.").unwrap();
        let source = DocumentSource::from(file.path());

        let input = source.load(None, None).unwrap();
        assert_eq!(input.format, InputFormat::Md);
        assert_eq!(input.len(), 21);

        assert!(matches!(
            source.load(None, Some(10)),
            Err(Error::FileTooLarge { size: 21, limit: 10 })
        ));
    }

    #[test]
    fn test_load_bytes_and_missing_file() {
        let source = DocumentSource::bytes("table.csv", b"a,b\n1,2\n".to_vec());
        assert_eq!(source.load(None, None).unwrap().format, InputFormat::Csv);

        let missing = DocumentSource::from("/nonexistent/dir/file.pdf");
        assert!(matches!(missing.load(None, None), Err(Error::Io(_))));
    }
}
