//! PDF backend delegating text extraction to poppler's `pdftotext -bbox`.

use std::io::{ErrorKind, Write};
use std::process::Command;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{xml_attr, DocumentMetadata, InputDocument, PageImage, PaginatedBackend, TextCell};
use crate::detect::InputFormat;
use crate::error::{Error, Result};
use crate::model::{BoundingBox, Size};
use crate::ocr::PageRasterizer;

/// Environment variable overriding the `pdftotext` binary.
pub const PDFTOTEXT_ENV: &str = "PDFTOTEXT_CMD";

#[derive(Debug, Clone)]
struct BboxPage {
    size: Size,
    words: Vec<TextCell>,
}

/// Word boxes from `pdftotext -bbox`, read once when the backend is created.
#[derive(Debug)]
pub struct PdfToTextBackend {
    pages: Vec<BboxPage>,
    data: Arc<Vec<u8>>,
}

impl PdfToTextBackend {
    /// Run `pdftotext` over the input.
    pub fn new(input: &InputDocument) -> Result<Self> {
        let cmd = std::env::var(PDFTOTEXT_ENV).unwrap_or_else(|_| "pdftotext".to_string());
        let mut tmp = tempfile::NamedTempFile::new()?;
        tmp.write_all(&input.bytes)?;
        tmp.flush()?;

        let output = Command::new(&cmd)
            .arg("-bbox")
            .arg("-enc")
            .arg("UTF-8")
            .arg(tmp.path())
            .arg("-")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::backend(
                    InputFormat::Pdf,
                    format!("{} not found; install poppler-utils or set {}", cmd, PDFTOTEXT_ENV),
                ),
                _ => Error::Io(e),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::backend(
                InputFormat::Pdf,
                format!("{} failed: {}", cmd, stderr.trim()),
            ));
        }

        let pages = parse_bbox_html(&String::from_utf8_lossy(&output.stdout))?;
        log::debug!("{}: pdftotext returned {} pages", input.name, pages.len());
        Ok(Self {
            pages,
            data: Arc::clone(&input.bytes),
        })
    }

    fn page(&self, page_no: u32) -> Result<&BboxPage> {
        self.check_page(page_no)?;
        self.pages
            .get(page_no as usize - 1)
            .ok_or(Error::PageOutOfRange(page_no, self.pages.len() as u32))
    }
}

impl PaginatedBackend for PdfToTextBackend {
    fn name(&self) -> &'static str {
        "pdftotext"
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_no: u32) -> Result<Size> {
        Ok(self.page(page_no)?.size)
    }

    fn text_cells(&self, page_no: u32) -> Result<Vec<TextCell>> {
        Ok(self.page(page_no)?.words.clone())
    }

    fn page_images(&self, page_no: u32) -> Result<Vec<PageImage>> {
        self.page(page_no)?;
        Ok(Vec::new())
    }

    fn render_page(
        &self,
        page_no: u32,
        scale: f32,
        rasterizer: &dyn PageRasterizer,
    ) -> Result<Vec<u8>> {
        self.check_page(page_no)?;
        let dpi = (72.0 * scale).round().max(1.0) as u32;
        rasterizer.rasterize(&self.data, page_no, dpi)
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            page_count: self.page_count(),
            ..Default::default()
        }
    }
}

/// Parse the XHTML written by `pdftotext -bbox`.
///
/// ```text
/// <page width="612.000000" height="792.000000">
///   <word xMin="72.0" yMin="70.1" xMax="110.4" yMax="82.1">Hello</word>
/// </page>
/// ```
fn parse_bbox_html(html: &str) -> Result<Vec<BboxPage>> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().trim_text(true);

    let mut pages = Vec::new();
    let mut page: Option<BboxPage> = None;
    let mut word: Option<(BoundingBox, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"page" => {
                    let num = |k: &[u8]| xml_attr(&e, k).and_then(|v| v.parse::<f32>().ok());
                    let size = Size::new(num(b"width").unwrap_or(612.0), num(b"height").unwrap_or(792.0));
                    page = Some(BboxPage {
                        size,
                        words: Vec::new(),
                    });
                }
                b"word" => {
                    let num = |k: &[u8]| {
                        xml_attr(&e, k)
                            .and_then(|v| v.parse::<f32>().ok())
                            .unwrap_or(0.0)
                    };
                    let bbox = BoundingBox::new(num(b"xMin"), num(b"yMin"), num(b"xMax"), num(b"yMax"));
                    word = Some((bbox, String::new()));
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some((_, text)) = word.as_mut() {
                    text.push_str(&t.unescape().map_err(|e| Error::Xml(e.to_string()))?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"word" => {
                    if let (Some(page), Some((bbox, text))) = (page.as_mut(), word.take()) {
                        if !text.trim().is_empty() {
                            let font_size = bbox.height().max(1.0);
                            page.words.push(TextCell::new(text, bbox, font_size, ""));
                        }
                    }
                }
                b"page" => {
                    if let Some(done) = page.take() {
                        pages.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title></title>
<meta name="Producer" content="LibreOffice"/>
</head>
<body>
<doc>
  <page width="595.304000" height="841.890000">
    <word xMin="56.800000" yMin="57.208000" xMax="98.740000" yMax="71.008000">Profit</word>
    <word xMin="101.500000" yMin="57.208000" xMax="130.000000" yMax="71.008000">&amp;</word>
  </page>
  <page width="595.304000" height="841.890000">
  </page>
</doc>
</body>
</html>"#;

    #[test]
    fn test_parse_bbox_html() {
        let pages = parse_bbox_html(SAMPLE).unwrap();
        assert_eq!(pages.len(), 2);
        assert!((pages[0].size.height - 841.89).abs() < 1e-3);
        let words = &pages[0].words;
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Profit");
        assert_eq!(words[1].text, "&");
        assert!((words[0].bbox.t - 57.208).abs() < 1e-3);
        assert!((words[0].font_size - 13.8).abs() < 1e-3);
        assert!(pages[1].words.is_empty());
    }
}
