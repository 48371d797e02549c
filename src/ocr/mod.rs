//! Optical character recognition for scanned pages.
//!
//! The PDF pipeline renders a page with a [`PageRasterizer`], hands the
//! bitmap to an [`OcrEngine`] and merges the returned [`OcrCell`]s with the
//! page's programmatic text. Both seams are traits so tests (and callers
//! with their own engines) can swap them out.

mod rasterize;
mod tesseract;

pub use self::rasterize::{PdftoppmRasterizer, PDFTOPPM_ENV};
pub use self::tesseract::{parse_tsv, TesseractCliOcr, TESSERACT_ENV};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::BoundingBox;

/// A line of recognized text.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrCell {
    /// Recognized text
    pub text: String,
    /// Confidence in 0..=1
    pub confidence: f32,
    /// Location in page points, top-left origin
    pub bbox: BoundingBox,
}

/// An OCR engine.
pub trait OcrEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Recognize text in an encoded bitmap rendered at `72 * scale` DPI.
    ///
    /// Returned boxes are in page points (pixel coordinates divided by
    /// `scale`).
    fn recognize(&self, image: &[u8], scale: f32) -> Result<Vec<OcrCell>>;
}

/// Renders PDF pages to bitmaps.
pub trait PageRasterizer: Send + Sync {
    /// Rasterizer name for logs.
    fn name(&self) -> &'static str;

    /// Render page `page_no` (1-based) of `pdf` to PNG at `dpi`.
    fn rasterize(&self, pdf: &[u8], page_no: u32, dpi: u32) -> Result<Vec<u8>>;
}

/// OCR configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrOptions {
    /// Tesseract language codes, joined with `+`
    pub lang: Vec<String>,
    /// OCR every page and drop its programmatic text
    pub force_full_page_ocr: bool,
    /// Tesseract binary
    pub tesseract_cmd: String,
    /// Page segmentation mode (`--psm`)
    pub psm: Option<u8>,
    /// Lines below this confidence (0..=1) are dropped
    pub min_confidence: f32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            lang: vec!["eng".to_string()],
            force_full_page_ocr: false,
            tesseract_cmd: std::env::var(TESSERACT_ENV).unwrap_or_else(|_| "tesseract".to_string()),
            psm: None,
            min_confidence: 0.0,
        }
    }
}

impl OcrOptions {
    /// Set the languages.
    pub fn with_lang<I, S>(mut self, lang: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lang = lang.into_iter().map(Into::into).collect();
        self
    }

    /// OCR every page regardless of its text layer.
    pub fn force_full_page(mut self) -> Self {
        self.force_full_page_ocr = true;
        self
    }

    /// Set the page segmentation mode.
    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = Some(psm);
        self
    }

    /// Set the minimum line confidence.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// Language argument for `-l`.
    pub fn lang_arg(&self) -> String {
        if self.lang.is_empty() {
            "eng".to_string()
        } else {
            self.lang.join("+")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_options_builder() {
        let options = OcrOptions::default()
            .with_lang(["eng", "deu"])
            .with_psm(6)
            .with_min_confidence(1.5)
            .force_full_page();
        assert_eq!(options.lang_arg(), "eng+deu");
        assert_eq!(options.psm, Some(6));
        assert_eq!(options.min_confidence, 1.0);
        assert!(options.force_full_page_ocr);
    }

    #[test]
    fn test_ocr_options_deserialize_defaults() {
        let options: OcrOptions = serde_json::from_str(r#"{"lang": ["fra"]}"#).unwrap();
        assert_eq!(options.lang_arg(), "fra");
        assert!(!options.force_full_page_ocr);
        assert!(!options.tesseract_cmd.is_empty());
    }
}
