//! Image payloads attached to pictures.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::detect::image_mime_type;
use crate::error::Result;

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels (or points for pages)
    pub width: f32,
    /// Height in pixels (or points for pages)
    pub height: f32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// An image embedded in or rendered from the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    /// MIME type (e.g., "image/png")
    pub mimetype: String,
    /// Resolution the image was rendered or scanned at
    pub dpi: u32,
    /// Pixel dimensions
    pub size: Size,
    /// Where the image was found, if it was referenced rather than embedded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Raw encoded bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ImageRef {
    /// Build an image from encoded bytes, probing its type and dimensions.
    pub fn from_bytes(data: Vec<u8>, dpi: u32) -> Result<Self> {
        let mimetype = detect_mime_type(&data).to_string();
        let (width, height) = image::ImageReader::new(Cursor::new(&data))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Self {
            mimetype,
            dpi,
            size: Size::new(width as f32, height as f32),
            uri: None,
            data,
        })
    }

    /// Image known only by reference (an `<img src>` or `image::` target).
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let mimetype = mime_from_name(&uri).to_string();
        Self {
            mimetype,
            dpi: 72,
            size: Size::default(),
            uri: Some(uri),
            data: Vec::new(),
        }
    }

    /// Whether the image bytes are available.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// File extension based on MIME type.
    pub fn extension(&self) -> &str {
        match self.mimetype.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/tiff" => "tiff",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "bin",
        }
    }

    /// Suggested filename for writing the image out.
    pub fn suggested_filename(&self, id: &str) -> String {
        format!("{}.{}", id, self.extension())
    }
}

/// Detect an image MIME type from magic bytes.
pub fn detect_mime_type(data: &[u8]) -> &'static str {
    image_mime_type(data).unwrap_or("application/octet-stream")
}

fn mime_from_name(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or_default();
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::new(3, 2);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_from_bytes_probes_size() {
        let image = ImageRef::from_bytes(tiny_png(), 72).unwrap();
        assert_eq!(image.mimetype, "image/png");
        assert_eq!(image.size, Size::new(3.0, 2.0));
        assert_eq!(image.extension(), "png");
        assert_eq!(image.suggested_filename("picture-1"), "picture-1.png");
        assert!(image.has_data());
    }

    #[test]
    fn test_from_uri() {
        let image = ImageRef::from_uri("figures/chart.JPG");
        assert_eq!(image.mimetype, "image/jpeg");
        assert!(!image.has_data());
        assert_eq!(image.uri.as_deref(), Some("figures/chart.JPG"));
    }

    #[test]
    fn test_data_not_serialized() {
        let image = ImageRef::from_bytes(tiny_png(), 144).unwrap();
        let json = serde_json::to_value(&image).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["dpi"], 144);
    }

    #[test]
    fn test_detect_mime_type() {
        assert_eq!(detect_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(detect_mime_type(b"nope"), "application/octet-stream");
    }
}
