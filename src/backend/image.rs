//! Raster images as single-page documents.

use super::{DocumentMetadata, InputDocument, PageImage, PaginatedBackend, TextCell};
use crate::error::Result;
use crate::model::{BoundingBox, ImageRef, Size};
use crate::ocr::PageRasterizer;

/// Pixels map to points one to one.
const IMAGE_DPI: u32 = 72;

/// An image input seen as one page with no programmatic text.
///
/// Everything on the page comes from OCR.
#[derive(Debug)]
pub struct ImagePageBackend {
    image: ImageRef,
}

impl ImagePageBackend {
    /// Probe the image and build the page.
    pub fn new(input: &InputDocument) -> Result<Self> {
        let image = ImageRef::from_bytes(input.bytes.to_vec(), IMAGE_DPI)?;
        log::debug!(
            "{}: {}x{} {}",
            input.name,
            image.size.width,
            image.size.height,
            image.mimetype
        );
        Ok(Self { image })
    }

    fn page_bbox(&self) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, self.image.size.width, self.image.size.height)
    }
}

impl PaginatedBackend for ImagePageBackend {
    fn name(&self) -> &'static str {
        "image"
    }

    fn page_count(&self) -> u32 {
        1
    }

    fn page_size(&self, page_no: u32) -> Result<Size> {
        self.check_page(page_no)?;
        Ok(self.image.size)
    }

    fn text_cells(&self, page_no: u32) -> Result<Vec<TextCell>> {
        self.check_page(page_no)?;
        Ok(Vec::new())
    }

    fn page_images(&self, page_no: u32) -> Result<Vec<PageImage>> {
        self.check_page(page_no)?;
        Ok(vec![PageImage {
            bbox: self.page_bbox(),
            image: Some(self.image.clone()),
        }])
    }

    fn render_page(
        &self,
        page_no: u32,
        _scale: f32,
        _rasterizer: &dyn PageRasterizer,
    ) -> Result<Vec<u8>> {
        self.check_page(page_no)?;
        Ok(self.image.data.clone())
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            page_count: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::InputFormat;
    use crate::error::Error;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_single_page_sized_from_pixels() {
        let input = InputDocument::new("scan.png", InputFormat::Image, png(40, 30));
        let backend = ImagePageBackend::new(&input).unwrap();
        assert_eq!(backend.page_count(), 1);
        assert_eq!(backend.page_size(1).unwrap(), Size::new(40.0, 30.0));
        assert!(backend.text_cells(1).unwrap().is_empty());
        assert_eq!(backend.page_images(1).unwrap()[0].bbox.r, 40.0);
        assert!(matches!(backend.page_size(2), Err(Error::PageOutOfRange(2, 1))));
    }

    #[test]
    fn test_rejects_garbage() {
        let input = InputDocument::new("scan.png", InputFormat::Image, b"not an image".to_vec());
        assert!(ImagePageBackend::new(&input).is_err());
    }
}
