//! PDF reader built on lopdf.
//!
//! Content streams are interpreted just far enough to recover positioned
//! text runs (with font name and effective size) and image placements. The
//! layout stage downstream turns those into lines and blocks.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::{DocumentMetadata, InputDocument, PageImage, PaginatedBackend, TextCell};
use crate::error::{Error, Result};
use crate::model::{BoundingBox, ImageRef, Size};
use crate::ocr::PageRasterizer;

/// US Letter, used when a page has no MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;
/// TJ adjustments (thousandths of an em) above this become word spaces.
const TJ_SPACE_THRESHOLD: f32 = 200.0;
/// Limit on `/Parent` hops when looking up inherited page attributes.
const MAX_INHERIT_DEPTH: usize = 32;

/// PDF backend using lopdf.
pub struct LopdfBackend {
    doc: LopdfDocument,
    data: Arc<Vec<u8>>,
    pages: BTreeMap<u32, ObjectId>,
}

impl std::fmt::Debug for LopdfBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfBackend")
            .field("version", &self.doc.version)
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl LopdfBackend {
    /// Load a PDF from the input bytes.
    pub fn new(input: &InputDocument) -> Result<Self> {
        let doc = LopdfDocument::load_mem(&input.bytes).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::from(e),
        })?;
        if doc.is_encrypted() {
            log::warn!("{} is encrypted; text may be unreadable", input.name);
        }
        let pages = doc.get_pages();
        log::debug!("{}: PDF {} with {} pages", input.name, doc.version, pages.len());
        Ok(Self {
            doc,
            data: Arc::clone(&input.bytes),
            pages,
        })
    }

    fn page_id(&self, page_no: u32) -> Result<ObjectId> {
        self.pages
            .get(&page_no)
            .copied()
            .ok_or(Error::PageOutOfRange(page_no, self.pages.len() as u32))
    }

    /// Follow a reference, if `obj` is one.
    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj)? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Page attribute, inherited through the page tree.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut dict = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERIT_DEPTH {
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let Some(Object::Array(array)) = self.inherited(page_id, b"MediaBox") else {
            return DEFAULT_MEDIA_BOX;
        };
        if array.len() < 4 {
            return DEFAULT_MEDIA_BOX;
        }
        let mut rect = DEFAULT_MEDIA_BOX;
        for (slot, obj) in rect.iter_mut().zip(array.iter()) {
            if let Some(v) = self.resolve(obj).and_then(get_number) {
                *slot = v;
            }
        }
        [
            rect[0].min(rect[2]),
            rect[1].min(rect[3]),
            rect[0].max(rect[2]),
            rect[1].max(rect[3]),
        ]
    }

    /// Page content stream; multiple streams are joined with a space.
    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r)? {
                Object::Stream(s) => Ok(s.decompressed_content().unwrap_or_else(|_| s.content.clone())),
                Object::Array(arr) => Ok(self.join_streams(arr)),
                _ => Err(Error::Pdf("Invalid content stream".to_string())),
            },
            Object::Array(arr) => Ok(self.join_streams(arr)),
            _ => Err(Error::Pdf("Invalid content stream".to_string())),
        }
    }

    fn join_streams(&self, arr: &[Object]) -> Vec<u8> {
        let mut content = Vec::new();
        for obj in arr {
            if let Some(Object::Stream(s)) = self.resolve(obj) {
                if let Ok(data) = s.decompressed_content() {
                    content.extend_from_slice(&data);
                    content.push(b' ');
                }
            }
        }
        content
    }

    /// Image XObjects in the page resources, by resource name.
    fn image_xobjects(&self, page_id: ObjectId) -> HashMap<Vec<u8>, ObjectId> {
        let mut images = HashMap::new();
        let Some(resources) = self
            .inherited(page_id, b"Resources")
            .and_then(|r| self.resolve_dict(r))
        else {
            return images;
        };
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| self.resolve_dict(x))
        else {
            return images;
        };
        for (name, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else {
                continue;
            };
            let is_image = self
                .doc
                .get_object(id)
                .ok()
                .and_then(|o| self.resolve_dict(o))
                .and_then(|d| d.get(b"Subtype").ok())
                .and_then(|s| s.as_name_str().ok())
                == Some("Image");
            if is_image {
                images.insert(name.clone(), id);
            }
        }
        images
    }

    /// Interpret the page content stream.
    fn interpret(&self, page_no: u32) -> Result<PageContent> {
        let page_id = self.page_id(page_no)?;
        let fonts = self.doc.get_page_fonts(page_id)?;
        let base_fonts: HashMap<&[u8], String> = fonts
            .iter()
            .map(|(name, font)| {
                let base = font
                    .get(b"BaseFont")
                    .ok()
                    .and_then(|o| o.as_name().ok())
                    .map(|n| String::from_utf8_lossy(n).to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                (name.as_slice(), base)
            })
            .collect();
        let images = self.image_xobjects(page_id);

        let content = self.page_content(page_id)?;
        let content = lopdf::content::Content::decode(&content)?;

        let mut out = PageContent::default();
        let mut ctm = Matrix::IDENTITY;
        let mut ctm_stack: Vec<Matrix> = Vec::new();
        let mut tm = TextMatrix::default();
        let mut font_key: Vec<u8> = Vec::new();
        let mut font_name = String::new();
        let mut font_size: f32 = 12.0;
        let mut in_text = false;

        for op in content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => ctm_stack.push(ctm),
                "Q" => ctm = ctm_stack.pop().unwrap_or(Matrix::IDENTITY),
                "cm" if operands.len() >= 6 => {
                    let m = Matrix::from_operands(operands);
                    ctm = m.concat(&ctm);
                }
                "BT" => {
                    in_text = true;
                    tm = TextMatrix::default();
                }
                "ET" => in_text = false,
                "Tf" if operands.len() >= 2 => {
                    if let Object::Name(name) = &operands[0] {
                        font_key = name.clone();
                        font_name = base_fonts
                            .get(name.as_slice())
                            .cloned()
                            .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                    }
                    font_size = get_number(&operands[1]).unwrap_or(12.0);
                }
                "TL" if !operands.is_empty() => {
                    tm.leading = get_number(&operands[0]).unwrap_or(tm.leading);
                }
                "Td" | "TD" if operands.len() >= 2 => {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        tm.leading = -ty;
                    }
                    tm.translate(tx, ty);
                }
                "Tm" if operands.len() >= 6 => {
                    let m = Matrix::from_operands(operands);
                    tm.set(m);
                }
                "T*" => tm.next_line(),
                "Tj" | "TJ" | "'" | "\"" if in_text => {
                    if matches!(op.operator.as_str(), "'" | "\"") {
                        tm.next_line();
                    }
                    let encoding = fonts
                        .get(&font_key)
                        .and_then(|f| f.get_font_encoding(&self.doc).ok());
                    let decode = |bytes: &[u8]| match &encoding {
                        Some(enc) => LopdfDocument::decode_text(enc, bytes).unwrap_or_default(),
                        None => decode_text_simple(bytes),
                    };
                    let text = match op.operator.as_str() {
                        "TJ" => match operands.first() {
                            Some(Object::Array(arr)) => decode_tj(arr, decode),
                            _ => String::new(),
                        },
                        "\"" => match operands.get(2) {
                            Some(Object::String(bytes, _)) => decode(bytes),
                            _ => String::new(),
                        },
                        _ => match operands.first() {
                            Some(Object::String(bytes, _)) => decode(bytes),
                            _ => String::new(),
                        },
                    };

                    let advance = text.chars().count() as f32 * font_size * GLYPH_WIDTH_RATIO;
                    if !text.trim().is_empty() {
                        let (x, y) = ctm.apply(tm.m.e, tm.m.f);
                        let scale = tm.m.scale() * ctm.scale();
                        out.spans.push(RawSpan {
                            width: advance * scale,
                            text,
                            x,
                            y,
                            font_size: font_size * scale,
                            font_name: font_name.clone(),
                        });
                    }
                    tm.advance(advance);
                }
                "Do" => {
                    let Some(Object::Name(name)) = operands.first() else {
                        continue;
                    };
                    if let Some(id) = images.get(name) {
                        out.images.push((*id, ctm.unit_square()));
                    }
                }
                _ => {}
            }
        }

        Ok(out)
    }

    /// Decode an image XObject into an encoded image.
    ///
    /// JPEG streams are used as-is. Unfiltered or Flate-compressed 8-bit
    /// gray and RGB samples are re-encoded as PNG. Anything else is skipped.
    fn extract_image(&self, id: ObjectId, dpi: u32) -> Option<ImageRef> {
        let Ok(Object::Stream(stream)) = self.doc.get_object(id) else {
            return None;
        };
        let dict = &stream.dict;
        let filters = filter_names(dict);
        let filter: Vec<&str> = filters.iter().map(String::as_str).collect();
        match filter.as_slice() {
            ["DCTDecode"] => ImageRef::from_bytes(stream.content.clone(), dpi).ok(),
            [] | ["FlateDecode"] => {
                let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
                let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
                let bits = dict
                    .get(b"BitsPerComponent")
                    .ok()
                    .and_then(|b| b.as_i64().ok())
                    .unwrap_or(8);
                if bits != 8 {
                    return None;
                }
                let color_space = dict
                    .get(b"ColorSpace")
                    .ok()
                    .and_then(|cs| self.resolve(cs))
                    .and_then(|cs| cs.as_name_str().ok())
                    .unwrap_or("DeviceRGB");
                let samples = if filter.is_empty() {
                    stream.content.clone()
                } else {
                    stream.decompressed_content().ok()?
                };
                let png = encode_png(width, height, color_space, samples)?;
                ImageRef::from_bytes(png, dpi).ok()
            }
            other => {
                log::debug!("Skipping image {:?} with filters {:?}", id, other);
                None
            }
        }
    }

    /// Document info dictionary and version.
    fn read_metadata(&self) -> DocumentMetadata {
        let mut metadata = DocumentMetadata {
            format_version: Some(self.doc.version.to_string()),
            page_count: self.pages.len() as u32,
            ..Default::default()
        };

        let Some(info) = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|info| self.resolve_dict(info))
        else {
            return metadata;
        };
        metadata.title = get_string_from_dict(info, b"Title");
        metadata.author = get_string_from_dict(info, b"Author");
        metadata.subject = get_string_from_dict(info, b"Subject");
        metadata.keywords = get_string_from_dict(info, b"Keywords");
        metadata.creator = get_string_from_dict(info, b"Creator");
        metadata.producer = get_string_from_dict(info, b"Producer");
        metadata.created = get_string_from_dict(info, b"CreationDate").and_then(|d| parse_pdf_date(&d));
        metadata.modified = get_string_from_dict(info, b"ModDate").and_then(|d| parse_pdf_date(&d));
        metadata
    }
}

impl PaginatedBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_no: u32) -> Result<Size> {
        let [x0, y0, x1, y1] = self.media_box(self.page_id(page_no)?);
        Ok(Size::new(x1 - x0, y1 - y0))
    }

    fn text_cells(&self, page_no: u32) -> Result<Vec<TextCell>> {
        let [x0, y0, _, y1] = self.media_box(self.page_id(page_no)?);
        let height = y1 - y0;
        let content = self.interpret(page_no)?;
        Ok(content
            .spans
            .into_iter()
            .map(|span| {
                let l = span.x - x0;
                let top = span.y + span.font_size * 0.8 - y0;
                let bottom = span.y - span.font_size * 0.2 - y0;
                let bbox = BoundingBox::bottom_left(l, top, l + span.width, bottom)
                    .to_top_left_origin(height);
                TextCell::new(span.text, bbox, span.font_size, &span.font_name)
            })
            .collect())
    }

    fn page_images(&self, page_no: u32) -> Result<Vec<PageImage>> {
        let [x0, y0, _, y1] = self.media_box(self.page_id(page_no)?);
        let height = y1 - y0;
        let content = self.interpret(page_no)?;
        Ok(content
            .images
            .into_iter()
            .map(|(id, [l, b, r, t])| {
                let bbox = BoundingBox::bottom_left(l - x0, t - y0, r - x0, b - y0)
                    .to_top_left_origin(height);
                let pixel_width = self
                    .doc
                    .get_object(id)
                    .ok()
                    .and_then(|o| self.resolve_dict(o))
                    .and_then(|d| d.get(b"Width").ok())
                    .and_then(|w| w.as_i64().ok())
                    .unwrap_or(0) as f32;
                let dpi = if bbox.width() > 0.0 && pixel_width > 0.0 {
                    (pixel_width / bbox.width() * 72.0).round() as u32
                } else {
                    72
                };
                PageImage {
                    bbox,
                    image: self.extract_image(id, dpi.max(1)),
                }
            })
            .collect())
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
        self.read_metadata()
    }
}

#[derive(Debug, Default)]
struct PageContent {
    spans: Vec<RawSpan>,
    /// Image XObject and its placement `[l, b, r, t]` in user space
    images: Vec<(ObjectId, [f32; 4])>,
}

/// A text run in PDF user space (bottom-left origin, baseline `y`).
#[derive(Debug, Clone)]
struct RawSpan {
    text: String,
    x: f32,
    y: f32,
    width: f32,
    font_size: f32,
    font_name: String,
}

/// Affine matrix `[a b c d e f]` as used by `cm` and `Tm`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Self {
        let n = |i: usize, default: f32| operands.get(i).and_then(get_number).unwrap_or(default);
        Self {
            a: n(0, 1.0),
            b: n(1, 0.0),
            c: n(2, 0.0),
            d: n(3, 1.0),
            e: n(4, 0.0),
            f: n(5, 0.0),
        }
    }

    /// `self × other`.
    fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    /// Bounds `[l, b, r, t]` of the unit square under this matrix.
    fn unit_square(&self) -> [f32; 4] {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        let mut rect = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        for (x, y) in corners {
            rect[0] = rect[0].min(x);
            rect[1] = rect[1].min(y);
            rect[2] = rect[2].max(x);
            rect[3] = rect[3].max(y);
        }
        rect
    }
}

/// Text matrix with line leading.
#[derive(Debug, Clone)]
struct TextMatrix {
    m: Matrix,
    line: Matrix,
    leading: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            m: Matrix::IDENTITY,
            line: Matrix::IDENTITY,
            leading: 12.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, m: Matrix) {
        self.m = m;
        self.line = m;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        let t = Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        };
        self.line = t.concat(&self.line);
        self.m = self.line;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    /// Move along the baseline after showing text (unscaled text space units).
    fn advance(&mut self, width: f32) {
        self.m.e += width * self.m.a;
        self.m.f += width * self.m.b;
    }
}

/// Decode a TJ array, turning large negative kerns into spaces.
fn decode_tj(arr: &[Object], decode: impl Fn(&[u8]) -> String) -> String {
    let mut combined = String::new();
    for item in arr {
        match item {
            Object::String(bytes, _) => combined.push_str(&decode(bytes)),
            Object::Integer(_) | Object::Real(_) => {
                let adjustment = -get_number(item).unwrap_or(0.0);
                let ends_with_space = combined.ends_with(' ') || combined.ends_with('\u{00A0}');
                if adjustment > TJ_SPACE_THRESHOLD && !ends_with_space {
                    if let Some(c) = combined.chars().last() {
                        if !is_spaceless_script_char(c) {
                            combined.push(' ');
                        }
                    }
                }
            }
            _ => {}
        }
    }
    combined
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name_str().ok().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn encode_png(width: u32, height: u32, color_space: &str, samples: Vec<u8>) -> Option<Vec<u8>> {
    let image = match color_space {
        "DeviceGray" | "CalGray" => {
            image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(width, height, samples)?)
        }
        "DeviceRGB" | "CalRGB" => {
            image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(width, height, samples)?)
        }
        _ => return None,
    };
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).ok()?;
    Some(out.into_inner())
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Characters from scripts written without word spaces.
///
/// Chinese and Japanese qualify; Korean (Hangul) uses spaces and does not.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions A-F
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2A6DF).contains(&code)
        || (0x2A700..=0x2B73F).contains(&code)
        || (0x2B740..=0x2B81F).contains(&code)
        || (0x2B820..=0x2CEAF).contains(&code)
        || (0x2CEB0..=0x2EBEF).contains(&code)
        // Hiragana, Katakana
        || (0x3040..=0x309F).contains(&code)
        || (0x30A0..=0x30FF).contains(&code)
        // CJK Symbols and Punctuation
        || (0x3000..=0x303F).contains(&code)
}

/// Fallback decoding when the font has no usable encoding.
fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16_be(rest);
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// String value from a PDF dictionary (UTF-16BE with BOM, UTF-8 or Latin-1).
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let s = decode_text_simple(bytes);
            let s = s.trim_matches('\0').trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`).
///
/// Only the year is required; missing fields default to the start of the
/// period. A trailing UTC offset is applied when present.
pub fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    if s.len() < 4 {
        return None;
    }

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day: u32 = s.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    let hour: u32 = s.get(8..10).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = s.get(10..12).and_then(|m| m.parse().ok()).unwrap_or(0);
    let second: u32 = s.get(12..14).and_then(|s| s.parse().ok()).unwrap_or(0);

    let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    // O is '+', '-' or 'Z', followed by HH'mm
    let offset_minutes = match s.get(14..15) {
        Some(sign @ ("+" | "-")) => {
            let hh: i64 = s.get(15..17).and_then(|h| h.parse().ok()).unwrap_or(0);
            let mm: i64 = s
                .get(18..20)
                .and_then(|m| m.parse().ok())
                .unwrap_or(0);
            let total = hh * 60 + mm;
            if sign == "-" {
                -total
            } else {
                total
            }
        }
        _ => 0,
    };
    let utc = naive - chrono::Duration::minutes(offset_minutes);
    Some(chrono::DateTime::from_naive_utc_and_offset(utc, chrono::Utc))
}
