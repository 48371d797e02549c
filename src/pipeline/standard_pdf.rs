//! Page-level pipeline for PDF and image inputs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::assemble::{assemble, PageLayout};
use super::layout::{BlockKind, FontStatistics, LayoutAnalyzer, MarginBand, PageElement};
use super::options::{PdfBackendKind, PdfPipelineOptions};
use super::sanitize::{is_page_number, sanitize_cell};
use super::table_structure::TableDetector;
use super::{Pipeline, PipelineOutput};
use crate::backend::{InputDocument, PageImage, PaginatedBackend, TextCell};
use crate::convert::{ErrorComponent, ErrorItem, Timings};
use crate::error::{Error, Result};
use crate::model::{ImageRef, Size};
use crate::ocr::{OcrEngine, PageRasterizer, PdftoppmRasterizer, TesseractCliOcr};

/// Pictures covering this much of a page with text are page backgrounds.
const FULL_PAGE_IMAGE: f32 = 0.9;

/// OCR cells overlapping programmatic text by more than this are dropped.
const OCR_OVERLAP: f32 = 0.01;

/// Converts paginated inputs: text cells, OCR, layout, tables, assembly.
pub struct StandardPdfPipeline {
    options: PdfPipelineOptions,
    backend: PdfBackendKind,
    ocr: Option<Arc<dyn OcrEngine>>,
    rasterizer: Arc<dyn PageRasterizer>,
    max_num_pages: Option<u32>,
}

impl StandardPdfPipeline {
    /// Create a pipeline. OCR uses the tesseract CLI when enabled.
    pub fn new(options: PdfPipelineOptions, backend: PdfBackendKind) -> Self {
        let ocr: Option<Arc<dyn OcrEngine>> = if options.do_ocr {
            Some(Arc::new(TesseractCliOcr::new(options.ocr_options.clone())))
        } else {
            None
        };
        Self {
            options,
            backend,
            ocr,
            rasterizer: Arc::new(PdftoppmRasterizer::default()),
            max_num_pages: None,
        }
    }

    /// Replace the OCR engine.
    pub fn with_ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    /// Replace the page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Refuse inputs with more pages than `limit`.
    pub fn with_max_pages(mut self, limit: u32) -> Self {
        self.max_num_pages = Some(limit);
        self
    }

    /// Pipeline options.
    pub fn options(&self) -> &PdfPipelineOptions {
        &self.options
    }

    fn map_pages<T, U, F>(&self, items: Vec<T>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Send + Sync,
    {
        if self.options.parallel {
            items.into_par_iter().map(f).collect()
        } else {
            items.into_iter().map(f).collect()
        }
    }

    fn prepare_page(&self, backend: &dyn PaginatedBackend, page_no: u32) -> PreparedPage {
        let mut page = PreparedPage::new(page_no);
        let module = backend.name();

        page.size = match backend.page_size(page_no) {
            Ok(size) => Some(size),
            Err(e) => {
                log::warn!("page {}: cannot read page: {}", page_no, e);
                page.errors.push(ErrorItem::new(
                    ErrorComponent::DocumentBackend,
                    module,
                    format!("page {}: {}", page_no, e),
                ));
                return page;
            }
        };

        match backend.text_cells(page_no) {
            Ok(cells) => {
                page.cells = cells
                    .into_iter()
                    .filter_map(|mut cell| {
                        cell.text = sanitize_cell(&cell.text);
                        (!cell.text.trim().is_empty()).then_some(cell)
                    })
                    .collect();
            }
            Err(e) => {
                log::warn!("page {}: text extraction failed: {}", page_no, e);
                page.errors.push(ErrorItem::new(
                    ErrorComponent::DocumentBackend,
                    module,
                    format!("page {}: {}", page_no, e),
                ));
            }
        }

        page.images = backend.page_images(page_no).unwrap_or_else(|e| {
            log::warn!("page {}: image extraction failed: {}", page_no, e);
            Vec::new()
        });

        let mut bitmap = None;
        if self.needs_ocr(&page) {
            let start = Instant::now();
            match self.run_ocr(backend, &mut page) {
                Ok(rendered) => bitmap = Some(rendered),
                Err(e) if page.cells.is_empty() => {
                    log::warn!("page {}: OCR failed: {}", page_no, e);
                    page.errors.push(ErrorItem::new(
                        ErrorComponent::Model,
                        "ocr",
                        format!("page {}: {}", page_no, e),
                    ));
                }
                Err(e) => log::warn!("page {}: OCR failed, keeping text layer: {}", page_no, e),
            }
            page.ocr_time = Some(start.elapsed());
        }

        if self.options.generate_page_images {
            let scale = self.options.images_scale;
            let rendered = match bitmap {
                Some(bytes) => Ok(bytes),
                None => backend.render_page(page_no, scale, self.rasterizer.as_ref()),
            };
            page.page_image = rendered
                .and_then(|bytes| ImageRef::from_bytes(bytes, dpi_for(scale)))
                .map_err(|e| log::warn!("page {}: no page image: {}", page_no, e))
                .ok();
        }

        if !page.cells.is_empty() {
            if let Some(size) = page.size {
                let page_area = size.width * size.height;
                page.images
                    .retain(|image| image.bbox.area() < page_area * FULL_PAGE_IMAGE);
            }
        }
        page
    }

    fn needs_ocr(&self, page: &PreparedPage) -> bool {
        if !self.options.do_ocr || self.ocr.is_none() {
            return false;
        }
        if self.options.ocr_options.force_full_page_ocr || page.cells.is_empty() {
            return true;
        }
        let Some(size) = page.size else {
            return false;
        };
        let page_area = size.width * size.height;
        if page_area <= 0.0 {
            return false;
        }
        let bitmap_area: f32 = page.images.iter().map(|i| i.bbox.area()).sum();
        bitmap_area / page_area >= self.options.bitmap_area_threshold
    }

    /// OCR the page and merge the result into its cells. Returns the bitmap.
    fn run_ocr(&self, backend: &dyn PaginatedBackend, page: &mut PreparedPage) -> Result<Vec<u8>> {
        let Some(engine) = &self.ocr else {
            return Err(Error::Ocr("no OCR engine configured".to_string()));
        };
        let scale = self.options.images_scale;
        let bitmap = backend.render_page(page.page_no, scale, self.rasterizer.as_ref())?;
        let min_confidence = self.options.ocr_options.min_confidence;
        let ocr_cells: Vec<TextCell> = engine
            .recognize(&bitmap, scale)?
            .into_iter()
            .filter(|c| c.confidence >= min_confidence)
            .map(|c| TextCell::from_ocr(sanitize_cell(&c.text), c.bbox, c.confidence))
            .filter(|c| !c.text.trim().is_empty())
            .collect();
        log::debug!(
            "page {}: {} recognized {} lines",
            page.page_no,
            engine.name(),
            ocr_cells.len()
        );

        if self.options.ocr_options.force_full_page_ocr {
            page.cells = ocr_cells;
        } else {
            let fresh: Vec<TextCell> = ocr_cells
                .into_iter()
                .filter(|o| {
                    !page
                        .cells
                        .iter()
                        .any(|c| o.bbox.intersection_over_self(&c.bbox) > OCR_OVERLAP)
                })
                .collect();
            page.cells.extend(fresh);
        }
        Ok(bitmap)
    }
}

impl Pipeline for StandardPdfPipeline {
    fn name(&self) -> &'static str {
        "standard_pdf"
    }

    fn execute(&self, input: &InputDocument) -> Result<PipelineOutput> {
        let mut timings = Timings::new();

        let start = Instant::now();
        let backend = self.backend.open(input)?;
        let page_count = backend.page_count();
        timings.add("backend_init", start.elapsed());

        if let Some(limit) = self.max_num_pages {
            if page_count > limit {
                return Err(Error::TooManyPages {
                    pages: page_count,
                    limit,
                });
            }
        }

        let page_numbers: Vec<u32> = (1..=page_count)
            .filter(|p| self.options.page_range.includes(*p))
            .collect();
        log::debug!(
            "{}: {} of {} pages selected, backend {}",
            input.name,
            page_numbers.len(),
            page_count,
            backend.name()
        );

        let start = Instant::now();
        let prepared = self.map_pages(page_numbers, |p| self.prepare_page(backend.as_ref(), p));
        timings.add("page_parse", start.elapsed());
        for elapsed in prepared.iter().filter_map(|p| p.ocr_time) {
            timings.add("ocr", elapsed);
        }

        let mut document = input.new_document();
        let mut errors = Vec::new();
        let mut page_images = Vec::new();
        let mut laid_out = Vec::new();
        for page in prepared {
            errors.extend(page.errors);
            let Some(size) = page.size else {
                continue;
            };
            document.add_page(page.page_no, size);
            if let Some(image) = page.page_image {
                page_images.push((page.page_no, image));
            }
            laid_out.push((page.page_no, size, page.cells, page.images));
        }

        let start = Instant::now();
        let stats = FontStatistics::from_cells(laid_out.iter().flat_map(|(_, _, cells, _)| cells));
        log::debug!(
            "body font {:.1}pt, {} heading sizes",
            stats.body_size,
            stats.heading_sizes.len()
        );
        let detector = self.options.do_table_structure.then(TableDetector::new);
        let analyzer = LayoutAnalyzer::new(&stats);
        let mut layouts = self.map_pages(laid_out, |(page_no, size, cells, images)| PageLayout {
            page_no,
            elements: analyzer.analyze_page(cells, images, size, detector.as_ref()),
        });
        mark_furniture(&mut layouts);
        promote_title(&mut layouts);
        timings.add("layout", start.elapsed());

        let start = Instant::now();
        assemble(&mut document, layouts, self.options.generate_picture_images)?;
        for (page_no, image) in page_images {
            if let Some(page) = document.pages.get_mut(&page_no) {
                page.image = Some(image);
            }
        }
        timings.add("assemble", start.elapsed());

        if document.pages.is_empty() && !errors.is_empty() {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::backend(input.format, message));
        }

        Ok(PipelineOutput {
            document,
            errors,
            timings,
            metadata: Some(backend.metadata()),
        })
    }
}

struct PreparedPage {
    page_no: u32,
    size: Option<Size>,
    cells: Vec<TextCell>,
    images: Vec<PageImage>,
    page_image: Option<ImageRef>,
    errors: Vec<ErrorItem>,
    ocr_time: Option<Duration>,
}

impl PreparedPage {
    fn new(page_no: u32) -> Self {
        Self {
            page_no,
            size: None,
            cells: Vec::new(),
            images: Vec::new(),
            page_image: None,
            errors: Vec::new(),
            ocr_time: None,
        }
    }
}

fn dpi_for(scale: f32) -> u32 {
    (72.0 * scale).round().max(1.0) as u32
}

/// Repetition key for margin text: lowercased with digits removed.
fn furniture_key(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_digit())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn margin blocks into page headers and footers.
///
/// A margin block is furniture when it is a page number or when the same
/// text (ignoring digits) appears in the same band on another page.
fn mark_furniture(pages: &mut [PageLayout]) {
    let mut seen: HashMap<(MarginBand, String), HashSet<u32>> = HashMap::new();
    for page in pages.iter() {
        for element in &page.elements {
            if let PageElement::Block(block) = element {
                if let Some(band) = block.margin {
                    let key = furniture_key(&block.text);
                    if !key.is_empty() {
                        seen.entry((band, key)).or_default().insert(page.page_no);
                    }
                }
            }
        }
    }

    for page in pages.iter_mut() {
        for element in &mut page.elements {
            let PageElement::Block(block) = element else {
                continue;
            };
            let Some(band) = block.margin else {
                continue;
            };
            let repeated = seen
                .get(&(band, furniture_key(&block.text)))
                .is_some_and(|p| p.len() >= 2);
            if repeated || is_page_number(&block.text) {
                block.kind = match band {
                    MarginBand::Top => BlockKind::PageHeader,
                    MarginBand::Bottom => BlockKind::PageFooter,
                };
            }
        }
    }
}

/// The first top-level heading of the first page is the title.
fn promote_title(pages: &mut [PageLayout]) {
    let Some(first) = pages.first_mut() else {
        return;
    };
    for element in &mut first.elements {
        if let PageElement::Block(block) = element {
            if block.kind == BlockKind::SectionHeader(1) {
                block.kind = BlockKind::Title;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::InputFormat;
    use crate::export::PageSelection;
    use crate::model::{BoundingBox, DocItemLabel, IterOptions};
    use crate::ocr::OcrCell;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document as LopdfDocument, Object, Stream};

    fn text_op(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font },
        });
        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn report_page(page_no: i64, body: &str, title: Option<&str>) -> Vec<Operation> {
        let mut ops = text_op("F1", 9, 72, 815, "ACME Corp Quarterly");
        if let Some(title) = title {
            ops.extend(text_op("F1", 24, 72, 740, title));
        }
        ops.extend(text_op("F1", 12, 72, 690, body));
        ops.extend(text_op("F1", 12, 72, 675, "and continues on a second line."));
        ops.extend(text_op("F1", 9, 290, 30, &page_no.to_string()));
        ops
    }

    struct FixedOcr(Vec<OcrCell>);

    impl OcrEngine for FixedOcr {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn recognize(&self, _image: &[u8], _scale: f32) -> Result<Vec<OcrCell>> {
            Ok(self.0.clone())
        }
    }

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn recognize(&self, _image: &[u8], _scale: f32) -> Result<Vec<OcrCell>> {
            Err(Error::Ocr("engine unavailable".to_string()))
        }
    }

    struct BlankRasterizer;

    impl PageRasterizer for BlankRasterizer {
        fn name(&self) -> &'static str {
            "blank"
        }

        fn rasterize(&self, _pdf: &[u8], _page_no: u32, _dpi: u32) -> Result<Vec<u8>> {
            Ok(b"bitmap".to_vec())
        }
    }

    fn pdf_input(pages: Vec<Vec<Operation>>) -> InputDocument {
        InputDocument::new("report.pdf", InputFormat::Pdf, build_pdf(pages))
    }

    fn ocr_cell(text: &str, top: f32) -> OcrCell {
        OcrCell {
            text: text.to_string(),
            confidence: 0.9,
            bbox: BoundingBox::new(72.0, top, 400.0, top + 14.0),
        }
    }

    #[test]
    fn test_text_pdf_structure() {
        let input = pdf_input(vec![
            report_page(1, "Revenue grew in every region", Some("Annual Summary")),
            report_page(2, "Costs stayed flat through the year", None),
        ]);
        let pipeline = StandardPdfPipeline::new(PdfPipelineOptions::new().with_ocr(false), PdfBackendKind::Lopdf);
        let output = pipeline.execute(&input).unwrap();
        let doc = &output.document;

        assert!(output.errors.is_empty());
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.name, "report");
        doc.validate_tree().unwrap();

        let body: Vec<(DocItemLabel, String)> = doc
            .iterate_items(IterOptions::new())
            .filter_map(|(item, _)| Some((item.doc_label()?, item.text()?.to_string())))
            .collect();
        assert_eq!(body.len(), 3);
        assert_eq!(body[0], (DocItemLabel::Title, "Annual Summary".to_string()));
        assert_eq!(body[1].0, DocItemLabel::Text);
        assert_eq!(
            body[1].1,
            "Revenue grew in every region and continues on a second line."
        );
        assert_eq!(body[2].0, DocItemLabel::Text);

        // repeated header and page numbers on both pages
        assert_eq!(doc.furniture.children.len(), 4);
        let header = doc.texts.iter().find(|t| t.text == "ACME Corp Quarterly").unwrap();
        assert_eq!(header.label, DocItemLabel::PageHeader);

        let prov = &doc.texts[1].prov[0];
        assert_eq!(prov.page_no, 1);
        assert!(prov.bbox.t < prov.bbox.b);

        assert!(output.timings.get("layout").is_some());
        assert_eq!(output.metadata.map(|m| m.page_count), Some(2));
    }

    #[test]
    fn test_page_range_and_sequential() {
        let input = pdf_input(vec![
            report_page(1, "first page body", None),
            report_page(2, "second page body", None),
            report_page(3, "third page body", None),
        ]);
        let options = PdfPipelineOptions::new()
            .with_ocr(false)
            .with_pages(PageSelection::Pages(vec![2]))
            .sequential();
        let output = StandardPdfPipeline::new(options, PdfBackendKind::Lopdf)
            .execute(&input)
            .unwrap();
        let pages: Vec<u32> = output.document.pages.keys().copied().collect();
        assert_eq!(pages, vec![2]);
        assert!(output
            .document
            .texts
            .iter()
            .all(|t| t.prov.iter().all(|p| p.page_no == 2)));
    }

    #[test]
    fn test_max_pages() {
        let input = pdf_input(vec![vec![], vec![], vec![]]);
        let pipeline = StandardPdfPipeline::new(PdfPipelineOptions::new().with_ocr(false), PdfBackendKind::Lopdf)
            .with_max_pages(2);
        assert!(matches!(
            pipeline.execute(&input),
            Err(Error::TooManyPages { pages: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_scanned_page_uses_ocr() {
        let input = pdf_input(vec![vec![]]);
        let engine = FixedOcr(vec![
            ocr_cell("Scanned heading text", 100.0),
            ocr_cell("Recognized body line", 118.0),
        ]);
        let pipeline = StandardPdfPipeline::new(PdfPipelineOptions::new(), PdfBackendKind::Lopdf)
            .with_ocr_engine(Arc::new(engine))
            .with_rasterizer(Arc::new(BlankRasterizer));
        let output = pipeline.execute(&input).unwrap();
        assert!(output.errors.is_empty());
        assert_eq!(output.document.texts.len(), 1);
        assert_eq!(
            output.document.texts[0].text,
            "Scanned heading text Recognized body line"
        );
        assert!(output.timings.get("ocr").is_some());
    }

    #[test]
    fn test_ocr_skips_text_pages_unless_forced() {
        let input = pdf_input(vec![report_page(1, "digital text only", None)]);
        let engine = Arc::new(FixedOcr(vec![ocr_cell("from the scanner", 400.0)]));

        let pipeline = StandardPdfPipeline::new(PdfPipelineOptions::new(), PdfBackendKind::Lopdf)
            .with_ocr_engine(engine.clone())
            .with_rasterizer(Arc::new(BlankRasterizer));
        let output = pipeline.execute(&input).unwrap();
        assert!(output.document.texts.iter().all(|t| t.text != "from the scanner"));

        let options = PdfPipelineOptions::new()
            .with_ocr_options(crate::ocr::OcrOptions::default().force_full_page());
        let pipeline = StandardPdfPipeline::new(options, PdfBackendKind::Lopdf)
            .with_ocr_engine(engine)
            .with_rasterizer(Arc::new(BlankRasterizer));
        let output = pipeline.execute(&input).unwrap();
        let texts: Vec<&str> = output.document.texts.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["from the scanner"]);
    }

    #[test]
    fn test_ocr_failure_on_empty_page_is_recorded() {
        let input = pdf_input(vec![vec![], report_page(2, "readable page", None)]);
        let pipeline = StandardPdfPipeline::new(PdfPipelineOptions::new(), PdfBackendKind::Lopdf)
            .with_ocr_engine(Arc::new(FailingOcr))
            .with_rasterizer(Arc::new(BlankRasterizer));
        let output = pipeline.execute(&input).unwrap();
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].component, ErrorComponent::Model);
        assert!(output.errors[0].message.starts_with("page 1:"));
        assert!(output
            .document
            .texts
            .iter()
            .any(|t| t.text.starts_with("readable page")));
    }

    #[test]
    fn test_furniture_key_and_title() {
        assert_eq!(furniture_key("Page 3 of 10"), "page of");
        assert_eq!(furniture_key("  ACME   Corp 2024 "), "acme corp");

        let block = |kind| {
            let mut layouts = vec![PageLayout {
                page_no: 1,
                elements: Vec::new(),
            }];
            let line = crate::pipeline::TextLine::from_cells(vec![TextCell::new(
                "Heading",
                BoundingBox::new(0.0, 100.0, 50.0, 120.0),
                20.0,
                "Helvetica",
            )])
            .unwrap();
            layouts[0].elements.push(PageElement::Block(crate::pipeline::LayoutBlock {
                lines: vec![line],
                bbox: BoundingBox::new(0.0, 100.0, 50.0, 120.0),
                kind,
                margin: None,
                text: "Heading".to_string(),
            }));
            promote_title(&mut layouts);
            match &layouts[0].elements[0] {
                PageElement::Block(b) => b.kind.clone(),
                _ => unreachable!(),
            }
        };
        assert_eq!(block(BlockKind::SectionHeader(1)), BlockKind::Title);
        assert_eq!(block(BlockKind::SectionHeader(2)), BlockKind::SectionHeader(2));
    }
}
