//! PPTX reader: slide XML via `zip` and `quick-xml`.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use super::{collapse_whitespace, xml_attr, DeclarativeBackend, InputDocument};
use crate::detect::InputFormat;
use crate::error::{Error, Result};
use crate::model::{
    BoundingBox, DocItemLabel, Document, GroupLabel, ImageRef, NodeRef, ProvenanceItem, Size,
    TableCell, TableData, MAX_SPAN,
};

/// EMUs per point.
const EMU_PER_PT: f32 = 12_700.0;
/// 4:3 slide, used when `presentation.xml` has no size.
const DEFAULT_SLIDE: Size = Size {
    width: 720.0,
    height: 540.0,
};

type ZipReader<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// PPTX backend.
#[derive(Debug, Default)]
pub struct PptxBackend;

impl PptxBackend {
    /// Create a new PPTX backend.
    pub fn new() -> Self {
        Self
    }
}

impl DeclarativeBackend for PptxBackend {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn supported_formats(&self) -> &[InputFormat] {
        &[InputFormat::Pptx]
    }

    fn convert(&self, input: &InputDocument) -> Result<Document> {
        let mut archive = ZipArchive::new(Cursor::new(input.bytes.as_slice()))?;
        let slide_size = read_entry(&mut archive, "ppt/presentation.xml")
            .ok()
            .and_then(|xml| slide_size(&xml))
            .unwrap_or(DEFAULT_SLIDE);

        let mut slide_names: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|name| {
                let num = name
                    .strip_prefix("ppt/slides/slide")?
                    .strip_suffix(".xml")?
                    .parse::<u32>()
                    .ok()?;
                Some((num, name.to_string()))
            })
            .collect();
        slide_names.sort();

        let mut doc = input.new_document();
        let mut title_seen = false;
        for (idx, (num, name)) in slide_names.iter().enumerate() {
            let page_no = idx as u32 + 1;
            let xml = read_entry(&mut archive, name)?;
            let shapes = parse_slide(&xml)?;
            let rels_name = format!("ppt/slides/_rels/slide{}.xml.rels", num);
            let rels = read_entry(&mut archive, &rels_name)
                .ok()
                .map(|xml| parse_rels(&xml))
                .unwrap_or_default();

            doc.add_page(page_no, slide_size);
            let slide = doc.add_group(GroupLabel::Slide, format!("slide-{}", page_no), None);
            let mut ctx = SlideCtx {
                doc: &mut doc,
                archive: &mut archive,
                rels: &rels,
                slide,
                page_no,
                title_seen: &mut title_seen,
            };
            for shape in shapes {
                ctx.emit(shape);
            }
        }
        Ok(doc)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Bullet {
    Char,
    AutoNum,
    Off,
}

#[derive(Debug, Default, Clone)]
struct Para {
    text: String,
    level: usize,
    bullet: Option<Bullet>,
}

#[derive(Debug, Default, Clone)]
struct PCell {
    text: String,
    grid_span: usize,
    row_span: usize,
    merged: bool,
}

#[derive(Debug)]
enum ShapeKind {
    Text {
        placeholder: Option<String>,
        paras: Vec<Para>,
    },
    Table {
        rows: Vec<Vec<PCell>>,
    },
    Picture {
        embed: Option<String>,
    },
}

#[derive(Debug)]
struct Shape {
    kind: ShapeKind,
    bbox: Option<BoundingBox>,
}

struct SlideCtx<'d, 'a> {
    doc: &'d mut Document,
    archive: &'d mut ZipReader<'a>,
    rels: &'d HashMap<String, String>,
    slide: NodeRef,
    page_no: u32,
    title_seen: &'d mut bool,
}

impl SlideCtx<'_, '_> {
    fn prov(&self, bbox: Option<BoundingBox>, len: usize) -> Option<ProvenanceItem> {
        bbox.map(|b| ProvenanceItem::new(self.page_no, b, len))
    }

    fn emit(&mut self, shape: Shape) {
        match shape.kind {
            ShapeKind::Text { placeholder, paras } => {
                let is_title = matches!(placeholder.as_deref(), Some("title" | "ctrTitle"));
                if is_title {
                    let text = collapse_whitespace(
                        &paras.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join(" "),
                    );
                    if text.is_empty() {
                        return;
                    }
                    let prov = self.prov(shape.bbox, text.chars().count());
                    if self.page_no == 1 && !*self.title_seen {
                        *self.title_seen = true;
                        self.doc.add_title(text, prov, Some(&self.slide));
                    } else {
                        self.doc.add_heading(text, 1, prov, Some(&self.slide));
                    }
                    return;
                }
                let body = matches!(placeholder.as_deref(), Some("body" | "obj"));
                self.text_body(paras, body, shape.bbox);
            }
            ShapeKind::Table { rows } => {
                let data = table_data(&rows);
                if !data.is_empty() {
                    let prov = self.prov(shape.bbox, 0);
                    self.doc.add_table(data, prov, Some(&self.slide));
                }
            }
            ShapeKind::Picture { embed } => {
                let image = embed
                    .and_then(|id| self.rels.get(&id).cloned())
                    .map(|target| {
                        read_bytes(self.archive, &target)
                            .ok()
                            .and_then(|data| ImageRef::from_bytes(data, 72).ok())
                            .unwrap_or_else(|| ImageRef::from_uri(target))
                    });
                let prov = self.prov(shape.bbox, 0);
                self.doc.add_picture(image, prov, Some(&self.slide));
            }
        }
    }

    fn text_body(&mut self, paras: Vec<Para>, body_placeholder: bool, bbox: Option<BoundingBox>) {
        let mut list: Option<(NodeRef, bool, usize)> = None;
        for para in paras {
            let text = collapse_whitespace(&para.text);
            if text.is_empty() {
                continue;
            }
            let prov = self.prov(bbox, text.chars().count());
            let is_item = match para.bullet {
                Some(Bullet::Char) | Some(Bullet::AutoNum) => true,
                Some(Bullet::Off) => false,
                None => body_placeholder,
            };
            if !is_item {
                list = None;
                self.doc.add_text(DocItemLabel::Text, text, prov, Some(&self.slide));
                continue;
            }
            let ordered = para.bullet == Some(Bullet::AutoNum);
            let (group, _, counter) = match list.take() {
                Some((group, was_ordered, counter)) if was_ordered == ordered => {
                    (group, ordered, counter)
                }
                _ => (self.doc.add_list_group(ordered, Some(&self.slide)), ordered, 0),
            };
            let counter = counter + 1;
            let marker = if ordered {
                format!("{}.", counter)
            } else {
                "-".to_string()
            };
            let item = self
                .doc
                .add_list_item(text, ordered, Some(marker), prov, Some(&group));
            log::trace!("slide {} list item {} at level {}", self.page_no, item, para.level);
            list = Some((group, ordered, counter));
        }
    }
}

fn table_data(rows: &[Vec<PCell>]) -> TableData {
    let mut data = TableData::default();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.merged {
                continue;
            }
            let mut tc = TableCell::new(collapse_whitespace(&cell.text), r, c)
                .with_span(cell.row_span, cell.grid_span);
            if r == 0 {
                tc = tc.column_header();
            }
            data.add_cell(tc);
        }
    }
    data
}

fn read_entry(archive: &mut ZipReader<'_>, name: &str) -> Result<String> {
    let mut file = archive.by_name(name)?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(xml)
}

fn read_bytes(archive: &mut ZipReader<'_>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

fn attr_f32(e: &BytesStart<'_>, key: &[u8]) -> Option<f32> {
    xml_attr(e, key).and_then(|v| v.parse::<f32>().ok())
}

fn attr_usize(e: &BytesStart<'_>, key: &[u8]) -> Option<usize> {
    xml_attr(e, key).and_then(|v| v.parse::<usize>().ok())
}

fn span_attr(e: &BytesStart<'_>, key: &[u8]) -> usize {
    attr_usize(e, key).unwrap_or(1).clamp(1, MAX_SPAN)
}

/// Slide size from `<p:sldSz cx=".." cy=".."/>`.
fn slide_size(xml: &str) -> Option<Size> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldSz" => {
                let cx = attr_f32(&e, b"cx")?;
                let cy = attr_f32(&e, b"cy")?;
                return Some(Size::new(cx / EMU_PER_PT, cy / EMU_PER_PT));
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Relationship id -> archive path, resolved against `ppt/slides/`.
fn parse_rels(xml: &str) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (xml_attr(&e, b"Id"), xml_attr(&e, b"Target")) {
                    rels.insert(id, resolve_target("ppt/slides", &target));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    rels
}

fn resolve_target(base: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for part in target.split('/') {
        match part {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Parse the shapes of one slide in document order.
fn parse_slide(xml: &str) -> Result<Vec<Shape>> {
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();
    let mut current: Option<Shape> = None;
    let mut para: Option<Para> = None;
    let mut row: Option<Vec<PCell>> = None;
    let mut cell: Option<PCell> = None;
    let mut in_text = false;
    let mut pending_off: Option<(f32, f32)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::backend(InputFormat::Pptx, e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"sp" => {
                        current = Some(Shape {
                            kind: ShapeKind::Text {
                                placeholder: None,
                                paras: Vec::new(),
                            },
                            bbox: None,
                        })
                    }
                    b"graphicFrame" => {
                        current = Some(Shape {
                            kind: ShapeKind::Table { rows: Vec::new() },
                            bbox: None,
                        })
                    }
                    b"pic" => {
                        current = Some(Shape {
                            kind: ShapeKind::Picture { embed: None },
                            bbox: None,
                        })
                    }
                    b"ph" => {
                        if let Some(Shape {
                            kind: ShapeKind::Text { placeholder, .. },
                            ..
                        }) = current.as_mut()
                        {
                            *placeholder = Some(xml_attr(e, b"type").unwrap_or_else(|| "body".into()));
                        }
                    }
                    b"off" => {
                        if let (Some(x), Some(y)) = (attr_f32(e, b"x"), attr_f32(e, b"y")) {
                            pending_off = Some((x, y));
                        }
                    }
                    b"ext" => {
                        if let (Some(shape), Some((x, y)), Some(cx), Some(cy)) = (
                            current.as_mut(),
                            pending_off.take(),
                            attr_f32(e, b"cx"),
                            attr_f32(e, b"cy"),
                        ) {
                            if shape.bbox.is_none() {
                                shape.bbox = Some(BoundingBox::new(
                                    x / EMU_PER_PT,
                                    y / EMU_PER_PT,
                                    (x + cx) / EMU_PER_PT,
                                    (y + cy) / EMU_PER_PT,
                                ));
                            }
                        }
                    }
                    b"blip" => {
                        if let Some(Shape {
                            kind: ShapeKind::Picture { embed },
                            ..
                        }) = current.as_mut()
                        {
                            *embed = xml_attr(e, b"embed");
                        }
                    }
                    b"tr" => row = Some(Vec::new()),
                    b"tc" => {
                        let merged = xml_attr(e, b"hMerge").is_some() || xml_attr(e, b"vMerge").is_some();
                        cell = Some(PCell {
                            text: String::new(),
                            grid_span: span_attr(e, b"gridSpan"),
                            row_span: span_attr(e, b"rowSpan"),
                            merged,
                        });
                        if is_empty {
                            if let (Some(row), Some(cell)) = (row.as_mut(), cell.take()) {
                                row.push(cell);
                            }
                        }
                    }
                    b"p" if !is_empty => para = Some(Para::default()),
                    b"pPr" => {
                        if let Some(para) = para.as_mut() {
                            para.level = attr_usize(e, b"lvl").unwrap_or(0);
                        }
                    }
                    b"buChar" => set_bullet(&mut para, Bullet::Char),
                    b"buAutoNum" => set_bullet(&mut para, Bullet::AutoNum),
                    b"buNone" => set_bullet(&mut para, Bullet::Off),
                    b"br" => {
                        if let Some(para) = para.as_mut() {
                            para.text.push(' ');
                        }
                    }
                    b"t" if !is_empty => in_text = true,
                    _ => {}
                }
            }
            Event::Text(ref t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::backend(InputFormat::Pptx, e.to_string()))?;
                if let Some(para) = para.as_mut() {
                    para.text.push_str(&text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(done) = para.take() {
                        if let Some(cell) = cell.as_mut() {
                            if !cell.text.is_empty() {
                                cell.text.push(' ');
                            }
                            cell.text.push_str(&done.text);
                        } else if let Some(Shape {
                            kind: ShapeKind::Text { paras, .. },
                            ..
                        }) = current.as_mut()
                        {
                            paras.push(done);
                        }
                    }
                }
                b"tc" => {
                    if let (Some(row), Some(cell)) = (row.as_mut(), cell.take()) {
                        row.push(cell);
                    }
                }
                b"tr" => {
                    if let (
                        Some(Shape {
                            kind: ShapeKind::Table { rows },
                            ..
                        }),
                        Some(done),
                    ) = (current.as_mut(), row.take())
                    {
                        rows.push(done);
                    }
                }
                b"sp" | b"graphicFrame" | b"pic" => {
                    if let Some(shape) = current.take() {
                        shapes.push(shape);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(shapes)
}

fn set_bullet(para: &mut Option<Para>, bullet: Bullet) {
    if let Some(para) = para.as_mut() {
        para.bullet = Some(bullet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    fn title_shape(text: &str) -> String {
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="127000" y="254000"/><a:ext cx="1270000" cy="635000"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
            text
        )
    }

    fn slide(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:sld {}><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
            NS, body
        )
    }

    fn pptx(slides: &[(&str, String)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("ppt/presentation.xml", options).unwrap();
            write!(zip, r#"<p:presentation {}><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#, NS).unwrap();
            for (name, xml) in slides {
                zip.start_file(*name, options).unwrap();
                zip.write_all(xml.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn convert(data: Vec<u8>) -> Document {
        let input = InputDocument::new("deck.pptx", InputFormat::Pptx, data);
        PptxBackend::new().convert(&input).unwrap()
    }

    #[test]
    fn test_slides_ordered_by_number() {
        let data = pptx(&[
            ("ppt/slides/slide10.xml", slide(&title_shape("Ten"))),
            ("ppt/slides/slide2.xml", slide(&title_shape("Two"))),
            ("ppt/slides/slide1.xml", slide(&title_shape("One"))),
        ]);
        let doc = convert(data);
        let texts: Vec<_> = doc.texts.iter().map(|t| (t.label, t.text.as_str())).collect();
        assert_eq!(
            texts,
            vec![
                (DocItemLabel::Title, "One"),
                (DocItemLabel::SectionHeader, "Two"),
                (DocItemLabel::SectionHeader, "Ten"),
            ]
        );
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[&1].size, Size::new(720.0, 540.0));
        assert_eq!(doc.groups[0].label, GroupLabel::Slide);
        let prov = &doc.texts[0].prov[0];
        assert_eq!(prov.page_no, 1);
        assert!((prov.bbox.l - 10.0).abs() < 1e-3 && (prov.bbox.b - 70.0).abs() < 1e-3);
    }

    #[test]
    fn test_bullets_and_table() {
        let body = r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Text"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:txBody><a:bodyPr/>
            <a:p><a:r><a:t>Intro</a:t></a:r></a:p>
            <a:p><a:pPr><a:buChar char="&#8226;"/></a:pPr><a:r><a:t>alpha</a:t></a:r></a:p>
            <a:p><a:pPr><a:buChar char="&#8226;"/></a:pPr><a:r><a:t>beta</a:t></a:r></a:p>
            <a:p><a:pPr><a:buAutoNum type="arabicPeriod"/></a:pPr><a:r><a:t>one</a:t></a:r></a:p>
            </p:txBody></p:sp>
            <p:graphicFrame><a:graphic><a:graphicData><a:tbl>
            <a:tr><a:tc gridSpan="2"><a:txBody><a:p><a:r><a:t>Head</a:t></a:r></a:p></a:txBody></a:tc><a:tc hMerge="1"><a:txBody><a:p/></a:txBody></a:tc></a:tr>
            <a:tr><a:tc><a:txBody><a:p><a:r><a:t>x</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>y</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
            </a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#;
        let doc = convert(pptx(&[("ppt/slides/slide1.xml", slide(body))]));

        assert_eq!(doc.texts[0].label, DocItemLabel::Text);
        assert_eq!(doc.texts[1].label, DocItemLabel::ListItem);
        assert_eq!(doc.texts[3].enumerated, Some(true));
        // bullet list + ordered list
        assert_eq!(doc.groups.iter().filter(|g| g.label.is_list()).count(), 2);

        let data = &doc.tables[0].data;
        assert_eq!((data.num_rows, data.num_cols), (2, 2));
        assert_eq!(data.grid()[0][1].text, "Head");
        assert_eq!(data.grid()[1][1].text, "y");
    }

    #[test]
    fn test_oversized_span_is_clamped() {
        let body = r#"<p:graphicFrame><a:graphic><a:graphicData><a:tbl>
            <a:tr><a:tc gridSpan="18446744073709551615" rowSpan="0"><a:txBody><a:p><a:r><a:t>Wide</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
            <a:tr><a:tc><a:txBody><a:p><a:r><a:t>x</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
            </a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#;
        let doc = convert(pptx(&[("ppt/slides/slide1.xml", slide(body))]));

        let cell = &doc.tables[0].data.table_cells[0];
        assert_eq!(cell.text, "Wide");
        assert_eq!((cell.row_span, cell.col_span), (1, MAX_SPAN));
        assert!(doc.tables[0].data.num_cols <= MAX_SPAN);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt/slides", "/ppt/media/a.png"), "ppt/media/a.png");
    }
}
