//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as LopdfDocument, Object, Stream};

/// A small Markdown report with a title, sections, a list and a table.
pub const REPORT_MD: &str = "# Quarterly Report\n\n\
Revenue grew in every region during the quarter.\n\n\
## Highlights\n\n\
- New office opened\n\
- Two products shipped\n\n\
## Figures\n\n\
| Region | Sales |\n\
|--------|-------|\n\
| North  | 10    |\n\
| South  | 12    |\n";

/// Show `text` at (`x`, `y`) with font `font` at `size` points.
pub fn text_op(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Build an A4 PDF with one Helvetica font (`F1`) and one content stream per page.
pub fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
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
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
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

/// A report page with a running header, an optional title, a two-line
/// paragraph and a page number in the footer.
pub fn report_page(page_no: i64, body: &str, title: Option<&str>) -> Vec<Operation> {
    let mut ops = text_op("F1", 9, 72, 815, "ACME Corp Quarterly");
    if let Some(title) = title {
        ops.extend(text_op("F1", 24, 72, 740, title));
    }
    ops.extend(text_op("F1", 12, 72, 690, body));
    ops.extend(text_op("F1", 12, 72, 675, "and continues on a second line."));
    ops.extend(text_op("F1", 9, 290, 30, &page_no.to_string()));
    ops
}

/// A two-page report PDF.
pub fn report_pdf() -> Vec<u8> {
    build_pdf(vec![
        report_page(1, "Revenue grew in every region", Some("Annual Summary")),
        report_page(2, "Costs stayed flat through the year", None),
    ])
}
