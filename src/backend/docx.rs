//! DOCX reader built on `docx-rs`.

use std::collections::HashMap;

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use serde_json::Value;

use super::{collapse_whitespace, DeclarativeBackend, InputDocument};
use crate::detect::InputFormat;
use crate::error::{Error, Result};
use crate::model::{DocItemLabel, Document, NodeRef, TableCell, TableData, MAX_SPAN};

/// DOCX backend.
#[derive(Debug, Default)]
pub struct DocxBackend;

impl DocxBackend {
    /// Create a new DOCX backend.
    pub fn new() -> Self {
        Self
    }
}

impl DeclarativeBackend for DocxBackend {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn supported_formats(&self) -> &[InputFormat] {
        &[InputFormat::Docx]
    }

    fn convert(&self, input: &InputDocument) -> Result<Document> {
        let docx = docx_rs::read_docx(&input.bytes)
            .map_err(|e| Error::backend(InputFormat::Docx, e.to_string()))?;
        let formats = numbering_formats(&serde_json::to_value(&docx.numberings)?);

        let mut builder = DocxBuilder {
            doc: input.new_document(),
            formats,
            lists: Vec::new(),
            title_seen: false,
        };
        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(p) => builder.paragraph(p),
                DocumentChild::Table(t) => {
                    builder.lists.clear();
                    let data = table_data(t)?;
                    if !data.is_empty() {
                        builder.doc.add_table(data, None, None);
                    }
                }
                _ => {}
            }
        }
        Ok(builder.doc)
    }
}

/// An open list: numbering id, indent level and its group.
struct OpenList {
    num_id: usize,
    level: usize,
    group: NodeRef,
    counter: usize,
}

struct DocxBuilder {
    doc: Document,
    /// `(num_id, level)` -> numbering format ("decimal", "bullet", ...)
    formats: HashMap<(usize, usize), String>,
    lists: Vec<OpenList>,
    title_seen: bool,
}

impl DocxBuilder {
    fn paragraph(&mut self, p: &Paragraph) {
        let text = collapse_whitespace(&paragraph_text(p));
        let style = p
            .property
            .style
            .as_ref()
            .map(|s| s.val.clone())
            .unwrap_or_default();

        let numbering = p.property.numbering_property.as_ref().and_then(|n| {
            let id = n.id.as_ref()?.id;
            let level = n.level.as_ref().map(|l| l.val).unwrap_or(0);
            (id != 0).then_some((id, level))
        });

        if text.is_empty() {
            return;
        }

        if let Some((num_id, level)) = numbering {
            self.list_item(text, num_id, level);
            return;
        }
        self.lists.clear();

        if is_title_style(&style) {
            if self.title_seen {
                self.doc.add_heading(text, 1, None, None);
            } else {
                self.title_seen = true;
                self.doc.add_title(text, None, None);
            }
        } else if let Some(level) = heading_level(&style) {
            self.doc.add_heading(text, level, None, None);
        } else if style.eq_ignore_ascii_case("caption") {
            self.doc.add_text(DocItemLabel::Caption, text, None, None);
        } else if is_code_style(&style) {
            self.doc.add_code(text, None, None, None);
        } else {
            self.doc.add_text(DocItemLabel::Text, text, None, None);
        }
    }

    fn list_item(&mut self, text: String, num_id: usize, level: usize) {
        // Close lists that are deeper, or belong to another numbering.
        while let Some(top) = self.lists.last() {
            if top.level > level || (top.level == level && top.num_id != num_id) {
                self.lists.pop();
            } else {
                break;
            }
        }
        let ordered = self
            .formats
            .get(&(num_id, level))
            .map(|f| f != "bullet" && f != "none")
            .unwrap_or(false);

        let needs_group = self
            .lists
            .last()
            .map_or(true, |top| top.level < level);
        if needs_group {
            // Nested lists hang off the previous item.
            let parent = self
                .lists
                .last()
                .and_then(|top| top.group_last_item(&self.doc));
            let group = self.doc.add_list_group(ordered, parent.as_ref());
            self.lists.push(OpenList {
                num_id,
                level,
                group,
                counter: 0,
            });
        }

        let Some(top) = self.lists.last_mut() else {
            return;
        };
        top.counter += 1;
        let marker = if ordered {
            format!("{}.", top.counter)
        } else {
            "-".to_string()
        };
        let group = top.group.clone();
        self.doc
            .add_list_item(text, ordered, Some(marker), None, Some(&group));
    }
}

impl OpenList {
    fn group_last_item(&self, doc: &Document) -> Option<NodeRef> {
        let (_, idx) = self.group.parse().ok()?;
        doc.groups.get(idx)?.children.last().cloned()
    }
}

fn paragraph_text(p: &Paragraph) -> String {
    let mut out = String::new();
    collect_children(&p.children, &mut out);
    out
}

fn collect_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    match rc {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push(' '),
                        RunChild::Break(_) => out.push(' '),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_children(&link.children, out),
            _ => {}
        }
    }
}

fn is_title_style(style: &str) -> bool {
    style.eq_ignore_ascii_case("title")
}

fn is_code_style(style: &str) -> bool {
    let lower = style.to_ascii_lowercase();
    lower.contains("code") || lower == "htmlpreformatted"
}

/// `Heading1`, `heading 2`, `Heading3Char` -> level.
fn heading_level(style: &str) -> Option<u8> {
    let lower = style.to_ascii_lowercase().replace(' ', "");
    let rest = lower.strip_prefix("heading")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u8>().ok().map(|l| l.clamp(1, 6))
}

/// Build the table grid, honoring `gridSpan` and `vMerge`.
fn table_data(table: &Table) -> Result<TableData> {
    let mut data = TableData::default();
    // Column -> index of the cell a vertical merge continues.
    let mut merge_owner: HashMap<usize, usize> = HashMap::new();

    for (r, row) in table.rows.iter().enumerate() {
        let TableChild::TableRow(row) = row;
        let mut c = 0;
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            let props = serde_json::to_value(&cell.property)?;
            let col_span = json_usize(props.get("gridSpan")).unwrap_or(1).clamp(1, MAX_SPAN);
            let v_merge = json_str(props.get("verticalMerge"));

            if v_merge.as_deref() == Some("continue") {
                if let Some(owner) = merge_owner.get(&c).copied() {
                    let owner_cell = &mut data.table_cells[owner];
                    owner_cell.row_span = (owner_cell.row_span + 1).min(MAX_SPAN);
                    owner_cell.end_row_offset_idx =
                        owner_cell.start_row_offset_idx.saturating_add(owner_cell.row_span);
                    data.num_rows = data.num_rows.max(r + 1);
                    c += col_span;
                    continue;
                }
            }

            let text = cell
                .children
                .iter()
                .filter_map(|content| match content {
                    TableCellContent::Paragraph(p) => Some(collapse_whitespace(&paragraph_text(p))),
                    _ => None,
                })
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            let mut tc = TableCell::new(text, r, c).with_span(1, col_span);
            if r == 0 {
                tc = tc.column_header();
            }
            if v_merge.as_deref() == Some("restart") {
                merge_owner.insert(c, data.table_cells.len());
            } else {
                merge_owner.remove(&c);
            }
            data.add_cell(tc);
            c += col_span;
        }
    }
    Ok(data)
}

fn json_usize(v: Option<&Value>) -> Option<usize> {
    match v? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::Object(o) => o.get("val").and_then(|v| v.as_u64()).map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_str(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.to_ascii_lowercase()),
        Value::Object(o) => o.get("val").and_then(|v| v.as_str()).map(|s| s.to_ascii_lowercase()),
        _ => None,
    }
}

/// Numbering formats per `(num_id, level)` from the serialized numbering part.
fn numbering_formats(numberings: &Value) -> HashMap<(usize, usize), String> {
    let mut abstract_formats: HashMap<usize, Vec<(usize, String)>> = HashMap::new();
    if let Some(abstracts) = numberings.get("abstractNums").and_then(|v| v.as_array()) {
        for abs in abstracts {
            let Some(id) = json_usize(abs.get("id")) else {
                continue;
            };
            let levels = abs
                .get("levels")
                .and_then(|v| v.as_array())
                .map(|levels| {
                    levels
                        .iter()
                        .filter_map(|l| {
                            let level = json_usize(l.get("level"))?;
                            let format = json_str(l.get("format"))?;
                            Some((level, format))
                        })
                        .collect()
                })
                .unwrap_or_default();
            abstract_formats.insert(id, levels);
        }
    }

    let mut formats = HashMap::new();
    if let Some(nums) = numberings.get("numberings").and_then(|v| v.as_array()) {
        for num in nums {
            let (Some(id), Some(abs_id)) = (
                json_usize(num.get("id")),
                json_usize(num.get("abstractNumId")),
            ) else {
                continue;
            };
            for (level, format) in abstract_formats.get(&abs_id).into_iter().flatten() {
                formats.insert((id, *level), format.clone());
            }
        }
    }
    formats
}
