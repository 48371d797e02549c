//! AsciiDoc reader: a line-oriented parser for the common block subset.

use super::{collapse_whitespace, DeclarativeBackend, InputDocument};
use crate::detect::InputFormat;
use crate::error::Result;
use crate::model::{DocItemLabel, Document, ImageRef, NodeRef, TableData};

/// AsciiDoc backend.
#[derive(Debug, Default)]
pub struct AsciiDocBackend;

impl AsciiDocBackend {
    /// Create a new AsciiDoc backend.
    pub fn new() -> Self {
        Self
    }
}

impl DeclarativeBackend for AsciiDocBackend {
    fn name(&self) -> &'static str {
        "asciidoc"
    }

    fn supported_formats(&self) -> &[InputFormat] {
        &[InputFormat::Asciidoc]
    }

    fn convert(&self, input: &InputDocument) -> Result<Document> {
        let text = input.text();
        let mut parser = AdocParser::new(input.new_document());
        for line in text.lines() {
            parser.line(line);
        }
        Ok(parser.finish())
    }
}

enum Block {
    Paragraph(Vec<String>),
    Code {
        language: Option<String>,
        lines: Vec<String>,
    },
    Table(Vec<String>),
}

struct OpenList {
    group: NodeRef,
    ordered: bool,
    depth: usize,
    count: usize,
}

struct AdocParser {
    doc: Document,
    block: Option<Block>,
    lists: Vec<OpenList>,
    pending_caption: Option<String>,
    pending_language: Option<String>,
    title_seen: bool,
}

impl AdocParser {
    fn new(doc: Document) -> Self {
        Self {
            doc,
            block: None,
            lists: Vec::new(),
            pending_caption: None,
            pending_language: None,
            title_seen: false,
        }
    }

    fn line(&mut self, raw: &str) {
        let line = raw.trim_end();

        // Delimited blocks swallow everything up to their closing fence.
        match &mut self.block {
            Some(Block::Code { lines, .. }) => {
                if line == "----" || line == "...." {
                    self.flush();
                } else {
                    lines.push(raw.to_string());
                }
                return;
            }
            Some(Block::Table(lines)) => {
                if line == "|===" {
                    self.flush();
                } else {
                    lines.push(line.to_string());
                }
                return;
            }
            _ => {}
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            self.flush();
            self.lists.clear();
            return;
        }
        if trimmed.starts_with("//") || is_attribute_entry(trimmed) {
            return;
        }
        if trimmed.starts_with("[source") {
            self.flush();
            self.pending_language = trimmed
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .nth(1)
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            return;
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            return;
        }
        if trimmed == "----" || trimmed == "...." {
            self.flush();
            self.lists.clear();
            self.block = Some(Block::Code {
                language: self.pending_language.take(),
                lines: Vec::new(),
            });
            return;
        }
        if trimmed == "|===" {
            self.flush();
            self.lists.clear();
            self.block = Some(Block::Table(Vec::new()));
            return;
        }
        if let Some(caption) = trimmed.strip_prefix('.') {
            if !caption.starts_with(['.', ' ']) && !caption.is_empty() {
                self.flush();
                self.pending_caption = Some(caption.trim().to_string());
                return;
            }
        }
        if let Some((level, text)) = heading(trimmed) {
            self.flush();
            self.lists.clear();
            if level == 0 && !self.title_seen {
                self.title_seen = true;
                self.doc.add_title(text, None, None);
            } else {
                self.doc.add_heading(text, level.max(1), None, None);
            }
            return;
        }
        if let Some(rest) = trimmed.strip_prefix("image::") {
            self.flush();
            self.lists.clear();
            self.image(rest);
            return;
        }
        if let Some((ordered, depth, text)) = list_item(trimmed) {
            self.flush();
            self.list_item(ordered, depth, text);
            return;
        }

        match &mut self.block {
            Some(Block::Paragraph(lines)) => lines.push(trimmed.to_string()),
            _ => {
                self.flush();
                self.block = Some(Block::Paragraph(vec![trimmed.to_string()]));
            }
        }
    }

    fn list_item(&mut self, ordered: bool, depth: usize, text: &str) {
        while self
            .lists
            .last()
            .is_some_and(|l| l.depth > depth || (l.depth == depth && l.ordered != ordered))
        {
            self.lists.pop();
        }
        let needs_group = self.lists.last().map_or(true, |l| l.depth < depth);
        if needs_group {
            let parent = self
                .lists
                .last()
                .and_then(|l| self.doc.resolve(&l.group))
                .and_then(|g| g.children().last().cloned());
            let group = self.doc.add_list_group(ordered, parent.as_ref());
            self.lists.push(OpenList {
                group,
                ordered,
                depth,
                count: 0,
            });
        }
        let Some(list) = self.lists.last_mut() else {
            return;
        };
        list.count += 1;
        let marker = if ordered {
            format!("{}.", list.count)
        } else {
            "-".to_string()
        };
        let group = list.group.clone();
        let text = collapse_whitespace(text);
        if let Some((checked, rest)) = checkbox(&text) {
            let label = if checked {
                DocItemLabel::CheckboxSelected
            } else {
                DocItemLabel::CheckboxUnselected
            };
            self.doc.add_text(label, rest, None, Some(&group));
            return;
        }
        self.doc
            .add_list_item(text, ordered, Some(marker), None, Some(&group));
    }

    fn image(&mut self, rest: &str) {
        let (target, alt) = match rest.split_once('[') {
            Some((target, attrs)) => (target, attrs.trim_end_matches(']')),
            None => (rest, ""),
        };
        let picture = self
            .doc
            .add_picture(Some(ImageRef::from_uri(target.trim())), None, None);
        let alt = alt.split(',').next().unwrap_or_default().trim();
        let caption = self
            .pending_caption
            .take()
            .or_else(|| (!alt.is_empty()).then(|| alt.to_string()));
        if let Some(caption) = caption {
            // owner was just created, the ref is valid
            let _ = self.doc.add_caption(&picture, caption, None);
        }
    }

    fn flush(&mut self) {
        match self.block.take() {
            Some(Block::Paragraph(lines)) => {
                let text = collapse_whitespace(&lines.join(" "));
                if !text.is_empty() {
                    self.doc.add_text(DocItemLabel::Text, text, None, None);
                }
            }
            Some(Block::Code { language, lines }) => {
                self.doc.add_code(lines.join("\n"), language, None, None);
            }
            Some(Block::Table(lines)) => {
                let rows = table_rows(&lines);
                if rows.is_empty() {
                    return;
                }
                let table = self.doc.add_table(TableData::from_rows(&rows, 1), None, None);
                if let Some(caption) = self.pending_caption.take() {
                    let _ = self.doc.add_caption(&table, caption, None);
                }
            }
            None => {}
        }
    }

    fn finish(mut self) -> Document {
        self.flush();
        self.doc
    }
}

/// `= Title` is level 0, `== Section` level 1, up to `======`.
fn heading(line: &str) -> Option<(u8, &str)> {
    let level = line.chars().take_while(|&c| c == '=').count();
    if level == 0 || level > 6 {
        return None;
    }
    let text = line[level..].strip_prefix(' ')?.trim();
    (!text.is_empty()).then_some(((level - 1) as u8, text))
}

/// `* item`, `** nested`, `- item`, `. ordered`, `.. nested ordered`.
fn list_item(line: &str) -> Option<(bool, usize, &str)> {
    let first = line.chars().next()?;
    let (ordered, marker) = match first {
        '*' => (false, '*'),
        '-' => (false, '-'),
        '.' => (true, '.'),
        _ => return None,
    };
    let depth = line.chars().take_while(|&c| c == marker).count();
    let text = line[depth..].strip_prefix(' ')?.trim();
    (!text.is_empty()).then_some((ordered, depth, text))
}

fn checkbox(text: &str) -> Option<(bool, &str)> {
    if let Some(rest) = text.strip_prefix("[x] ").or_else(|| text.strip_prefix("[*] ")) {
        return Some((true, rest));
    }
    text.strip_prefix("[ ] ").map(|rest| (false, rest))
}

fn is_attribute_entry(line: &str) -> bool {
    line.starts_with(':') && (line.ends_with(':') || line[1..].contains(": "))
}

/// Split `|a |b` rows. The first line fixes the width when it holds several
/// cells; otherwise the first blank line does.
fn table_rows(lines: &[String]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut width = 0;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                if width == 0 {
                    width = current.len();
                }
                rows.push(std::mem::take(&mut current));
            }
            continue;
        }
        let cells: Vec<String> = line
            .split('|')
            .skip(1)
            .map(|c| c.trim().to_string())
            .collect();
        let count = cells.len();
        current.extend(cells);
        if width == 0 && rows.is_empty() && count > 1 {
            width = current.len();
            rows.push(std::mem::take(&mut current));
        } else if width > 0 && current.len() >= width {
            rows.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupLabel;

    fn convert(text: &str) -> Document {
        let input = InputDocument::new("guide.adoc", InputFormat::Asciidoc, text.as_bytes().to_vec());
        AsciiDocBackend::new().convert(&input).unwrap()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let doc = convert("= Guide\n:toc:\n\n== Install\n\nRun the\ninstaller.\n\n=== Linux\nUse apt.\n");
        let texts: Vec<_> = doc.texts.iter().map(|t| (t.label, t.text.as_str(), t.level)).collect();
        assert_eq!(
            texts,
            vec![
                (DocItemLabel::Title, "Guide", None),
                (DocItemLabel::SectionHeader, "Install", Some(1)),
                (DocItemLabel::Text, "Run the installer.", None),
                (DocItemLabel::SectionHeader, "Linux", Some(2)),
                (DocItemLabel::Text, "Use apt.", None),
            ]
        );
    }

    #[test]
    fn test_lists_nest() {
        let doc = convert("* one\n** one.a\n* two\n\n. first\n. second\n");
        let lists: Vec<_> = doc.groups.iter().map(|g| g.label).collect();
        assert_eq!(lists, vec![GroupLabel::List, GroupLabel::List, GroupLabel::OrderedList]);
        // nested list hangs off "one"
        assert_eq!(doc.groups[1].parent.as_ref(), Some(&doc.texts[0].self_ref));
        assert_eq!(doc.texts[4].marker.as_deref(), Some("2."));
    }

    #[test]
    fn test_table_code_and_image() {
        let text = ".Versions\n|===\n|Name |Version\n\n|core |1.0\n|cli |2.1\n|===\n\n[source,rust]\n----\nfn main() {}\n----\n\nimage::arch.png[Architecture]\n";
        let doc = convert(text);
        let data = &doc.tables[0].data;
        assert_eq!((data.num_rows, data.num_cols), (3, 2));
        assert_eq!(data.grid()[2][1].text, "2.1");
        assert_eq!(doc.tables[0].captions.len(), 1);

        let code = doc.texts.iter().find(|t| t.label == DocItemLabel::Code).unwrap();
        assert_eq!(code.text, "fn main() {}");
        assert_eq!(code.code_language.as_deref(), Some("rust"));

        assert_eq!(doc.pictures.len(), 1);
        let caption = &doc.pictures[0].captions[0];
        assert_eq!(doc.texts_of(std::slice::from_ref(caption)).next(), Some("Architecture"));
    }
}
