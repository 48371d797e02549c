//! CSV reader: one table with a header row.

use serde::{Deserialize, Serialize};

use super::{DeclarativeBackend, InputDocument};
use crate::detect::InputFormat;
use crate::error::{Error, Result};
use crate::model::{Document, TableData};

/// Delimiters tried when sniffing, in preference order.
const CANDIDATES: [u8; 4] = [b',', b';', b'|', b'\t'];
/// Lines inspected when sniffing the delimiter.
const SNIFF_LINES: usize = 20;

/// CSV reading options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Fixed delimiter; sniffed when `None`
    pub delimiter: Option<u8>,
    /// Fail on rows whose width differs from the header instead of padding
    pub strict: bool,
}

impl CsvOptions {
    /// Use a fixed delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Reject ragged rows.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// CSV backend.
#[derive(Debug, Default)]
pub struct CsvBackend {
    options: CsvOptions,
}

impl CsvBackend {
    /// Create a CSV backend.
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }
}

impl DeclarativeBackend for CsvBackend {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn supported_formats(&self) -> &[InputFormat] {
        &[InputFormat::Csv]
    }

    fn convert(&self, input: &InputDocument) -> Result<Document> {
        let text = input.text();
        let delimiter = self
            .options
            .delimiter
            .unwrap_or_else(|| sniff_delimiter(&text));
        log::debug!("CSV delimiter for {}: {:?}", input.name, delimiter as char);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|f| f.trim().to_string()).collect());
        }

        let mut doc = input.new_document();
        let Some(width) = rows.first().map(|r| r.len()) else {
            return Ok(doc);
        };
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            let message = format!(
                "row {} has {} fields, header has {}",
                idx + 1,
                row.len(),
                width
            );
            if self.options.strict {
                return Err(Error::backend(InputFormat::Csv, message));
            }
            log::warn!("{}: {}; padding ragged rows", input.name, message);
        }

        doc.add_table(TableData::from_rows(&rows, 1), None, None);
        Ok(doc)
    }
}

/// Pick the candidate that splits the sample lines most consistently.
///
/// Each candidate is scored by the number of lines on which it appears with
/// the same count as on the first line; ties prefer the earlier candidate.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let Some(first) = lines.first() else {
        return b',';
    };

    let mut best = (b',', 0usize);
    for candidate in CANDIDATES {
        let expected = count_outside_quotes(first, candidate);
        if expected == 0 {
            continue;
        }
        let consistent = lines
            .iter()
            .filter(|l| count_outside_quotes(l, candidate) == expected)
            .count();
        if consistent > best.1 {
            best = (candidate, consistent);
        }
    }
    best.0
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str) -> InputDocument {
        InputDocument::new("data.csv", InputFormat::Csv, text.as_bytes().to_vec())
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(sniff_delimiter("a;b\n\"1,5\";2\n"), b';');
        assert_eq!(sniff_delimiter("a|b|c\n1|2|3"), b'|');
        assert_eq!(sniff_delimiter("a\tb\n1\t2"), b'\t');
        assert_eq!(sniff_delimiter("single"), b',');
    }

    #[test]
    fn test_table_with_header() {
        let doc = CsvBackend::default()
            .convert(&input("Name;Age\nAda;36\nAlan;41\n"))
            .unwrap();
        let data = &doc.tables[0].data;
        assert_eq!((data.num_rows, data.num_cols), (3, 2));
        assert_eq!(data.header_row_count(), 1);
        assert_eq!(data.grid()[2][0].text, "Alan");
    }

    #[test]
    fn test_ragged_rows() {
        let text = "a,b,c\n1,2\n";
        let doc = CsvBackend::default().convert(&input(text)).unwrap();
        assert_eq!(doc.tables[0].data.num_cols, 3);

        let strict = CsvBackend::new(CsvOptions::default().strict());
        let err = strict.convert(&input(text)).unwrap_err();
        assert!(err.to_string().contains("row 2 has 2 fields"));
    }

    #[test]
    fn test_empty_input() {
        let doc = CsvBackend::default().convert(&input("")).unwrap();
        assert!(doc.tables.is_empty());
    }
}
