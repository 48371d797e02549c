//! Tesseract through its command-line interface.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use super::{OcrCell, OcrEngine, OcrOptions};
use crate::error::{Error, Result};
use crate::model::BoundingBox;

/// Environment variable overriding the tesseract binary.
pub const TESSERACT_ENV: &str = "TESSERACT_CMD";

/// TSV row level for single words.
const WORD_LEVEL: u32 = 5;

/// Runs `tesseract stdin stdout -l <langs> tsv`.
#[derive(Debug, Clone)]
pub struct TesseractCliOcr {
    options: OcrOptions,
}

impl TesseractCliOcr {
    /// Create an engine with the given options.
    pub fn new(options: OcrOptions) -> Self {
        Self { options }
    }

    fn run(&self, image: &[u8]) -> Result<String> {
        let cmd = &self.options.tesseract_cmd;
        let mut command = Command::new(cmd);
        command
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(self.options.lang_arg());
        if let Some(psm) = self.options.psm {
            command.arg("--psm").arg(psm.to_string());
        }
        command
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::Ocr(format!(
                "{} not found; install tesseract-ocr or set {}",
                cmd, TESSERACT_ENV
            )),
            _ => Error::Ocr(format!("failed to start {}: {}", cmd, e)),
        })?;

        // tesseract reads the whole image before writing anything
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image)?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!("{} failed: {}", cmd, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractCliOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &[u8], scale: f32) -> Result<Vec<OcrCell>> {
        let tsv = self.run(image)?;
        let cells: Vec<OcrCell> = parse_tsv(&tsv, scale)
            .into_iter()
            .filter(|c| c.confidence >= self.options.min_confidence)
            .collect();
        log::debug!("tesseract recognized {} lines", cells.len());
        Ok(cells)
    }
}

struct LineAcc {
    words: Vec<String>,
    bbox: BoundingBox,
    conf_sum: f32,
}

/// Parse tesseract TSV output into line cells.
///
/// Word rows (level 5) are grouped by `(block, par, line)`. Pixel boxes are
/// divided by `scale` to get page points; confidences are mapped to 0..=1.
pub fn parse_tsv(tsv: &str, scale: f32) -> Vec<OcrCell> {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let mut lines: BTreeMap<(u32, u32, u32), LineAcc> = BTreeMap::new();

    // level page_num block_num par_num line_num word_num left top width height conf text
    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let num = |i: usize| fields[i].trim().parse::<f32>().ok();
        if num(0) != Some(WORD_LEVEL as f32) {
            continue;
        }
        let text = fields[11].trim();
        let conf = num(10).unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let (Some(block), Some(par), Some(line)) = (num(2), num(3), num(4)) else {
            continue;
        };
        let (left, top) = (num(6).unwrap_or(0.0), num(7).unwrap_or(0.0));
        let (width, height) = (num(8).unwrap_or(0.0), num(9).unwrap_or(0.0));
        let bbox = BoundingBox::new(
            left / scale,
            top / scale,
            (left + width) / scale,
            (top + height) / scale,
        );

        let key = (block as u32, par as u32, line as u32);
        match lines.get_mut(&key) {
            Some(acc) => {
                acc.words.push(text.to_string());
                acc.bbox = acc.bbox.union(&bbox);
                acc.conf_sum += conf;
            }
            None => {
                lines.insert(
                    key,
                    LineAcc {
                        words: vec![text.to_string()],
                        bbox,
                        conf_sum: conf,
                    },
                );
            }
        }
    }

    lines
        .into_values()
        .map(|acc| OcrCell {
            confidence: (acc.conf_sum / acc.words.len() as f32 / 100.0).clamp(0.0, 1.0),
            text: acc.words.join(" "),
            bbox: acc.bbox,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1700\t2200\t-1\t
4\t1\t1\t1\t1\t0\t100\t100\t400\t40\t-1\t
5\t1\t1\t1\t1\t1\t100\t100\t180\t40\t96.5\tInvoice
5\t1\t1\t1\t1\t2\t300\t104\t200\t36\t91.5\tNumber
5\t1\t1\t1\t2\t1\t100\t200\t120\t40\t40\tTotal
5\t1\t2\t1\t1\t1\t900\t100\t100\t40\t-1\t
";

    #[test]
    fn test_parse_tsv_groups_lines() {
        let cells = parse_tsv(TSV, 2.0);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].text, "Invoice Number");
        assert!((cells[0].confidence - 0.94).abs() < 1e-3);
        assert_eq!(cells[0].bbox, BoundingBox::new(50.0, 50.0, 250.0, 70.0));
        assert_eq!(cells[1].text, "Total");
    }

    #[test]
    fn test_missing_binary() {
        let options = OcrOptions {
            tesseract_cmd: "/nonexistent/tesseract-binary".to_string(),
            ..OcrOptions::default()
        };
        let engine = TesseractCliOcr::new(options);
        let err = engine.recognize(b"png", 1.0).unwrap_err();
        assert!(matches!(err, Error::Ocr(ref m) if m.contains("not found")));
    }
}
