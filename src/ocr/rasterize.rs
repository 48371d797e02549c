//! Page rendering through poppler's `pdftoppm`.

use std::io::{ErrorKind, Write};
use std::process::Command;

use super::PageRasterizer;
use crate::error::{Error, Result};

/// Environment variable overriding the `pdftoppm` binary.
pub const PDFTOPPM_ENV: &str = "PDFTOPPM_CMD";

/// Renders one page per call with `pdftoppm -png -singlefile`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    cmd: String,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self {
            cmd: std::env::var(PDFTOPPM_ENV).unwrap_or_else(|_| "pdftoppm".to_string()),
        }
    }
}

impl PdftoppmRasterizer {
    /// Use a specific binary.
    pub fn with_command(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    fn rasterize(&self, pdf: &[u8], page_no: u32, dpi: u32) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("page.pdf");
        let prefix = dir.path().join("page");
        {
            let mut file = std::fs::File::create(&input)?;
            file.write_all(pdf)?;
        }

        let page = page_no.to_string();
        let output = Command::new(&self.cmd)
            .args(["-f", &page, "-l", &page])
            .args(["-r", &dpi.to_string()])
            .args(["-png", "-singlefile"])
            .arg(&input)
            .arg(&prefix)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::Ocr(format!(
                    "{} not found; install poppler-utils or set {}",
                    self.cmd, PDFTOPPM_ENV
                )),
                _ => Error::Io(e),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!(
                "{} failed on page {}: {}",
                self.cmd,
                page_no,
                stderr.trim()
            )));
        }

        let png = std::fs::read(prefix.with_extension("png"))?;
        log::trace!("rendered page {} at {} dpi ({} bytes)", page_no, dpi, png.len());
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_ocr_error() {
        let rasterizer = PdftoppmRasterizer::with_command("/nonexistent/pdftoppm-binary");
        let err = rasterizer.rasterize(b"%PDF-1.4", 1, 72).unwrap_err();
        assert!(matches!(err, Error::Ocr(ref m) if m.contains("not found")));
    }
}
