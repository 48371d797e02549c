//! Summary of a multi-document chunking run.

use std::path::{Path, PathBuf};

use serde::Serialize;

const RULE_WIDTH: usize = 60;

/// Result of chunking one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkJobOutcome {
    Success {
        source: String,
        chunks: usize,
        output_file: PathBuf,
    },
    Failed {
        source: String,
        message: String,
    },
}

impl ChunkJobOutcome {
    pub fn success(source: impl Into<String>, chunks: usize, output_file: impl Into<PathBuf>) -> Self {
        Self::Success {
            source: source.into(),
            chunks,
            output_file: output_file.into(),
        }
    }

    pub fn failed(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Failure for an input path that does not exist.
    pub fn not_found(source: impl Into<String>) -> Self {
        Self::failed(source, "file not found")
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Success { source, .. } | Self::Failed { source, .. } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Collected outcomes of a chunking run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    output_dir: Option<PathBuf>,
    outcomes: Vec<ChunkJobOutcome>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary for reports written under `dir`.
    pub fn with_output_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: Some(dir.as_ref().to_path_buf()),
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: ChunkJobOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ChunkJobOutcome] {
        &self.outcomes
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.successful() < self.total()
    }

    pub fn total_chunks(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                ChunkJobOutcome::Success { chunks, .. } => *chunks,
                ChunkJobOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    /// Plain-text summary.
    pub fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = format!("{}\nSUMMARY\n{}\n\n", rule, rule);
        out.push_str(&format!(
            "Processed successfully: {} of {}\n",
            self.successful(),
            self.total()
        ));

        if self.successful() > 0 {
            out.push_str(&format!("  Total chunks: {}\n", self.total_chunks()));
            if let Some(dir) = &self.output_dir {
                out.push_str(&format!("  Output directory: {}\n", dir.display()));
            }
            out.push_str("\n  Files written:\n");
            for outcome in &self.outcomes {
                if let ChunkJobOutcome::Success {
                    chunks,
                    output_file,
                    ..
                } = outcome
                {
                    out.push_str(&format!("  - {} ({} chunks)\n", output_file.display(), chunks));
                }
            }
        }

        let failed: Vec<_> = self
            .outcomes
            .iter()
            .filter_map(|o| match o {
                ChunkJobOutcome::Failed { source, message } => Some((source, message)),
                ChunkJobOutcome::Success { .. } => None,
            })
            .collect();
        if !failed.is_empty() {
            out.push_str(&format!("\nFailed: {}\n", failed.len()));
            for (source, message) in failed {
                out.push_str(&format!("  - {}: {}\n", source, message));
            }
        }

        out.push_str(&format!("\n{}\n", rule));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_and_render() {
        let mut summary = BatchSummary::with_output_dir("out");
        summary.push(ChunkJobOutcome::success("a.pdf", 12, "out/a_chunks.txt"));
        summary.push(ChunkJobOutcome::success("b.md", 3, "out/b_chunks.txt"));
        summary.push(ChunkJobOutcome::not_found("missing.pdf"));

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.successful(), 2);
        assert_eq!(summary.total_chunks(), 15);
        assert!(summary.has_failures());

        let text = summary.render();
        assert!(text.contains("Processed successfully: 2 of 3"));
        assert!(text.contains("Total chunks: 15"));
        assert!(text.contains("  - out/a_chunks.txt (12 chunks)"));
        assert!(text.contains("Failed: 1\n  - missing.pdf: file not found"));
    }

    #[test]
    fn test_all_failed() {
        let mut summary = BatchSummary::new();
        summary.push(ChunkJobOutcome::failed("x.pdf", "broken xref"));
        let text = summary.render();
        assert!(text.contains("Processed successfully: 0 of 1"));
        assert!(!text.contains("Total chunks"));
        assert_eq!(summary.outcomes()[0].source(), "x.pdf");
    }

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(ChunkJobOutcome::not_found("a.pdf")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "file not found");
    }
}
