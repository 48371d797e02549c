//! Conversion outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{DocumentMetadata, InputDocument};
use crate::detect::InputFormat;
use crate::model::Document;

/// Overall outcome of converting one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Every page converted
    Success,
    /// A document was produced but some pages failed
    PartialSuccess,
    /// Nothing usable was produced
    Failure,
    /// The input format is not allowed
    Skipped,
}

impl ConversionStatus {
    /// Whether a document is available.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess)
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Stage of the conversion an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorComponent {
    /// Bad or unreadable input
    UserInput,
    /// A format backend
    DocumentBackend,
    /// OCR, layout or table detection
    Model,
    /// Turning page elements into document items
    DocAssembler,
}

/// A recorded, non-fatal conversion error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorItem {
    /// Stage that failed
    pub component: ErrorComponent,
    /// Module name within the stage (backend or model name)
    pub module: String,
    /// Human-readable description
    pub message: String,
}

impl ErrorItem {
    /// Create an error item.
    pub fn new(component: ErrorComponent, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component,
            module: module.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.module, self.message)
    }
}

/// Wall-clock time spent per stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timings(BTreeMap<String, Duration>);

impl Timings {
    /// Create empty timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `elapsed` to a stage.
    pub fn add(&mut self, stage: &str, elapsed: Duration) {
        *self.0.entry(stage.to_string()).or_default() += elapsed;
    }

    /// Time spent in a stage.
    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.0.get(stage).copied()
    }

    /// Sum over all stages.
    pub fn total(&self) -> Duration {
        self.0.values().sum()
    }

    /// Merge another set of timings into this one.
    pub fn merge(&mut self, other: Timings) {
        for (stage, elapsed) in other.0 {
            *self.0.entry(stage).or_default() += elapsed;
        }
    }

    /// Stages in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether nothing was timed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Facts about the input of a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputInfo {
    /// File name
    pub name: String,
    /// Detected format, if any
    pub format: Option<InputFormat>,
    /// Size in bytes
    pub size: u64,
    /// First 8 bytes of the SHA-256 of the input
    pub hash: Option<u64>,
    /// Page count for paginated formats
    pub page_count: Option<u32>,
}

impl InputInfo {
    /// Info for a loaded input.
    pub fn from_input(input: &InputDocument) -> Self {
        Self {
            name: input.name.clone(),
            format: Some(input.format),
            size: input.len() as u64,
            hash: Some(input.hash),
            page_count: None,
        }
    }

    /// Info for an input that never loaded.
    pub fn unloaded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: None,
            size: 0,
            hash: None,
            page_count: None,
        }
    }
}

/// The outcome of converting one input.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// What was converted
    pub input: InputInfo,
    /// Overall status
    pub status: ConversionStatus,
    /// The converted document; empty unless the status is ok
    pub document: Document,
    /// Non-fatal errors, page failures included
    pub errors: Vec<ErrorItem>,
    /// Per-stage durations
    pub timings: Timings,
    /// Source metadata for paginated inputs
    pub metadata: Option<DocumentMetadata>,
}

impl ConversionResult {
    /// A skipped input.
    pub fn skipped(input: InputInfo, reason: impl Into<String>) -> Self {
        let document = Document::new(stem_of(&input.name));
        Self {
            errors: vec![ErrorItem::new(ErrorComponent::UserInput, "converter", reason)],
            input,
            status: ConversionStatus::Skipped,
            document,
            timings: Timings::new(),
            metadata: None,
        }
    }

    /// A failed input.
    pub fn failed(input: InputInfo, error: ErrorItem) -> Self {
        let document = Document::new(stem_of(&input.name));
        Self {
            input,
            status: ConversionStatus::Failure,
            document,
            errors: vec![error],
            timings: Timings::new(),
            metadata: None,
        }
    }

    /// Whether a document is available.
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

fn stem_of(name: &str) -> String {
    std::path::Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_accumulate() {
        let mut timings = Timings::new();
        timings.add("layout", Duration::from_millis(5));
        timings.add("layout", Duration::from_millis(7));
        timings.add("ocr", Duration::from_millis(1));
        assert_eq!(timings.get("layout"), Some(Duration::from_millis(12)));
        assert_eq!(timings.total(), Duration::from_millis(13));
        let stages: Vec<&str> = timings.iter().map(|(s, _)| s).collect();
        assert_eq!(stages, vec!["layout", "ocr"]);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ConversionStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
        assert_eq!(ConversionStatus::Skipped.to_string(), "skipped");
        assert!(!ConversionStatus::Failure.is_ok());
    }

    #[test]
    fn test_skipped_result() {
        let result = ConversionResult::skipped(InputInfo::unloaded("data/table.csv"), "csv not allowed");
        assert_eq!(result.status, ConversionStatus::Skipped);
        assert_eq!(result.document.name, "table");
        assert_eq!(result.errors[0].component, ErrorComponent::UserInput);
        assert_eq!(result.errors[0].to_string(), "[converter] csv not allowed");
    }
}
