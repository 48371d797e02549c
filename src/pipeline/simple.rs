//! Pipeline for formats converted in one backend call.

use std::sync::Arc;
use std::time::Instant;

use super::{Pipeline, PipelineOutput};
use crate::backend::{BackendRegistry, InputDocument};
use crate::error::Result;

/// Runs the declarative backend registered for the input's format.
pub struct SimplePipeline {
    registry: Arc<BackendRegistry>,
}

impl SimplePipeline {
    /// Pipeline over the built-in backends.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(BackendRegistry::with_defaults()))
    }

    /// Pipeline over a custom registry.
    pub fn with_registry(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }
}

impl Default for SimplePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline for SimplePipeline {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn execute(&self, input: &InputDocument) -> Result<PipelineOutput> {
        let start = Instant::now();
        let document = self.registry.convert(input)?;
        let mut output = PipelineOutput::new(document);
        output.timings.add("backend", start.elapsed());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::InputFormat;
    use crate::error::Error;

    #[test]
    fn test_simple_pipeline_markdown() {
        let input = InputDocument::new("notes.md", InputFormat::Md, b"# Notes\n\nBody text.".to_vec());
        let output = SimplePipeline::new().execute(&input).unwrap();
        assert_eq!(output.document.name, "notes");
        assert_eq!(output.document.texts.len(), 2);
        assert!(output.errors.is_empty());
        assert!(output.timings.get("backend").is_some());
    }

    #[test]
    fn test_simple_pipeline_rejects_pdf() {
        let input = InputDocument::new("a.pdf", InputFormat::Pdf, b"%PDF-1.4".to_vec());
        let result = SimplePipeline::new().execute(&input);
        assert!(matches!(result, Err(Error::Backend { .. })));
    }
}
