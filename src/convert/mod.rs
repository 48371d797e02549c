//! The document converter.
//!
//! [`DocumentConverter`] loads a [`DocumentSource`], checks its format
//! against the allowed list, and runs the pipeline chosen by the format's
//! [`FormatOption`].
//!
//! # Example
//!
//! ```no_run
//! use docmill::convert::DocumentConverter;
//! use docmill::export::{export_to_markdown, MarkdownOptions};
//! use docmill::InputFormat;
//!
//! fn main() -> docmill::Result<()> {
//!     let converter = DocumentConverter::new()
//!         .with_allowed_formats(vec![InputFormat::Pdf, InputFormat::Docx]);
//!
//!     let result = converter.convert("report.pdf")?;
//!     println!("{}", export_to_markdown(&result.document, &MarkdownOptions::default()));
//!     Ok(())
//! }
//! ```

mod result;
mod source;

pub use self::result::{
    ConversionResult, ConversionStatus, ErrorComponent, ErrorItem, InputInfo, Timings,
};
pub use self::source::{
    filename_from_content_disposition, filename_from_url, is_url, DocumentSource,
};

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::backend::{BackendRegistry, InputDocument};
use crate::detect::InputFormat;
use crate::error::{Error, Result};
use crate::export::{export_to_indented_text, IndentedTextOptions};
use crate::ocr::{OcrEngine, PageRasterizer};
use crate::pipeline::{
    PdfBackendKind, PdfPipelineOptions, Pipeline, SimplePipeline, StandardPdfPipeline,
};

/// Text truncation used by the debug tree dump.
const DEBUG_TEXT_LEN: usize = 16;

/// Which pipeline converts a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// One declarative backend call
    Simple,
    /// Page-level layout analysis with OCR
    StandardPdf,
}

/// How one input format is converted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOption {
    /// Pipeline choice
    pub pipeline: PipelineKind,
    /// Reader for PDF inputs
    pub pdf_backend: PdfBackendKind,
    /// Options for the PDF pipeline
    pub pipeline_options: PdfPipelineOptions,
}

impl FormatOption {
    /// Default option for a format.
    pub fn for_format(format: InputFormat) -> Self {
        let pipeline = match format {
            InputFormat::Pdf | InputFormat::Image => PipelineKind::StandardPdf,
            _ => PipelineKind::Simple,
        };
        Self {
            pipeline,
            pdf_backend: PdfBackendKind::default(),
            pipeline_options: PdfPipelineOptions::default(),
        }
    }

    /// Set the PDF reader.
    pub fn with_pdf_backend(mut self, backend: PdfBackendKind) -> Self {
        self.pdf_backend = backend;
        self
    }

    /// Set the PDF pipeline options.
    pub fn with_pipeline_options(mut self, options: PdfPipelineOptions) -> Self {
        self.pipeline_options = options;
        self
    }
}

impl Default for FormatOption {
    fn default() -> Self {
        Self::for_format(InputFormat::Pdf)
    }
}

/// Serializable converter settings, as loaded from a JSON config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Allowed formats; all when absent
    pub allowed_formats: Option<Vec<InputFormat>>,
    /// PDF and image pipeline options
    pub pdf: PdfPipelineOptions,
    /// PDF reader
    pub pdf_backend: PdfBackendKind,
    /// URL fetch timeout in seconds
    pub document_timeout_secs: Option<u64>,
    /// Largest accepted input in bytes
    pub max_file_size: Option<u64>,
    /// Largest accepted page count per PDF
    pub max_num_pages: Option<u32>,
}

impl ConverterConfig {
    /// Load settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Converts sources into documents.
pub struct DocumentConverter {
    allowed_formats: BTreeSet<InputFormat>,
    format_options: HashMap<InputFormat, FormatOption>,
    document_timeout: Option<Duration>,
    max_file_size: Option<u64>,
    max_num_pages: Option<u32>,
    registry: Arc<BackendRegistry>,
    ocr_engine: Option<Arc<dyn OcrEngine>>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
}

impl DocumentConverter {
    /// Converter allowing every format with default options.
    pub fn new() -> Self {
        Self {
            allowed_formats: InputFormat::ALL.into_iter().collect(),
            format_options: HashMap::new(),
            document_timeout: None,
            max_file_size: None,
            max_num_pages: None,
            registry: Arc::new(BackendRegistry::with_defaults()),
            ocr_engine: None,
            rasterizer: None,
        }
    }

    /// Converter built from config-file settings.
    pub fn from_config(config: &ConverterConfig) -> Self {
        let mut converter = Self::new();
        if let Some(formats) = &config.allowed_formats {
            converter = converter.with_allowed_formats(formats.clone());
        }
        for format in [InputFormat::Pdf, InputFormat::Image] {
            let option = FormatOption::for_format(format)
                .with_pdf_backend(config.pdf_backend)
                .with_pipeline_options(config.pdf.clone());
            converter = converter.with_format_option(format, option);
        }
        converter.document_timeout = config.document_timeout_secs.map(Duration::from_secs);
        converter.max_file_size = config.max_file_size;
        converter.max_num_pages = config.max_num_pages;
        converter
    }

    /// Restrict the accepted formats.
    pub fn with_allowed_formats(mut self, formats: Vec<InputFormat>) -> Self {
        self.allowed_formats = formats.into_iter().collect();
        self
    }

    /// Override the conversion of one format.
    pub fn with_format_option(mut self, format: InputFormat, option: FormatOption) -> Self {
        self.format_options.insert(format, option);
        self
    }

    /// Bound URL fetches.
    pub fn with_document_timeout(mut self, timeout: Duration) -> Self {
        self.document_timeout = Some(timeout);
        self
    }

    /// Refuse inputs larger than `bytes`.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Refuse PDFs with more than `pages` pages.
    pub fn with_max_num_pages(mut self, pages: u32) -> Self {
        self.max_num_pages = Some(pages);
        self
    }

    /// Use custom declarative backends.
    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Use a custom OCR engine for PDF and image inputs.
    pub fn with_ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Use a custom page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Whether a format may be converted.
    pub fn is_allowed(&self, format: InputFormat) -> bool {
        self.allowed_formats.contains(&format)
    }

    /// Allowed formats in declaration order.
    pub fn allowed_formats(&self) -> Vec<InputFormat> {
        self.allowed_formats.iter().copied().collect()
    }

    /// Effective option for a format.
    pub fn format_option(&self, format: InputFormat) -> FormatOption {
        self.format_options
            .get(&format)
            .cloned()
            .unwrap_or_else(|| FormatOption::for_format(format))
    }

    fn pipeline_for(&self, format: InputFormat) -> Box<dyn Pipeline> {
        let option = self.format_option(format);
        match option.pipeline {
            PipelineKind::Simple => Box::new(SimplePipeline::with_registry(Arc::clone(&self.registry))),
            PipelineKind::StandardPdf => {
                let mut pipeline = StandardPdfPipeline::new(option.pipeline_options, option.pdf_backend);
                if let Some(engine) = &self.ocr_engine {
                    pipeline = pipeline.with_ocr_engine(Arc::clone(engine));
                }
                if let Some(rasterizer) = &self.rasterizer {
                    pipeline = pipeline.with_rasterizer(Arc::clone(rasterizer));
                }
                if let Some(limit) = self.max_num_pages {
                    pipeline = pipeline.with_max_pages(limit);
                }
                Box::new(pipeline)
            }
        }
    }

    fn load(&self, source: &DocumentSource) -> Result<InputDocument> {
        source.load(self.document_timeout, self.max_file_size)
    }

    /// Convert one source.
    ///
    /// Fails with [`Error::FormatNotAllowed`] when the format is not on the
    /// allowed list; I/O and backend failures are errors too.
    pub fn convert(&self, source: impl Into<DocumentSource>) -> Result<ConversionResult> {
        let source = source.into();
        let start = Instant::now();
        let input = self.load(&source)?;
        let load_time = start.elapsed();
        if !self.is_allowed(input.format) {
            return Err(Error::FormatNotAllowed(input.format));
        }
        let mut result = self.convert_input(&input)?;
        result.timings.add("load", load_time);
        Ok(result)
    }

    /// Convert several sources, one result per source in input order.
    ///
    /// Inputs whose format is unknown or not allowed are `Skipped`. Other
    /// failures become `Failure` results, or the first one is returned as
    /// an error when `raises_on_error` is set.
    pub fn convert_all<I, S>(&self, sources: I, raises_on_error: bool) -> Result<Vec<ConversionResult>>
    where
        I: IntoIterator<Item = S>,
        S: Into<DocumentSource>,
    {
        let mut results = Vec::new();
        for source in sources {
            let source = source.into();
            let name = source.name();
            let start = Instant::now();
            let input = match self.load(&source) {
                Ok(input) => input,
                Err(Error::UnknownFormat(what)) => {
                    log::info!("Skipping {}: unknown format", name);
                    results.push(ConversionResult::skipped(
                        InputInfo::unloaded(name),
                        format!("unknown format: {}", what),
                    ));
                    continue;
                }
                Err(e) if raises_on_error => return Err(e),
                Err(e) => {
                    log::error!("Failed to load {}: {}", name, e);
                    let error = ErrorItem::new(ErrorComponent::UserInput, "converter", e.to_string());
                    results.push(ConversionResult::failed(InputInfo::unloaded(name), error));
                    continue;
                }
            };
            let load_time = start.elapsed();

            if !self.is_allowed(input.format) {
                log::info!("Skipping {}: format {} not allowed", name, input.format);
                results.push(ConversionResult::skipped(
                    InputInfo::from_input(&input),
                    format!("format {} not allowed", input.format),
                ));
                continue;
            }

            match self.convert_input(&input) {
                Ok(mut result) => {
                    result.timings.add("load", load_time);
                    results.push(result);
                }
                Err(e) if raises_on_error => return Err(e),
                Err(e) => {
                    log::error!("Failed to convert {}: {}", name, e);
                    let module = self.pipeline_for(input.format).name();
                    let error = ErrorItem::new(ErrorComponent::DocumentBackend, module, e.to_string());
                    results.push(ConversionResult::failed(InputInfo::from_input(&input), error));
                }
            }
        }
        Ok(results)
    }

    /// Convert an already loaded input, ignoring the allowed list.
    pub fn convert_input(&self, input: &InputDocument) -> Result<ConversionResult> {
        let start = Instant::now();
        let pipeline = self.pipeline_for(input.format);
        log::debug!("Converting {} with the {} pipeline", input.name, pipeline.name());
        let output = pipeline.execute(input)?;

        let status = if output.errors.is_empty() {
            ConversionStatus::Success
        } else {
            ConversionStatus::PartialSuccess
        };
        let mut info = InputInfo::from_input(input);
        info.page_count = output
            .metadata
            .as_ref()
            .map(|m| m.page_count)
            .filter(|c| *c > 0);

        if log::log_enabled!(log::Level::Debug) {
            let tree = export_to_indented_text(
                &output.document,
                &IndentedTextOptions::default().with_max_text_len(DEBUG_TEXT_LEN),
            );
            log::debug!("Document tree of {}:\n{}", input.name, tree);
        }
        log::info!(
            "Converted {} in {:.2?} ({})",
            input.name,
            start.elapsed(),
            status
        );

        Ok(ConversionResult {
            input: info,
            status,
            document: output.document,
            errors: output.errors,
            timings: output.timings,
            metadata: output.metadata,
        })
    }
}

impl Default for DocumentConverter {
    fn default() -> Self {
        Self::new()
    }
}
