//! docmill CLI - document conversion and chunking tool

mod inputs;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use docmill::chunking::{Chunker, HuggingFaceTokenizer, HybridChunker, Tokenizer, WordTokenizer};
use docmill::convert::{ConversionResult, ConversionStatus, ConverterConfig, DocumentConverter};
use docmill::export::{
    export_to_json, export_to_markdown, export_to_markdown_with_stats, export_to_text,
    export_to_yaml, JsonFormat, MarkdownOptions, PageSelection,
};
use docmill::report::{
    write_chunk_report, BatchSummary, ChunkJobOutcome, ChunkReport, ExplainReport,
    CHUNK_REPORT_TITLE,
};
use docmill::{DocumentSource, InputFormat, PdfBackendKind};

use inputs::{expand_inputs, output_stem};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "docmill")]
#[command(version)]
#[command(about = "Convert documents to Markdown, JSON and YAML, and chunk them for retrieval", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Converter settings as JSON
    #[arg(long, value_name = "FILE", env = "DOCMILL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert documents and write one file per requested format
    Convert {
        /// Input files, directories or URLs
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", env = "DOCMILL_OUTPUT", default_value = ".")]
        output: PathBuf,

        /// Output formats (JSON files are written compact)
        #[arg(long, value_enum, value_delimiter = ',', default_value = "md", env = "DOCMILL_TO")]
        to: Vec<OutputKind>,

        /// Stop at the first failed input
        #[arg(long)]
        abort_on_error: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Convert a document to Markdown
    #[command(alias = "md")]
    Markdown {
        /// Input file or URL
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Render tables as HTML
        #[arg(long)]
        html_tables: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Convert a document to JSON
    Json {
        /// Input file or URL
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Convert a document to YAML
    Yaml {
        /// Input file or URL
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Chunk documents and write one chunk report per input
    Chunk {
        /// Input files, directories or URLs
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,

        /// Output directory for `<stem>_chunks.txt`
        #[arg(short, long, value_name = "DIR", env = "DOCMILL_OUTPUT", default_value = "output_chunks")]
        output: PathBuf,

        /// Token budget per chunk
        #[arg(long, env = "DOCMILL_MAX_TOKENS", default_value_t = 64)]
        max_tokens: usize,

        /// tokenizer.json path or HuggingFace model id (word counts if unset)
        #[arg(long, value_name = "FILE|MODEL", env = "DOCMILL_TOKENIZER")]
        tokenizer: Option<String>,

        /// Keep undersized neighbouring chunks apart
        #[arg(long)]
        no_merge_peers: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Write a report explaining the converted structure
    Explain {
        /// Input file or URL
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Show document information
    Info {
        /// Input file or URL
        #[arg(value_name = "INPUT")]
        input: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },
}

/// Converter settings shared by every subcommand.
#[derive(Args, Clone, Default)]
struct ConvertArgs {
    /// Accepted input formats (pdf, image, docx, pptx, html, asciidoc, csv, md)
    #[arg(long, value_delimiter = ',', value_name = "FORMAT", env = "DOCMILL_FROM")]
    from: Vec<String>,

    /// Enable OCR of scanned pages
    #[arg(long, overrides_with = "no_ocr")]
    ocr: bool,

    /// Disable OCR
    #[arg(long)]
    no_ocr: bool,

    /// OCR every page, replacing its programmatic text
    #[arg(long)]
    force_ocr: bool,

    /// Tesseract languages
    #[arg(long, value_delimiter = ',', value_name = "LANG", env = "DOCMILL_OCR_LANG")]
    ocr_lang: Vec<String>,

    /// Tesseract executable
    #[arg(long, value_name = "CMD", env = "TESSERACT_CMD")]
    tesseract_cmd: Option<String>,

    /// Skip table detection
    #[arg(long)]
    no_tables: bool,

    /// PDF reader
    #[arg(long, value_enum, env = "DOCMILL_PDF_BACKEND")]
    pdf_backend: Option<PdfBackendArg>,

    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long, env = "DOCMILL_PAGES")]
    pages: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    /// Markdown
    Md,
    /// Lossless JSON
    Json,
    /// Lossless YAML
    Yaml,
    /// Plain text
    Text,
}

impl OutputKind {
    fn extension(&self) -> &'static str {
        match self {
            OutputKind::Md => "md",
            OutputKind::Json => "json",
            OutputKind::Yaml => "yaml",
            OutputKind::Text => "txt",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PdfBackendArg {
    /// Native content stream reader
    Lopdf,
    /// poppler's pdftotext
    Pdftotext,
}

impl From<PdfBackendArg> for PdfBackendKind {
    fn from(arg: PdfBackendArg) -> Self {
        match arg {
            PdfBackendArg::Lopdf => PdfBackendKind::Lopdf,
            PdfBackendArg::Pdftotext => PdfBackendKind::PdfToText,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Convert {
            inputs,
            output,
            to,
            abort_on_error,
            convert,
        } => build_converter(config, &convert)
            .and_then(|c| cmd_convert(&c, &inputs, &output, &to, abort_on_error, cli.quiet)),
        Commands::Markdown {
            input,
            output,
            html_tables,
            convert,
        } => build_converter(config, &convert)
            .and_then(|c| cmd_markdown(&c, &input, output.as_deref(), html_tables)),
        Commands::Json {
            input,
            output,
            compact,
            convert,
        } => build_converter(config, &convert)
            .and_then(|c| cmd_json(&c, &input, output.as_deref(), compact)),
        Commands::Yaml {
            input,
            output,
            convert,
        } => build_converter(config, &convert).and_then(|c| cmd_yaml(&c, &input, output.as_deref())),
        Commands::Chunk {
            inputs,
            output,
            max_tokens,
            tokenizer,
            no_merge_peers,
            convert,
        } => build_converter(config, &convert).and_then(|c| {
            cmd_chunk(
                &c,
                &inputs,
                &output,
                max_tokens,
                tokenizer.as_deref(),
                !no_merge_peers,
                cli.quiet,
            )
        }),
        Commands::Explain {
            input,
            output,
            convert,
        } => build_converter(config, &convert)
            .and_then(|c| cmd_explain(&c, &input, output.as_deref())),
        Commands::Info {
            input,
            json,
            convert,
        } => build_converter(config, &convert).and_then(|c| cmd_info(&c, &input, json)),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn build_converter(config: Option<&Path>, args: &ConvertArgs) -> CliResult<DocumentConverter> {
    let mut config = match config {
        Some(path) => ConverterConfig::from_json_file(path)?,
        None => ConverterConfig::default(),
    };

    if !args.from.is_empty() {
        let formats = args
            .from
            .iter()
            .map(|name| {
                InputFormat::from_name(name).ok_or_else(|| format!("Unknown input format: {}", name))
            })
            .collect::<Result<Vec<_>, _>>()?;
        config.allowed_formats = Some(formats);
    }

    let pdf = &mut config.pdf;
    if args.no_ocr {
        pdf.do_ocr = false;
    }
    if args.ocr {
        pdf.do_ocr = true;
    }
    if args.force_ocr {
        pdf.do_ocr = true;
        pdf.ocr_options.force_full_page_ocr = true;
    }
    if !args.ocr_lang.is_empty() {
        pdf.ocr_options.lang = args.ocr_lang.clone();
    }
    if let Some(cmd) = &args.tesseract_cmd {
        pdf.ocr_options.tesseract_cmd = cmd.clone();
    }
    if args.no_tables {
        pdf.do_table_structure = false;
    }
    if let Some(pages) = &args.pages {
        pdf.page_range =
            PageSelection::parse(pages).map_err(|e| format!("Invalid page range: {}", e))?;
    }
    if let Some(backend) = args.pdf_backend {
        config.pdf_backend = backend.into();
    }

    Ok(DocumentConverter::from_config(&config))
}

fn progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Convert one input, turning a failed status into an error.
fn convert_one(converter: &DocumentConverter, input: &str) -> CliResult<ConversionResult> {
    let result = converter.convert(DocumentSource::from(input))?;
    match result.status {
        ConversionStatus::Failure => {
            let message = result
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "conversion failed".to_string());
            Err(message.into())
        }
        ConversionStatus::PartialSuccess => {
            for error in &result.errors {
                eprintln!("{} {}", "Warning:".yellow(), error);
            }
            Ok(result)
        }
        _ => Ok(result),
    }
}

fn write_or_print(content: &str, output: Option<&Path>) -> CliResult {
    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_convert(
    converter: &DocumentConverter,
    inputs: &[String],
    output_dir: &Path,
    to: &[OutputKind],
    abort_on_error: bool,
    quiet: bool,
) -> CliResult {
    let sources = expand_inputs(inputs);
    if sources.is_empty() {
        return Err("No convertible inputs found".into());
    }
    fs::create_dir_all(output_dir)?;

    let pb = progress_bar(sources.len(), quiet);
    let mut converted = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    let mut written = Vec::new();

    for source in &sources {
        pb.set_message(source.name());
        let stem = output_stem(source);
        let results = converter.convert_all([source.clone()], abort_on_error)?;
        for result in results {
            match result.status {
                ConversionStatus::Success | ConversionStatus::PartialSuccess => {
                    for error in &result.errors {
                        pb.println(format!("{} {}: {}", "Warning:".yellow(), source, error));
                    }
                    for kind in to {
                        let path = output_dir.join(format!("{}.{}", stem, kind.extension()));
                        fs::write(&path, render_output(&result, *kind)?)?;
                        written.push(path);
                    }
                    converted += 1;
                }
                ConversionStatus::Skipped => {
                    let reason = result.errors.first().map(|e| e.message.clone()).unwrap_or_default();
                    pb.println(format!("{} {} {}", "Skipped".yellow(), source, reason.dimmed()));
                    skipped += 1;
                }
                ConversionStatus::Failure => {
                    let message = result.errors.first().map(|e| e.to_string()).unwrap_or_default();
                    pb.println(format!("{} {}: {}", "Failed".red(), source, message));
                    failed += 1;
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !written.is_empty() {
        println!("{}", "Output files:".green().bold());
        for (i, path) in written.iter().enumerate() {
            let branch = if i + 1 == written.len() { "└─" } else { "├─" };
            println!("  {} {}", branch.dimmed(), path.display());
        }
    }
    println!(
        "{} converted, {} skipped, {} failed",
        converted.to_string().green(),
        skipped.to_string().yellow(),
        failed.to_string().red()
    );

    if failed > 0 {
        return Err(format!("{} of {} inputs failed", failed, sources.len()).into());
    }
    Ok(())
}

fn render_output(result: &ConversionResult, kind: OutputKind) -> CliResult<String> {
    let doc = &result.document;
    Ok(match kind {
        OutputKind::Md => export_to_markdown(doc, &MarkdownOptions::default()),
        OutputKind::Json => export_to_json(doc, JsonFormat::Compact)?,
        OutputKind::Yaml => export_to_yaml(doc)?,
        OutputKind::Text => export_to_text(doc),
    })
}

fn cmd_markdown(
    converter: &DocumentConverter,
    input: &str,
    output: Option<&Path>,
    html_tables: bool,
) -> CliResult {
    let result = convert_one(converter, input)?;
    let mut options = MarkdownOptions::default();
    if html_tables {
        options = options.with_table_mode(docmill::export::TableMode::Html);
    }
    write_or_print(&export_to_markdown(&result.document, &options), output)
}

fn cmd_json(
    converter: &DocumentConverter,
    input: &str,
    output: Option<&Path>,
    compact: bool,
) -> CliResult {
    let result = convert_one(converter, input)?;
    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    write_or_print(&export_to_json(&result.document, format)?, output)
}

fn cmd_yaml(converter: &DocumentConverter, input: &str, output: Option<&Path>) -> CliResult {
    let result = convert_one(converter, input)?;
    write_or_print(&export_to_yaml(&result.document)?, output)
}

fn load_tokenizer(spec: Option<&str>, max_tokens: usize) -> CliResult<Arc<dyn Tokenizer>> {
    Ok(match spec {
        Some(spec) => Arc::new(HuggingFaceTokenizer::from_spec(spec, max_tokens, None)?),
        None => Arc::new(WordTokenizer::new(max_tokens)),
    })
}

fn cmd_chunk(
    converter: &DocumentConverter,
    inputs: &[String],
    output_dir: &Path,
    max_tokens: usize,
    tokenizer: Option<&str>,
    merge_peers: bool,
    quiet: bool,
) -> CliResult {
    let tokenizer = load_tokenizer(tokenizer, max_tokens)?;
    println!(
        "{} {} (max {} tokens per chunk)",
        "Tokenizer:".cyan(),
        tokenizer.name(),
        tokenizer.max_tokens()
    );
    let chunker = HybridChunker::new(tokenizer).with_merge_peers(merge_peers);

    let sources = expand_inputs(inputs);
    let mut summary = BatchSummary::with_output_dir(output_dir);
    let pb = progress_bar(sources.len(), quiet);

    for source in &sources {
        pb.set_message(source.name());
        let outcome = chunk_one(converter, &chunker, source, output_dir);
        match &outcome {
            ChunkJobOutcome::Success { chunks, output_file, .. } => pb.println(format!(
                "{} {} ({} chunks) -> {}",
                "Chunked".green(),
                source,
                chunks,
                output_file.display()
            )),
            ChunkJobOutcome::Failed { message, .. } => {
                pb.println(format!("{} {}: {}", "Failed".red(), source, message))
            }
        }
        summary.push(outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("\n{}", summary.render());
    if summary.has_failures() || summary.total() == 0 {
        return Err(format!(
            "{} of {} inputs failed",
            summary.total() - summary.successful(),
            summary.total()
        )
        .into());
    }
    Ok(())
}

fn chunk_one(
    converter: &DocumentConverter,
    chunker: &HybridChunker,
    source: &DocumentSource,
    output_dir: &Path,
) -> ChunkJobOutcome {
    if let DocumentSource::Path(path) = source {
        if !path.exists() {
            return ChunkJobOutcome::not_found(source.name());
        }
    }

    let result = match converter.convert(source.clone()) {
        Ok(result) if result.status.is_ok() => result,
        Ok(result) => {
            let message = result
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| result.status.to_string());
            return ChunkJobOutcome::failed(source.name(), message);
        }
        Err(e) => return ChunkJobOutcome::failed(source.name(), e.to_string()),
    };

    let chunks = chunker.chunk(&result.document);
    let report = ChunkReport::new(CHUNK_REPORT_TITLE, source.name(), &chunks, chunker);
    match write_chunk_report(output_dir, &output_stem(source), &report) {
        Ok(path) => ChunkJobOutcome::success(source.name(), chunks.len(), path),
        Err(e) => ChunkJobOutcome::failed(source.name(), e.to_string()),
    }
}

fn cmd_explain(converter: &DocumentConverter, input: &str, output: Option<&Path>) -> CliResult {
    let result = convert_one(converter, input)?;
    let report = ExplainReport::new(input).render(&result.document)?;
    write_or_print(&report, output)
}

fn cmd_info(converter: &DocumentConverter, input: &str, json: bool) -> CliResult {
    let result = convert_one(converter, input)?;
    let doc = &result.document;
    let items = doc.statistics();
    let stats = export_to_markdown_with_stats(doc, &MarkdownOptions::default()).stats;

    if json {
        let info = serde_json::json!({
            "input": result.input,
            "status": result.status,
            "metadata": result.metadata,
            "origin": doc.origin,
            "items": items,
            "content": stats,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Source".bold(), input);
    if let Some(format) = result.input.format {
        println!("{}: {}", "Format".bold(), format);
    }
    let pages = result
        .input
        .page_count
        .unwrap_or_else(|| doc.num_pages() as u32);
    println!("{}: {}", "Pages".bold(), pages);
    println!("{}: {} bytes", "Size".bold(), result.input.size);
    println!("{}: {}", "Status".bold(), result.status);

    if let Some(meta) = &result.metadata {
        if let Some(ref title) = meta.title {
            println!("{}: {}", "Title".bold(), title);
        }
        if let Some(ref author) = meta.author {
            println!("{}: {}", "Author".bold(), author);
        }
        if let Some(ref producer) = meta.producer {
            println!("{}: {}", "Producer".bold(), producer);
        }
        if let Some(ref created) = meta.created {
            println!("{}: {}", "Created".bold(), created);
        }
    }

    if let Some(origin) = &doc.origin {
        println!();
        println!("{}", "Origin".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        println!("{}: {}", "Filename".bold(), origin.filename);
        println!("{}: {}", "MIME type".bold(), origin.mimetype);
        println!("{}: {:016x}", "Binary hash".bold(), origin.binary_hash);
        if let Some(ref uri) = origin.uri {
            println!("{}: {}", "URI".bold(), uri);
        }
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Text items".bold(), items.num_texts);
    println!("{}: {}", "Tables".bold(), items.num_tables);
    println!("{}: {}", "Pictures".bold(), items.num_pictures);
    println!("{}: {}", "Groups".bold(), items.num_groups);
    println!("{}: {}", "Headings".bold(), stats.heading_count);
    println!("{}: {}", "List items".bold(), stats.list_item_count);
    println!("{}: {}", "Words".bold(), stats.word_count);
    println!("{}: {}", "Characters".bold(), stats.char_count);

    if !result.timings.is_empty() {
        println!();
        println!("{}", "Timings".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        for (stage, elapsed) in result.timings.iter() {
            println!("{}: {:.1?}", stage.bold(), elapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_is_compact() {
        let source = DocumentSource::bytes("notes.md", b"# Notes\n\nHello there.\n".to_vec());
        let result = DocumentConverter::new().convert(source).unwrap();
        let json = render_output(&result, OutputKind::Json).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"schema_name\":\"DoclingDocument\""));
    }
}
