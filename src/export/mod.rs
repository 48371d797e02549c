//! Export of documents to Markdown, text, JSON and YAML.

mod json;
mod markdown;
mod options;
mod stats;
mod text;

pub use json::{export_to_dict, export_to_json, export_to_yaml, load_from_json, JsonFormat};
pub use markdown::{
    export_to_markdown, export_to_markdown_with_stats, table_html, table_markdown,
    MarkdownSerializer,
};
pub use options::{MarkdownOptions, PageSelection, TableMode};
pub use stats::{ExportResult, ExportStats};
pub use text::{export_to_indented_text, export_to_text, IndentedTextOptions};

pub(crate) use markdown::escape_underscores;
pub(crate) use text::truncate_middle;
