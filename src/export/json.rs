//! JSON and YAML export.

use serde_json::Value;

use crate::error::Result;
use crate::model::Document;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Export the document as a JSON value with `$ref` links.
pub fn export_to_dict(doc: &Document) -> Result<Value> {
    Ok(serde_json::to_value(doc)?)
}

/// Export the document as JSON text.
pub fn export_to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc)?,
        JsonFormat::Compact => serde_json::to_string(doc)?,
    };
    Ok(json)
}

/// Export the document as YAML text.
///
/// Enums are written by name and page keys as integers, so the output
/// needs no post-processing to be loadable by other YAML readers.
pub fn export_to_yaml(doc: &Document) -> Result<String> {
    Ok(serde_yaml::to_string(doc)?)
}

/// Load a document previously written with [`export_to_json`].
pub fn load_from_json(json: &str) -> Result<Document> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocItemLabel, Size, TableData};

    fn sample() -> Document {
        let mut doc = Document::new("sample");
        doc.add_page(1, Size::new(612.0, 792.0));
        doc.add_heading("Intro", 1, None, None);
        doc.add_text(DocItemLabel::Text, "Hello", None, None);
        doc.add_table(TableData::from_rows(&[vec!["a"], vec!["1"]], 1), None, None);
        doc
    }

    #[test]
    fn test_to_json_pretty_and_compact() {
        let doc = sample();
        let pretty = export_to_json(&doc, JsonFormat::Pretty).unwrap();
        assert!(pretty.contains('\n'));
        let compact = export_to_json(&doc, JsonFormat::Compact).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.contains(r##""$ref":"#/texts/0""##));
    }

    #[test]
    fn test_dict_and_reload() {
        let doc = sample();
        let dict = export_to_dict(&doc).unwrap();
        assert_eq!(dict["texts"][0]["level"], 1);
        assert_eq!(dict["tables"][0]["data"]["num_rows"], 2);
        assert_eq!(dict["pages"]["1"]["size"]["width"], 612.0);

        let reloaded = load_from_json(&dict.to_string()).unwrap();
        assert_eq!(reloaded.texts.len(), 2);
        reloaded.validate_tree().unwrap();
    }

    #[test]
    fn test_to_yaml() {
        let yaml = export_to_yaml(&sample()).unwrap();
        assert!(yaml.contains("schema_name: DoclingDocument"));
        assert!(yaml.contains("label: section_header"));
        assert!(yaml.contains("#/texts/0"));
    }
}
