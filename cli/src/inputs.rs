//! Expansion of command-line inputs into document sources.

use std::path::Path;

use docmill::convert::is_url;
use docmill::{DocumentSource, InputFormat};
use walkdir::WalkDir;

/// Turn arguments into sources. Directories are walked recursively and
/// contribute every file with a known extension, sorted by path.
pub fn expand_inputs(inputs: &[String]) -> Vec<DocumentSource> {
    let mut sources = Vec::new();
    for input in inputs {
        if is_url(input) {
            sources.push(DocumentSource::Url(input.clone()));
            continue;
        }
        let path = Path::new(input);
        if path.is_dir() {
            let mut files: Vec<_> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| has_known_extension(p))
                .collect();
            files.sort();
            log::debug!("{}: {} convertible files", path.display(), files.len());
            sources.extend(files.into_iter().map(DocumentSource::Path));
        } else {
            sources.push(DocumentSource::Path(path.to_path_buf()));
        }
    }
    sources
}

fn has_known_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(InputFormat::from_extension)
        .is_some()
}

/// File stem used to name outputs for a source.
pub fn output_stem(source: &DocumentSource) -> String {
    let name = match source {
        DocumentSource::Path(path) => path.display().to_string(),
        DocumentSource::Url(url) => docmill::convert::filename_from_url(url)
            .unwrap_or_else(|| "download".to_string()),
        DocumentSource::Bytes { name, .. } => name.clone(),
    };
    Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_expand_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.md"), "# B").unwrap();
        std::fs::write(dir.path().join("sub/a.csv"), "x,y").unwrap();
        std::fs::write(dir.path().join("notes.xyz"), "skip").unwrap();

        let inputs = vec![
            dir.path().display().to_string(),
            "https://example.com/paper.pdf".to_string(),
            "missing.pdf".to_string(),
        ];
        let sources = expand_inputs(&inputs);
        assert_eq!(sources.len(), 4);
        assert_eq!(sources[0], DocumentSource::Path(dir.path().join("b.md")));
        assert_eq!(sources[1], DocumentSource::Path(dir.path().join("sub/a.csv")));
        assert!(sources[2].is_url());
        assert_eq!(sources[3], DocumentSource::Path(PathBuf::from("missing.pdf")));
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(&DocumentSource::from("docs/report.v2.pdf")), "report.v2");
        assert_eq!(
            output_stem(&DocumentSource::Url("https://arxiv.org/pdf/2408.09869v5.pdf".into())),
            "2408.09869v5"
        );
        assert_eq!(output_stem(&DocumentSource::Url("https://example.com/".into())), "download");
    }
}
