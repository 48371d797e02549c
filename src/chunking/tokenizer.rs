//! Token counting for chunk budgets.

use std::path::{Path, PathBuf};

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Embedding model whose tokenizer is used when none is given.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Environment variable overriding the tokenizer cache directory.
pub const CACHE_DIR_ENV: &str = "DOCMILL_CACHE_DIR";

const HF_HUB: &str = "https://huggingface.co";

/// Counts tokens against a budget.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Token budget per chunk.
    fn max_tokens(&self) -> usize;

    /// Name shown in reports.
    fn name(&self) -> String;
}

/// Counts Unicode words. Needs no model files.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    max_tokens: usize,
}

impl WordTokenizer {
    /// Create a word counter with a budget.
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
        }
    }
}

impl Tokenizer for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.unicode_words().count()
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn name(&self) -> String {
        "words".to_string()
    }
}

/// A HuggingFace `tokenizer.json` tokenizer.
pub struct HuggingFaceTokenizer {
    inner: tokenizers::Tokenizer,
    max_tokens: usize,
    name: String,
}

impl std::fmt::Debug for HuggingFaceTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceTokenizer")
            .field("name", &self.name)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl HuggingFaceTokenizer {
    /// Load a local `tokenizer.json`.
    pub fn from_file<P: AsRef<Path>>(path: P, max_tokens: usize) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| Error::Tokenizer(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            inner,
            max_tokens: max_tokens.max(1),
            name: path.display().to_string(),
        })
    }

    /// Load the tokenizer of a hub model, downloading it into the cache on
    /// first use.
    pub fn from_pretrained(model_id: &str, max_tokens: usize, cache_dir: Option<&Path>) -> Result<Self> {
        let cache_dir = cache_dir.map(Path::to_path_buf).unwrap_or_else(default_cache_dir);
        let path = cached_tokenizer_path(&cache_dir, model_id);
        if !path.exists() {
            download_tokenizer(model_id, &path)?;
        } else {
            log::debug!("Using cached tokenizer {}", path.display());
        }
        let mut tokenizer = Self::from_file(&path, max_tokens)?;
        tokenizer.name = model_id.to_string();
        Ok(tokenizer)
    }

    /// Load from a file path when it exists, otherwise treat `spec` as a
    /// hub model id.
    pub fn from_spec(spec: &str, max_tokens: usize, cache_dir: Option<&Path>) -> Result<Self> {
        if Path::new(spec).is_file() {
            Self::from_file(spec, max_tokens)
        } else {
            Self::from_pretrained(spec, max_tokens, cache_dir)
        }
    }
}

impl Tokenizer for HuggingFaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        match self.inner.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                log::warn!("Tokenizer failed, counting words instead: {}", e);
                text.unicode_words().count()
            }
        }
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Cache root: `$DOCMILL_CACHE_DIR`, then the user cache dir, then the
/// system temp dir.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(dir) = std::env::var_os("XDG_CACHE_HOME") {
        return PathBuf::from(dir).join("docmill");
    }
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".cache").join("docmill");
    }
    std::env::temp_dir().join("docmill")
}

/// Where a model's `tokenizer.json` is cached.
pub fn cached_tokenizer_path(cache_dir: &Path, model_id: &str) -> PathBuf {
    cache_dir
        .join("tokenizers")
        .join(model_id.replace('/', "--"))
        .join("tokenizer.json")
}

fn download_tokenizer(model_id: &str, path: &Path) -> Result<()> {
    let url = format!("{}/{}/resolve/main/tokenizer.json", HF_HUB, model_id);
    log::info!("Downloading tokenizer from {}", url);

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("docmill/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let mut request = client.get(&url);
    if let Ok(token) = std::env::var("HF_TOKEN") {
        request = request.bearer_auth(token);
    }
    let response = request.send()?;
    if !response.status().is_success() {
        return Err(Error::Tokenizer(format!(
            "download of {} failed: HTTP {}",
            model_id,
            response.status()
        )));
    }
    let bytes = response.bytes()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // write then rename so a partial download never looks cached
    let tmp = path.with_extension("json.part");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    log::debug!("Cached tokenizer at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_tokenizer() {
        let tokenizer = WordTokenizer::new(64);
        assert_eq!(tokenizer.count_tokens("The quick (brown) fox."), 4);
        assert_eq!(tokenizer.count_tokens(""), 0);
        assert_eq!(tokenizer.max_tokens(), 64);
        assert_eq!(WordTokenizer::new(0).max_tokens(), 1);
    }

    #[test]
    fn test_cached_tokenizer_path() {
        let path = cached_tokenizer_path(Path::new("/cache"), DEFAULT_MODEL_ID);
        assert_eq!(
            path,
            PathBuf::from("/cache/tokenizers/sentence-transformers--all-MiniLM-L6-v2/tokenizer.json")
        );
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = HuggingFaceTokenizer::from_file(dir.path().join("nope.json"), 64);
        assert!(matches!(result, Err(Error::Tokenizer(_))));
    }

    #[test]
    fn test_word_level_tokenizer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let json = r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {"[UNK]": 0, "hello": 1, "world": 2},
                "unk_token": "[UNK]"
            }
        }"#;
        std::fs::write(&path, json).unwrap();
        let tokenizer = HuggingFaceTokenizer::from_spec(path.to_str().unwrap(), 8, None).unwrap();
        assert_eq!(tokenizer.count_tokens("hello world again"), 3);
        assert_eq!(tokenizer.max_tokens(), 8);
    }
}
