//! TOML configuration.
//!
//! Every section is optional; an empty file yields the defaults below.
//! [`load_config`] parses and then validates, failing with a message that
//! names the offending key.

use anyhow::{Context, Result};
use bugreport_harness_core::builder::BuildConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_embed_chars")]
    pub max_embed_chars: usize,
    #[serde(default = "default_max_split_depth")]
    pub max_split_depth: usize,
    #[serde(default = "default_min_split_chars")]
    pub min_split_chars: usize,
    #[serde(default = "default_failure_warn_threshold")]
    pub failure_warn_threshold: usize,
    #[serde(default)]
    pub max_failed_chunks: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_embed_chars: default_max_embed_chars(),
            max_split_depth: default_max_split_depth(),
            min_split_chars: default_min_split_chars(),
            failure_warn_threshold: default_failure_warn_threshold(),
            max_failed_chunks: None,
        }
    }
}

impl IndexConfig {
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            max_embed_chars: self.max_embed_chars,
            max_split_depth: self.max_split_depth,
            min_split_chars: self.min_split_chars,
            failure_warn_threshold: self.failure_warn_threshold,
            max_failed_chunks: self.max_failed_chunks,
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/indexes")
}
fn default_chunk_size() -> usize {
    6000
}
fn default_chunk_overlap() -> usize {
    600
}
fn default_max_embed_chars() -> usize {
    8000
}
fn default_max_split_depth() -> usize {
    3
}
fn default_min_split_chars() -> usize {
    256
}
fn default_failure_warn_threshold() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummaryConfig {
    /// Maximum segment size in characters.
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: usize,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            chunk_limit: default_chunk_limit(),
            max_chunks: default_max_chunks(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_chunk_limit() -> usize {
    4000
}
fn default_max_chunks() -> usize {
    12
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// The configured model, or `"disabled"` when none is set.
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or("disabled")
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f64 {
    0.2
}
fn default_completion_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Append-only JSON-lines session log. Disabled when unset.
    #[serde(default)]
    pub session_log: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate index
    if config.index.chunk_size == 0 {
        anyhow::bail!("index.chunk_size must be > 0");
    }

    // Validate summary
    if config.summary.chunk_limit == 0 {
        anyhow::bail!("summary.chunk_limit must be > 0");
    }
    if config.summary.max_chunks == 0 {
        anyhow::bail!("summary.max_chunks must be > 0");
    }
    if config.summary.concurrency == 0 {
        anyhow::bail!("summary.concurrency must be > 0");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" | "anthropic" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, anthropic, or ollama.",
            other
        ),
    }
    if config.completion.is_enabled() && config.completion.model.is_none() {
        anyhow::bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.index.chunk_size, 6000);
        assert_eq!(cfg.index.chunk_overlap, 600);
        assert_eq!(cfg.index.dir, PathBuf::from("./data/indexes"));
        assert_eq!(cfg.summary.max_chunks, 12);
        assert_eq!(cfg.retrieval.top_k, 6);
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.completion.is_enabled());
        assert!(cfg.log.session_log.is_none());
        assert_eq!(cfg.index.build_config(), BuildConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
[index]
chunk_size = 1000
max_failed_chunks = 10

[embedding]
provider = "ollama"
model = "nomic-embed-text"
"#,
        )
        .unwrap();
        assert_eq!(cfg.index.chunk_size, 1000);
        assert_eq!(cfg.index.chunk_overlap, 600);
        assert_eq!(cfg.index.build_config().max_failed_chunks, Some(10));
        assert_eq!(cfg.embedding.model_name(), "nomic-embed-text");
        assert_eq!(cfg.embedding.max_retries, 3);
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = parse_config(include_str!("../config/brh.example.toml")).unwrap();
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.completion.provider, "anthropic");
        assert_eq!(cfg.completion.max_retries, 3);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = parse_config("[index]\nchunk_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("index.chunk_size"));
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = parse_config("[embedding]\nprovider = \"vertex\"\nmodel = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
        let err = parse_config("[completion]\nprovider = \"gemini\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown completion provider"));
    }

    #[test]
    fn enabled_provider_requires_model() {
        let err = parse_config("[completion]\nprovider = \"anthropic\"\n").unwrap_err();
        assert!(err.to_string().contains("completion.model"));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let err = parse_config(
            "[completion]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\ntemperature = 3.5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }
}
