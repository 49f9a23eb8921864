//! TOML configuration.
//!
//! Every section except `[db]` is optional; missing keys fall back to the
//! defaults below. [`load_config`] parses and validates in one step, so the
//! rest of the application can trust the values it receives.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use evrag_core::compose::ComposeOptions;
use evrag_core::index::IndexOptions;
use evrag_core::pipeline::QueryOptions;

/// Base URL used when neither the config nor `OPENAI_BASE_URL` sets one.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    evrag_core::chunk::DEFAULT_CHUNK_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default)]
    pub candidate_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default)]
    pub dedup_context: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            candidate_k: 0,
            min_similarity: default_min_similarity(),
            dedup_context: false,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    50
}
fn default_min_similarity() -> f64 {
    evrag_core::reduce::DEFAULT_MIN_SIMILARITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            base_url: None,
            timeout_secs: default_embedding_timeout(),
            max_retries: 0,
            concurrency: default_concurrency(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_completion_model(),
            base_url: None,
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout(),
            max_retries: 0,
            max_suggestions: default_max_suggestions(),
            language: default_language(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_completion_timeout() -> u64 {
    60
}
fn default_max_suggestions() -> usize {
    3
}
fn default_language() -> String {
    "Japanese".to_string()
}
fn default_max_context_chars() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Resolve the API base URL: explicit config, then `OPENAI_BASE_URL`, then
/// the public endpoint. Trailing slashes are dropped.
pub fn resolve_base_url(configured: Option<&str>) -> String {
    let url = configured
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    url.trim_end_matches('/').to_string()
}

impl Config {
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            chunk_chars: self.chunking.chunk_chars,
            concurrency: self.embedding.concurrency,
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            top_k: self.retrieval.top_k,
            max_top_k: self.retrieval.max_top_k,
            candidate_k: self.retrieval.candidate_k,
            min_similarity: self.retrieval.min_similarity,
            dedup_context: self.retrieval.dedup_context,
        }
    }

    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            max_suggestions: self.completion.max_suggestions,
            language: self.completion.language.clone(),
            max_context_chars: self.completion.max_context_chars,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_chars == 0 {
        bail!("chunking.chunk_chars must be > 0");
    }

    let retrieval = &config.retrieval;
    if retrieval.max_top_k == 0 {
        bail!("retrieval.max_top_k must be >= 1");
    }
    if retrieval.top_k == 0 || retrieval.top_k > retrieval.max_top_k {
        bail!(
            "retrieval.top_k must be in [1, {}] (retrieval.max_top_k)",
            retrieval.max_top_k
        );
    }
    if !(-1.0..=1.0).contains(&retrieval.min_similarity) {
        bail!("retrieval.min_similarity must be in [-1.0, 1.0]");
    }

    for (section, provider) in [
        ("embedding", config.embedding.provider.as_str()),
        ("completion", config.completion.provider.as_str()),
    ] {
        match provider {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown {} provider: '{}'. Must be disabled or openai.",
                section,
                other
            ),
        }
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.trim().is_empty() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.concurrency == 0 {
        bail!("embedding.concurrency must be >= 1");
    }

    if config.completion.is_enabled() && config.completion.model.trim().is_empty() {
        bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }
    if config.completion.max_suggestions == 0 {
        bail!("completion.max_suggestions must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[db]\npath = \"./data/evrag.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.chunk_chars, 500);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.max_top_k, 50);
        assert_eq!(config.retrieval.min_similarity, 0.55);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.completion.language, "Japanese");
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_rejects_top_k_above_max() {
        let file = write_config(
            "[db]\npath = \"x.sqlite\"\n[retrieval]\ntop_k = 60\nmax_top_k = 50\n",
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("retrieval.top_k"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let file = write_config("[db]\npath = \"x.sqlite\"\n[completion]\nprovider = \"llama\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("completion"));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let file = write_config("[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_chars = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_explicit_base_url_wins_and_is_trimmed() {
        assert_eq!(
            resolve_base_url(Some("http://localhost:8080/v1/")),
            "http://localhost:8080/v1"
        );
    }

    #[test]
    fn test_options_follow_config() {
        let file = write_config(
            "[db]\npath = \"x.sqlite\"\n[retrieval]\ncandidate_k = 20\ndedup_context = true\n[completion]\nlanguage = \"English\"\n",
        );
        let config = load_config(file.path()).unwrap();
        let q = config.query_options();
        assert_eq!(q.candidate_k, 20);
        assert!(q.dedup_context);
        assert_eq!(config.compose_options().language, "English");
        assert_eq!(config.index_options().concurrency, 4);
    }
}
