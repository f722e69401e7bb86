use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests per minute per client IP.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_sentence_aware")]
    pub sentence_aware: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u64,
    /// Minimum cosine similarity for a chunk to be shown to the model.
    #[serde(default = "default_score_floor")]
    pub score_floor: f32,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Separate backend for embeddings when the chat provider has none
    /// (Claude, for instance).
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_rate_limit() -> u64 {
    60
}
fn default_max_body_bytes() -> usize {
    // Leave headroom over the 50 MiB document cap for multipart framing.
    52 * 1024 * 1024
}
fn default_data_dir() -> String {
    "./data".into()
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_sentence_aware() -> bool {
    true
}
fn default_top_k() -> u64 {
    5
}
fn default_score_floor() -> f32 {
    0.25
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            rate_limit: default_rate_limit(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            sentence_aware: default_sentence_aware(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_floor: default_score_floor(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with `PAPYRUS_*` env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config =
            toml::from_str::<Self>(&content).context("failed to parse config file")?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PAPYRUS_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("PAPYRUS_DATA_DIR") {
            self.storage.data_dir = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_PROVIDER")
            && let Ok(kind) = v.parse()
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("PAPYRUS_CHUNK_SIZE")
            && let Ok(n) = v.parse()
        {
            self.chunking.chunk_size = n;
        }
        if let Ok(v) = std::env::var("PAPYRUS_CHUNK_OVERLAP")
            && let Ok(n) = v.parse()
        {
            self.chunking.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("PAPYRUS_TOP_K")
            && let Ok(n) = v.parse()
        {
            self.retrieval.top_k = n;
        }
        if let Ok(v) = std::env::var("PAPYRUS_RATE_LIMIT")
            && let Ok(n) = v.parse()
        {
            self.server.rate_limit = n;
        }
    }

    /// # Errors
    ///
    /// Returns an error when a value is out of range or values contradict
    /// each other.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be positive");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retrieval.score_floor) {
            bail!("retrieval.score_floor must be within 0.0..=1.0");
        }
        Ok(())
    }
}
