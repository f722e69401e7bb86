//! Configuration types shared across the papyrus crates.

pub mod config;

pub use config::{
    ChunkingConfig, Config, EmbeddingConfig, LlmConfig, ProviderKind, RetrievalConfig,
    ServerConfig, StorageConfig,
};
