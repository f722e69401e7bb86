use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use papyrus_core::config::{Config, EmbeddingConfig, ProviderKind};
use papyrus_gateway::GatewayServer;
use papyrus_llm::AnyProvider;
use papyrus_llm::claude::ClaudeProvider;
use papyrus_llm::ollama::OllamaProvider;
use papyrus_llm::openai::OpenAiProvider;
use papyrus_llm::provider::LlmProvider;
use papyrus_memory::document::SplitterConfig;
use papyrus_memory::{DocumentService, ServiceOptions};
use tokio::sync::watch;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let config_path = resolve_config_path();
    let config = Config::load(&config_path)?;
    config.validate()?;

    let generator = create_provider(&config)?;
    let embedder = create_embedder(&config, &generator)?;
    tracing::info!(
        generator = generator.name(),
        embedder = embedder.name(),
        model = %config.llm.model,
        "providers configured"
    );

    let options = ServiceOptions {
        splitter: SplitterConfig {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            sentence_aware: config.chunking.sentence_aware,
        },
        top_k: config.retrieval.top_k,
        score_floor: config.retrieval.score_floor,
        ..ServiceOptions::default()
    };
    let service = Arc::new(
        DocumentService::open(&config.storage.data_dir, embedder, generator, options)
            .await
            .context("failed to open document service")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let server = GatewayServer::new(&config.server.bind, config.server.port, service, shutdown_rx)
        .with_auth(std::env::var("PAPYRUS_API_TOKEN").ok())
        .with_rate_limit(config.server.rate_limit)
        .with_max_body_size(config.server.max_body_bytes);

    server.serve().await?;
    Ok(())
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    if let Some(path) = args.windows(2).find(|w| w[0] == "--config").map(|w| &w[1]) {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("PAPYRUS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Claude => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY required for the claude provider")?;
            Ok(AnyProvider::Claude(ClaudeProvider::new(
                api_key,
                llm.model.clone(),
                llm.max_tokens,
            )))
        }
        ProviderKind::OpenAi => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY required for the openai provider")?;
            let base_url = llm
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_owned());
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key,
                base_url,
                llm.model.clone(),
                llm.max_tokens,
                llm.embedding_model.clone(),
            )))
        }
        ProviderKind::Ollama => {
            let base_url = llm
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_owned());
            Ok(AnyProvider::Ollama(OllamaProvider::new(
                &base_url,
                llm.model.clone(),
                llm.embedding_model.clone().unwrap_or_default(),
            )))
        }
    }
}

/// The embedder is the `[llm.embedding]` backend when configured, otherwise
/// the generator itself. Bails when neither can embed, since ingestion and
/// retrieval both depend on it.
fn create_embedder(config: &Config, generator: &AnyProvider) -> anyhow::Result<AnyProvider> {
    if let Some(ref embedding) = config.llm.embedding {
        let embedder = create_embedding_provider(embedding)?;
        if !embedder.supports_embeddings() {
            bail!(
                "[llm.embedding] provider '{}' cannot embed",
                embedding.provider
            );
        }
        return Ok(embedder);
    }

    if generator.supports_embeddings() {
        return Ok(generator.clone());
    }
    bail!(
        "provider '{}' has no embedding endpoint; configure [llm.embedding] with one that does",
        config.llm.provider
    )
}

fn create_embedding_provider(embedding: &EmbeddingConfig) -> anyhow::Result<AnyProvider> {
    match embedding.provider {
        ProviderKind::Claude => bail!("claude has no embedding endpoint"),
        ProviderKind::OpenAi => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY required for the openai embedding provider")?;
            let base_url = embedding
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_owned());
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key,
                base_url,
                embedding.model.clone(),
                0,
                Some(embedding.model.clone()),
            )))
        }
        ProviderKind::Ollama => {
            let base_url = embedding
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_owned());
            Ok(AnyProvider::Ollama(OllamaProvider::new(
                &base_url,
                String::new(),
                embedding.model.clone(),
            )))
        }
    }
}
