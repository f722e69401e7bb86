use std::sync::Arc;

use papyrus_llm::LlmProvider;
use tracing::info;
use uuid::Uuid;

use crate::document::{Document, DocumentError, SplitterConfig, TextSplitter};
use crate::error::MemoryError;
use crate::vector_store::{ChunkPayload, VectorPoint, VectorStore};

/// What an ingestion run produced, recorded in the document registry.
#[derive(Debug, Clone, Copy)]
pub struct IngestReport {
    pub chunk_count: usize,
    pub embedding_dim: u64,
}

/// Splits a document, embeds every chunk, and writes the vectors into a
/// per-document collection.
pub struct IngestionPipeline<P> {
    splitter: TextSplitter,
    store: Arc<dyn VectorStore>,
    embedder: P,
}

impl<P: LlmProvider> IngestionPipeline<P> {
    pub fn new(splitter_config: SplitterConfig, store: Arc<dyn VectorStore>, embedder: P) -> Self {
        Self {
            splitter: TextSplitter::new(splitter_config),
            store,
            embedder,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the document yields no chunks, embedding fails,
    /// or the vector store rejects the write.
    pub async fn ingest(
        &self,
        collection: &str,
        document: &Document,
    ) -> Result<IngestReport, MemoryError> {
        let chunks = self.splitter.split(&document.content);
        if chunks.is_empty() {
            return Err(DocumentError::EmptyDocument.into());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let embedding_dim = vectors.first().map_or(0, |v| v.len() as u64);
        if embedding_dim == 0 {
            return Err(MemoryError::Llm(papyrus_llm::LlmError::Other(
                "embedder returned empty vectors".into(),
            )));
        }

        // Collection is created only after embedding succeeds, so a failed
        // run leaves nothing behind on disk.
        self.store
            .ensure_collection(collection, embedding_dim)
            .await?;

        let points: Vec<VectorPoint> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: ChunkPayload {
                    content: chunk.content,
                    chunk_index: chunk.chunk_index,
                },
            })
            .collect();

        let chunk_count = points.len();
        self.store.upsert(collection, points).await?;

        info!(
            collection,
            chunks = chunk_count,
            dim = embedding_dim,
            "ingested document"
        );
        Ok(IngestReport {
            chunk_count,
            embedding_dim,
        })
    }
}
