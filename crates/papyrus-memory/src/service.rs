use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use papyrus_llm::AnyProvider;
use tracing::{info, warn};
use uuid::Uuid;

use crate::disk_store::DiskVectorStore;
use crate::document::{self, DocumentError, SplitterConfig};
use crate::error::MemoryError;
use crate::pipeline::IngestionPipeline;
use crate::query::{Answer, QueryEngine};
use crate::registry::{DocumentRecord, DocumentRegistry};
use crate::vector_store::VectorStore;

/// Tuning knobs for [`DocumentService::open`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub splitter: SplitterConfig,
    pub top_k: u64,
    pub score_floor: f32,
    pub max_file_size: u64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            top_k: 5,
            score_floor: 0.25,
            max_file_size: document::DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Result of an upload: the document's record, and whether it was newly
/// ingested or matched an existing upload by content hash.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub record: DocumentRecord,
    pub created: bool,
}

/// Owns the document lifecycle: upload, ingestion, lookup, deletion, and
/// question answering. All state lives under one data directory:
///
/// ```text
/// data/
///   files/      uploaded originals
///   indexes/    one vector snapshot per document
///   registry/   one metadata record per document
/// ```
pub struct DocumentService {
    registry: DocumentRegistry,
    pipeline: IngestionPipeline<AnyProvider>,
    query: QueryEngine<AnyProvider, AnyProvider>,
    store: Arc<DiskVectorStore>,
    files_dir: PathBuf,
    max_file_size: u64,
}

impl DocumentService {
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        embedder: AnyProvider,
        generator: AnyProvider,
        options: ServiceOptions,
    ) -> Result<Self, MemoryError> {
        let data_dir = data_dir.as_ref();
        let files_dir = data_dir.join("files");
        tokio::fs::create_dir_all(&files_dir).await?;

        let store = Arc::new(DiskVectorStore::open(data_dir.join("indexes")).await?);
        let registry = DocumentRegistry::open(data_dir.join("registry")).await?;

        let pipeline =
            IngestionPipeline::new(options.splitter, store.clone(), embedder.clone());
        let query = QueryEngine::new(
            store.clone(),
            embedder,
            generator,
            options.top_k,
            options.score_floor,
        );

        Ok(Self {
            registry,
            pipeline,
            query,
            store,
            files_dir,
            max_file_size: options.max_file_size,
        })
    }

    /// Stores and ingests an uploaded file. A re-upload of identical bytes
    /// returns the existing record instead of ingesting twice.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported formats, oversized or empty files,
    /// and embedding or storage failures.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadOutcome, MemoryError> {
        if bytes.len() as u64 > self.max_file_size {
            return Err(DocumentError::FileTooLarge(bytes.len() as u64).into());
        }

        // Format check comes first so an unsupported filename is rejected
        // even when identical bytes were ingested before.
        let loader = document::loader_for(filename, self.max_file_size)
            .ok_or_else(|| DocumentError::UnsupportedFormat(filename.to_owned()))?;

        let content_hash = blake3::hash(bytes).to_hex().to_string();
        if let Some(existing) = self.registry.find_by_hash(&content_hash).await? {
            info!(id = %existing.id, filename, "duplicate upload, reusing existing document");
            return Ok(UploadOutcome {
                record: existing,
                created: false,
            });
        }

        let id = Uuid::new_v4().to_string();
        let stored_path = self.stored_path(&id, filename);
        tokio::fs::write(&stored_path, bytes).await?;

        let report = match self.ingest_stored(&*loader, &stored_path, &id).await {
            Ok(report) => report,
            Err(e) => {
                // Keep the files directory consistent with the registry.
                if let Err(rm) = tokio::fs::remove_file(&stored_path).await {
                    warn!(id, error = %rm, "failed to clean up stored file after ingest error");
                }
                return Err(e);
            }
        };

        let record = DocumentRecord {
            id: id.clone(),
            filename: filename.to_owned(),
            content_hash,
            chunk_count: report.chunk_count,
            embedding_dim: report.embedding_dim,
            created_at: Utc::now(),
        };
        self.registry.save(&record).await?;

        info!(id, filename, chunks = report.chunk_count, "document ingested");
        Ok(UploadOutcome {
            record,
            created: true,
        })
    }

    async fn ingest_stored(
        &self,
        loader: &dyn document::DocumentLoader,
        path: &Path,
        collection: &str,
    ) -> Result<crate::pipeline::IngestReport, MemoryError> {
        let doc = loader.load(path).await?;
        self.pipeline.ingest(collection, &doc).await
    }

    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>, MemoryError> {
        self.registry.list().await
    }

    /// # Errors
    ///
    /// Returns [`MemoryError::DocumentNotFound`] for unknown ids.
    pub async fn get(&self, id: &str) -> Result<DocumentRecord, MemoryError> {
        self.registry.get(id).await
    }

    /// Removes a document's record, index, and stored file.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DocumentNotFound`] for unknown ids.
    pub async fn delete(&self, id: &str) -> Result<(), MemoryError> {
        let record = self.registry.get(id).await?;

        self.store.delete_collection(id).await?;
        let stored = self.stored_path(id, &record.filename);
        match tokio::fs::remove_file(&stored).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.registry.remove(id).await?;

        info!(id, filename = %record.filename, "document deleted");
        Ok(())
    }

    /// Answers a question against one document's index.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DocumentNotFound`] for unknown ids, or an
    /// error if retrieval or generation fails.
    pub async fn ask(&self, id: &str, question: &str) -> Result<Answer, MemoryError> {
        self.registry.get(id).await?;
        self.query.ask(id, question).await
    }

    fn stored_path(&self, id: &str, filename: &str) -> PathBuf {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        self.files_dir.join(format!("{id}.{ext}"))
    }
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("files_dir", &self.files_dir)
            .finish_non_exhaustive()
    }
}
