use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::MemoryError;

const META_EXT: &str = "meta.json";

/// Metadata for one ingested document, persisted as a JSON file next to its
/// vector index snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    /// Blake3 hex digest of the uploaded bytes, used to detect re-uploads.
    pub content_hash: String,
    pub chunk_count: usize,
    pub embedding_dim: u64,
    pub created_at: DateTime<Utc>,
}

/// Flat-file metadata registry, one JSON file per document.
#[derive(Debug)]
pub struct DocumentRegistry {
    dir: PathBuf,
}

impl DocumentRegistry {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{META_EXT}"))
    }

    /// Rejects ids that are not UUIDs before they can touch the filesystem.
    pub fn validate_id(id: &str) -> Result<(), MemoryError> {
        Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|_| MemoryError::InvalidDocumentId(id.to_owned()))
    }

    pub async fn save(&self, record: &DocumentRecord) -> Result<(), MemoryError> {
        Self::validate_id(&record.id)?;
        let bytes = serde_json::to_vec_pretty(record)?;
        let path = self.record_path(&record.id);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(id = %record.id, filename = %record.filename, "saved document record");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<DocumentRecord, MemoryError> {
        Self::validate_id(id)?;
        let path = self.record_path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MemoryError::DocumentNotFound(id.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>, MemoryError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !is_record_file(&entry.path()) {
                continue;
            }
            let bytes = tokio::fs::read(entry.path()).await?;
            records.push(serde_json::from_slice::<DocumentRecord>(&bytes)?);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub async fn remove(&self, id: &str) -> Result<(), MemoryError> {
        Self::validate_id(id)?;
        let path = self.record_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MemoryError::DocumentNotFound(id.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up an existing record by content hash. Linear scan over the
    /// registry directory; the document count here is small.
    pub async fn find_by_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, MemoryError> {
        let records = self.list().await?;
        Ok(records.into_iter().find(|r| r.content_hash == content_hash))
    }
}

fn is_record_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(&format!(".{META_EXT}")))
}
