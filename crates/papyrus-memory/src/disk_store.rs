use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::in_memory_store::InMemoryVectorStore;
use crate::vector_store::{
    BoxFuture, CollectionSnapshot, ScoredPoint, VectorPoint, VectorStore, VectorStoreError,
};

const SNAPSHOT_EXT: &str = "index.json";

/// Vector store persisted as one JSON snapshot file per collection.
///
/// Collections live in memory while in use; a snapshot is rewritten after
/// every mutation and loaded back lazily on first access after restart.
pub struct DiskVectorStore {
    inner: InMemoryVectorStore,
    dir: PathBuf,
    loaded: Mutex<HashSet<String>>,
}

impl DiskVectorStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, VectorStoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| VectorStoreError::Snapshot(e.to_string()))?;
        Ok(Self {
            inner: InMemoryVectorStore::new(),
            dir,
            loaded: Mutex::new(HashSet::new()),
        })
    }

    fn snapshot_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.{SNAPSHOT_EXT}"))
    }

    /// Names of all collections with a snapshot file on disk.
    pub async fn list_persisted(&self) -> Result<Vec<String>, VectorStoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| VectorStoreError::Snapshot(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VectorStoreError::Snapshot(e.to_string()))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(&format!(".{SNAPSHOT_EXT}")) {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Loads the snapshot for `collection` into memory if present on disk
    /// and not already loaded.
    async fn hydrate(&self, collection: &str) -> Result<(), VectorStoreError> {
        let mut loaded = self.loaded.lock().await;
        if loaded.contains(collection) {
            return Ok(());
        }

        let path = self.snapshot_path(collection);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: CollectionSnapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| VectorStoreError::Snapshot(e.to_string()))?;
                debug!(
                    collection,
                    points = snapshot.points.len(),
                    "loaded index snapshot"
                );
                self.inner.import(collection, snapshot);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(VectorStoreError::Snapshot(e.to_string())),
        }
        loaded.insert(collection.to_owned());
        Ok(())
    }

    /// Rewrites the snapshot file for `collection` from the in-memory state.
    /// Writes to a temp file first so a crash never leaves a torn snapshot.
    async fn persist(&self, collection: &str) -> Result<(), VectorStoreError> {
        let Some(snapshot) = self.inner.export(collection) else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| VectorStoreError::Snapshot(e.to_string()))?;
        let path = self.snapshot_path(collection);
        write_atomic(&path, &bytes)
            .await
            .map_err(|e| VectorStoreError::Snapshot(e.to_string()))?;
        debug!(
            collection,
            points = snapshot.points.len(),
            "wrote index snapshot"
        );
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

impl std::fmt::Debug for DiskVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskVectorStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl VectorStore for DiskVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.hydrate(&collection).await?;
            self.inner.ensure_collection(&collection, vector_size).await
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.hydrate(&collection).await?;
            self.inner.collection_exists(&collection).await
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.inner.delete_collection(&collection).await?;
            self.loaded.lock().await.remove(&collection);
            let path = self.snapshot_path(&collection);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(collection, error = %e, "failed to remove index snapshot");
                    return Err(VectorStoreError::Delete(e.to_string()));
                }
            }
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.hydrate(&collection).await?;
            self.inner.upsert(&collection, points).await?;
            self.persist(&collection).await
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.hydrate(&collection).await?;
            self.inner.search(&collection, vector, limit).await
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.hydrate(&collection).await?;
            self.inner.delete_by_ids(&collection, ids).await?;
            self.persist(&collection).await
        })
    }
}
