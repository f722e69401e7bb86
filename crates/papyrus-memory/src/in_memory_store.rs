use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, ChunkPayload, CollectionSnapshot, ScoredPoint, VectorPoint, VectorStore,
    VectorStoreError,
};

struct StoredPoint {
    vector: Vec<f32>,
    payload: ChunkPayload,
}

struct Collection {
    vector_size: u64,
    points: HashMap<String, StoredPoint>,
}

/// Brute-force cosine store. Collections here are per-document and small,
/// so a linear scan beats any index structure worth maintaining.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Dump a collection for snapshot persistence. `None` if unknown.
    pub(crate) fn export(&self, collection: &str) -> Option<CollectionSnapshot> {
        let cols = self.collections.read().ok()?;
        let col = cols.get(collection)?;
        let mut points: Vec<VectorPoint> = col
            .points
            .iter()
            .map(|(id, sp)| VectorPoint {
                id: id.clone(),
                vector: sp.vector.clone(),
                payload: sp.payload.clone(),
            })
            .collect();
        points.sort_by(|a, b| a.payload.chunk_index.cmp(&b.payload.chunk_index));
        Some(CollectionSnapshot {
            vector_size: col.vector_size,
            points,
        })
    }

    /// Load a snapshot, replacing any existing collection of the same name.
    pub(crate) fn import(&self, collection: &str, snapshot: CollectionSnapshot) {
        let points = snapshot
            .points
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                )
            })
            .collect();
        if let Ok(mut cols) = self.collections.write() {
            cols.insert(
                collection.to_owned(),
                Collection {
                    vector_size: snapshot.vector_size,
                    points,
                },
            );
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_insert_with(|| Collection {
                vector_size,
                points: HashMap::new(),
            });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.remove(&collection);
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
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            for p in points {
                if p.vector.len() as u64 != col.vector_size {
                    return Err(VectorStoreError::Upsert(format!(
                        "vector dimension {} does not match collection size {}",
                        p.vector.len(),
                        col.vector_size
                    )));
                }
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
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
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let mut scored: Vec<ScoredPoint> = col
                .points
                .iter()
                .map(|(id, sp)| ScoredPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            #[expect(clippy::cast_possible_truncation)]
            scored.truncate(limit as usize);
            Ok(scored)
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Delete(format!("collection {collection} not found"))
            })?;
            for id in &ids {
                col.points.remove(id);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, index: usize) -> ChunkPayload {
        ChunkPayload {
            content: content.into(),
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn ensure_collection_and_exists() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("doc").await.unwrap());
        store.ensure_collection("doc", 3).await.unwrap();
        assert!(store.collection_exists("doc").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_collection_idempotent() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("doc", 3).await.unwrap();
        store.ensure_collection("doc", 3).await.unwrap();
        assert!(store.collection_exists("doc").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_and_search_ranks_by_cosine() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("doc", 3).await.unwrap();

        let points = vec![
            VectorPoint {
                id: "a".into(),
                vector: vec![1.0, 0.0, 0.0],
                payload: chunk("alpha", 0),
            },
            VectorPoint {
                id: "b".into(),
                vector: vec![0.0, 1.0, 0.0],
                payload: chunk("beta", 1),
            },
        ];
        store.upsert("doc", points).await.unwrap();

        let results = store.search("doc", vec![1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
        assert_eq!(results[0].payload.content, "alpha");
    }

    #[tokio::test]
    async fn upsert_rejects_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("doc", 3).await.unwrap();

        let err = store
            .upsert(
                "doc",
                vec![VectorPoint {
                    id: "a".into(),
                    vector: vec![1.0, 0.0],
                    payload: chunk("short", 0),
                }],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_errors() {
        let store = InMemoryVectorStore::new();
        let result = store
            .upsert(
                "missing",
                vec![VectorPoint {
                    id: "a".into(),
                    vector: vec![1.0],
                    payload: chunk("x", 0),
                }],
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_collection_removes() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("doc", 3).await.unwrap();
        store.delete_collection("doc").await.unwrap();
        assert!(!store.collection_exists("doc").await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_ids_removes_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("doc", 1).await.unwrap();
        store
            .upsert(
                "doc",
                vec![VectorPoint {
                    id: "a".into(),
                    vector: vec![1.0],
                    payload: chunk("x", 0),
                }],
            )
            .await
            .unwrap();
        store.delete_by_ids("doc", vec!["a".into()]).await.unwrap();

        let results = store.search("doc", vec![1.0], 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn export_import_roundtrip_preserves_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("doc", 2).await.unwrap();
        store
            .upsert(
                "doc",
                vec![
                    VectorPoint {
                        id: "b".into(),
                        vector: vec![0.0, 1.0],
                        payload: chunk("second", 1),
                    },
                    VectorPoint {
                        id: "a".into(),
                        vector: vec![1.0, 0.0],
                        payload: chunk("first", 0),
                    },
                ],
            )
            .await
            .unwrap();

        let snapshot = store.export("doc").unwrap();
        assert_eq!(snapshot.vector_size, 2);
        // Export orders by chunk index for stable snapshot files.
        assert_eq!(snapshot.points[0].payload.chunk_index, 0);

        let other = InMemoryVectorStore::new();
        other.import("doc", snapshot);
        let results = other.search("doc", vec![1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn cosine_similarity_orthogonal_and_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < f32::EPSILON);
        assert!((cosine_similarity(&[0.0, 0.0], &[1.0, 0.0])).abs() < f32::EPSILON);
    }

    #[test]
    fn export_unknown_collection_is_none() {
        let store = InMemoryVectorStore::new();
        assert!(store.export("nope").is_none());
    }
}
