use std::sync::Arc;

use papyrus_llm::{LlmProvider, Message};
use serde::Serialize;
use tracing::debug;

use crate::error::MemoryError;
use crate::vector_store::{ScoredPoint, VectorStore};

/// Answer to a question, with the passages the model was shown.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourcePassage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcePassage {
    pub content: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Retrieval-augmented answering over one document collection.
pub struct QueryEngine<E, G> {
    store: Arc<dyn VectorStore>,
    embedder: E,
    generator: G,
    top_k: u64,
    score_floor: f32,
}

impl<E: LlmProvider, G: LlmProvider> QueryEngine<E, G> {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: E,
        generator: G,
        top_k: u64,
        score_floor: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            top_k,
            score_floor,
        }
    }

    /// Embeds the question, retrieves the closest chunks, and asks the
    /// generator to answer from them.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, search, or generation fails.
    pub async fn ask(&self, collection: &str, question: &str) -> Result<Answer, MemoryError> {
        let query_vector = self.embedder.embed(question).await?;
        let hits = self
            .store
            .search(collection, query_vector, self.top_k)
            .await?;

        let retained: Vec<ScoredPoint> = hits
            .into_iter()
            .filter(|h| h.score >= self.score_floor)
            .collect();
        debug!(
            collection,
            passages = retained.len(),
            "retrieved context for question"
        );

        let prompt = build_prompt(question, &retained);
        let messages = [
            Message::system(
                "You answer questions about a document using only the provided passages. \
                 If the passages do not contain the answer, say so plainly.",
            ),
            Message::user(&prompt),
        ];
        let answer = self.generator.chat(&messages).await?;

        let sources = retained
            .into_iter()
            .map(|h| SourcePassage {
                content: h.payload.content,
                chunk_index: h.payload.chunk_index,
                score: h.score,
            })
            .collect();

        Ok(Answer { answer, sources })
    }
}

fn build_prompt(question: &str, passages: &[ScoredPoint]) -> String {
    let mut prompt = String::new();
    if passages.is_empty() {
        prompt.push_str("No relevant passages were found in the document.\n\n");
    } else {
        prompt.push_str("Passages from the document:\n\n");
        for (i, hit) in passages.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n\n", i + 1, hit.payload.content.trim()));
        }
    }
    prompt.push_str(&format!("Question: {question}"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_store::InMemoryVectorStore;
    use crate::vector_store::{ChunkPayload, VectorPoint};
    use papyrus_llm::mock::MockProvider;

    async fn seeded_store(mock: &MockProvider, texts: &[&str]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection("doc", 8).await.unwrap();
        let mut points = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let vector = mock.embed(text).await.unwrap();
            points.push(VectorPoint {
                id: format!("p{i}"),
                vector,
                payload: ChunkPayload {
                    content: (*text).to_owned(),
                    chunk_index: i,
                },
            });
        }
        store.upsert("doc", points).await.unwrap();
        store
    }

    #[tokio::test]
    async fn ask_returns_answer_with_sources() {
        let mock = MockProvider::with_responses(vec!["Paris is the capital.".into()]);
        let store =
            seeded_store(&mock, &["Paris is the capital of France.", "Rust is a language."])
                .await;

        let engine = QueryEngine::new(store, mock.clone(), mock, 5, 0.0);
        let answer = engine
            .ask("doc", "Paris is the capital of France.")
            .await
            .unwrap();

        assert_eq!(answer.answer, "Paris is the capital.");
        assert!(!answer.sources.is_empty());
        // Identical text embeds identically, so it must rank first.
        assert_eq!(answer.sources[0].content, "Paris is the capital of France.");
    }

    #[tokio::test]
    async fn score_floor_drops_weak_passages() {
        let mock = MockProvider::default();
        let store = seeded_store(&mock, &["completely unrelated text"]).await;

        let engine = QueryEngine::new(store, mock.clone(), mock, 5, 1.1);
        let answer = engine.ask("doc", "what is this about?").await.unwrap();
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn missing_collection_errors() {
        let mock = MockProvider::default();
        let store = Arc::new(InMemoryVectorStore::new());
        let engine = QueryEngine::new(store, mock.clone(), mock, 5, 0.0);

        let result = engine.ask("missing", "question?").await;
        assert!(matches!(result, Err(MemoryError::VectorStore(_))));
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let embedder = MockProvider::default();
        let store = seeded_store(&embedder, &["some content"]).await;
        let engine = QueryEngine::new(store, embedder, MockProvider::failing(), 5, 0.0);

        let result = engine.ask("doc", "question?").await;
        assert!(matches!(result, Err(MemoryError::Llm(_))));
    }

    #[test]
    fn prompt_numbers_passages() {
        let passages = vec![
            ScoredPoint {
                id: "a".into(),
                score: 0.9,
                payload: ChunkPayload {
                    content: "First passage.".into(),
                    chunk_index: 0,
                },
            },
            ScoredPoint {
                id: "b".into(),
                score: 0.8,
                payload: ChunkPayload {
                    content: "Second passage.".into(),
                    chunk_index: 1,
                },
            },
        ];
        let prompt = build_prompt("What?", &passages);
        assert!(prompt.contains("[1] First passage."));
        assert!(prompt.contains("[2] Second passage."));
        assert!(prompt.ends_with("Question: What?"));
    }

    #[test]
    fn prompt_notes_missing_passages() {
        let prompt = build_prompt("What?", &[]);
        assert!(prompt.contains("No relevant passages"));
    }
}
