#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("document error: {0}")]
    Document(#[from] crate::document::DocumentError),

    #[error("LLM error: {0}")]
    Llm(#[from] papyrus_llm::LlmError),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
}
