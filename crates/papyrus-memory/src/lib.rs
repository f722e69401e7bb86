//! Document ingestion, per-document vector indexes persisted as flat files,
//! and retrieval-augmented answering.

pub mod disk_store;
pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod service;
pub mod vector_store;

pub use error::MemoryError;
pub use query::{Answer, SourcePassage};
pub use registry::DocumentRecord;
pub use service::{DocumentService, ServiceOptions, UploadOutcome};
