//! Knowledge base management for Sage.
//!
//! Provides the retrieval service: documents are embedded and kept in a
//! vector index (LanceDB on disk, or in memory) and queried by cosine
//! similarity.

pub mod config;
pub mod embeddings;
pub mod lancedb_index;
pub mod memory_index;
pub mod parser;
pub mod retrieval;
pub mod types;
pub mod vector_index;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use lancedb_index::LanceDbIndex;
pub use memory_index::MemoryIndex;
pub use parser::{split_documents, ContentType};
pub use retrieval::{validate_batch, KnowledgeBase, RetrievalService};
pub use types::{
    BaseStats, KnowledgeBaseConfig, Metadata, RetrievedItem, StoredDocument, SOURCE_KEY, TYPE_KEY,
};
pub use vector_index::VectorIndex;
