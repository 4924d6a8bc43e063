//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key naming where a document came from (a file path).
pub const SOURCE_KEY: &str = "source";

/// Metadata key naming the document kind, `text` or `image`.
pub const TYPE_KEY: &str = "type";

/// String-to-string metadata attached to every stored document.
pub type Metadata = BTreeMap<String, String>;

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    pub name: String,

    /// Embedding provider: `trigram` (offline) or `ollama`
    pub provider: String,

    /// Model for embeddings
    pub model: String,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: u32,

    /// Endpoint for network embedding providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_embedding_dim() -> u32 {
    384
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            embedding_dim: default_embedding_dim(),
            endpoint: None,
        }
    }
}

/// A document returned by a retrieval query.
///
/// Lives for one request; the controller reads it and drops it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub text: String,
    pub metadata: Metadata,
}

impl RetrievedItem {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Provenance path, if the item carries one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A document as held by a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

impl From<StoredDocument> for RetrievedItem {
    fn from(doc: StoredDocument) -> Self {
        RetrievedItem {
            text: doc.text,
            metadata: doc.metadata,
        }
    }
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    /// Base name
    pub base_name: String,

    /// Embedding provider and model in use
    pub provider: String,
    pub model: String,

    /// Total documents stored
    pub documents_count: u64,

    /// Documents with `type: text`
    pub text_count: u64,

    /// Documents with `type: image`
    pub image_count: u64,

    /// On-disk size of the index in bytes (0 for in-memory indexes)
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieved_item_accessors() {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), "data/images/chart.png".to_string());
        metadata.insert(TYPE_KEY.to_string(), "image".to_string());

        let item = RetrievedItem::new("caption", metadata);
        assert_eq!(item.source(), Some("data/images/chart.png"));
        assert_eq!(item.metadata[TYPE_KEY], "image");
    }

    #[test]
    fn test_retrieved_item_without_source() {
        let item = RetrievedItem::new("orphan", Metadata::new());
        assert!(item.source().is_none());
    }

    #[test]
    fn test_default_config_is_offline() {
        let config = KnowledgeBaseConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.embedding_dim, 384);
        assert!(config.endpoint.is_none());
    }
}
