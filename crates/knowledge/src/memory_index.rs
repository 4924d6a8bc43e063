//! In-memory [`VectorIndex`] for tests and ephemeral runs.
//!
//! Documents live in a `BTreeMap` behind `std::sync::RwLock`; search is
//! brute-force cosine similarity.

use crate::types::{StoredDocument, TYPE_KEY};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use sage_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryIndex {
    documents: RwLock<BTreeMap<String, StoredDocument>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Retrieval("In-memory index lock poisoned".to_string())
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, documents: &[StoredDocument]) -> AppResult<()> {
        let mut stored = self.documents.write().map_err(poisoned)?;
        for doc in documents {
            stored.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(StoredDocument, f32)>> {
        let stored = self.documents.read().map_err(poisoned)?;
        let scored = stored
            .values()
            .map(|doc| (doc.clone(), cosine_similarity(query_embedding, &doc.embedding)))
            .collect();
        Ok(rank(scored, top_k))
    }

    async fn count(&self, doc_type: Option<&str>) -> AppResult<u64> {
        let stored = self.documents.read().map_err(poisoned)?;
        let count = match doc_type {
            Some(t) => stored
                .values()
                .filter(|d| d.metadata.get(TYPE_KEY).map(String::as_str) == Some(t))
                .count(),
            None => stored.len(),
        };
        Ok(count as u64)
    }

    async fn reset(&self) -> AppResult<()> {
        self.documents.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn doc(id: &str, embedding: Vec<f32>, doc_type: &str) -> StoredDocument {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), format!("{}.txt", id));
        metadata.insert(TYPE_KEY.to_string(), doc_type.to_string());
        StoredDocument {
            id: id.to_string(),
            text: format!("text of {}", id),
            embedding,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                doc("far", vec![0.0, 1.0], "text"),
                doc("near", vec![1.0, 0.1], "text"),
                doc("mid", vec![1.0, 1.0], "text"),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|(d, _)| d.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(results[0].1 >= results[1].1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_id() {
        let index = MemoryIndex::new();
        index.upsert(&[doc("a", vec![1.0, 0.0], "text")]).await.unwrap();

        let mut replacement = doc("a", vec![0.0, 1.0], "image");
        replacement.text = "updated".to_string();
        index.upsert(&[replacement]).await.unwrap();

        assert_eq!(index.count(None).await.unwrap(), 1);
        let results = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].0.text, "updated");
    }

    #[tokio::test]
    async fn test_count_by_type_and_reset() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                doc("t1", vec![1.0], "text"),
                doc("t2", vec![1.0], "text"),
                doc("i1", vec![1.0], "image"),
            ])
            .await
            .unwrap();

        assert_eq!(index.count(None).await.unwrap(), 3);
        assert_eq!(index.count(Some("text")).await.unwrap(), 2);
        assert_eq!(index.count(Some("image")).await.unwrap(), 1);

        index.reset().await.unwrap();
        assert_eq!(index.count(None).await.unwrap(), 0);
        assert!(index.search(&[1.0], 5).await.unwrap().is_empty());
    }
}
