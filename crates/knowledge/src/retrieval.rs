//! Retrieval service: stores documents and answers similarity queries.

use crate::config;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::lancedb_index::{LanceDbIndex, DOCUMENTS_TABLE};
use crate::memory_index::MemoryIndex;
use crate::types::{BaseStats, KnowledgeBaseConfig, Metadata, RetrievedItem, StoredDocument, SOURCE_KEY};
use crate::vector_index::VectorIndex;
use sage_core::{AppError, AppResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A similarity-searchable document store.
#[async_trait::async_trait]
pub trait RetrievalService: Send + Sync {
    /// Return at most `limit` items, most relevant first.
    async fn query(&self, text: &str, limit: usize) -> AppResult<Vec<RetrievedItem>>;

    /// Insert documents; an id that already exists is replaced.
    ///
    /// The three slices must have equal length, ids must be unique and every
    /// metadata map must carry a `source` key.
    async fn add_documents(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> AppResult<()>;
}

/// Check an `add_documents` batch before anything is written.
pub fn validate_batch(ids: &[String], texts: &[String], metadatas: &[Metadata]) -> AppResult<()> {
    if ids.len() != texts.len() || ids.len() != metadatas.len() {
        return Err(AppError::Validation(format!(
            "ids, texts and metadatas differ in length ({}, {}, {})",
            ids.len(),
            texts.len(),
            metadatas.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(AppError::Validation(format!("Duplicate document id '{}'", id)));
        }
    }

    if let Some((id, _)) = ids
        .iter()
        .zip(metadatas)
        .find(|(_, m)| !m.contains_key(SOURCE_KEY))
    {
        return Err(AppError::Validation(format!(
            "Document '{}' has no '{}' metadata",
            id, SOURCE_KEY
        )));
    }

    Ok(())
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// A named knowledge base: an embedder in front of a vector index.
pub struct KnowledgeBase {
    config: KnowledgeBaseConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    index_path: Option<PathBuf>,
}

impl KnowledgeBase {
    /// Open (creating if needed) the persistent base `name` in `workspace`.
    pub async fn open(workspace: &Path, name: &str) -> AppResult<Self> {
        let config = config::load_config(workspace, name)?;
        if !config::get_config_path(workspace, name).exists() {
            config::save_config(workspace, &config)?;
        }

        let embedder = create_provider(&config).await?;
        let index_path = config::get_index_path(workspace, name);
        let index = LanceDbIndex::open(&index_path, DOCUMENTS_TABLE, embedder.dimensions()).await?;

        tracing::debug!(
            "Opened knowledge base '{}' (provider={}, model={})",
            name,
            config.provider,
            config.model
        );

        Ok(Self {
            config,
            embedder,
            index: Arc::new(index),
            index_path: Some(index_path),
        })
    }

    /// A base backed by an in-memory index.
    pub async fn in_memory(config: KnowledgeBaseConfig) -> AppResult<Self> {
        let embedder = create_provider(&config).await?;
        Ok(Self::with_parts(config, embedder, Arc::new(MemoryIndex::new())))
    }

    /// Assemble a base from explicit parts.
    pub fn with_parts(
        config: KnowledgeBaseConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            config,
            embedder,
            index,
            index_path: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Document counts and on-disk size.
    pub async fn stats(&self) -> AppResult<BaseStats> {
        let db_size_bytes = self
            .index_path
            .as_deref()
            .map(dir_size)
            .unwrap_or(0);

        Ok(BaseStats {
            base_name: self.config.name.clone(),
            provider: self.embedder.provider_name().to_string(),
            model: self.embedder.model_name().to_string(),
            documents_count: self.index.count(None).await?,
            text_count: self.index.count(Some("text")).await?,
            image_count: self.index.count(Some("image")).await?,
            db_size_bytes,
        })
    }

    /// Remove every stored document.
    pub async fn reset(&self) -> AppResult<()> {
        tracing::info!("Resetting knowledge base '{}'", self.config.name);
        self.index.reset().await
    }
}

fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

#[async_trait::async_trait]
impl RetrievalService for KnowledgeBase {
    async fn query(&self, text: &str, limit: usize) -> AppResult<Vec<RetrievedItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = normalize(self.embedder.embed(text).await?);
        let results = self.index.search(&embedding, limit).await?;

        if let (Some((_, top)), Some((_, low))) = (results.first(), results.last()) {
            tracing::debug!(
                "Retrieved {} documents (top score: {:.3}, lowest: {:.3})",
                results.len(),
                top,
                low
            );
        }

        Ok(results.into_iter().map(|(doc, _)| doc.into()).collect())
    }

    async fn add_documents(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> AppResult<()> {
        validate_batch(ids, texts, metadatas)?;
        if ids.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Retrieval(format!(
                "Embedder returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        let documents: Vec<StoredDocument> = ids
            .iter()
            .zip(texts)
            .zip(metadatas)
            .zip(embeddings)
            .map(|(((id, text), metadata), embedding)| StoredDocument {
                id: id.clone(),
                text: text.clone(),
                embedding: normalize(embedding),
                metadata: metadata.clone(),
            })
            .collect();

        self.index.upsert(&documents).await?;
        tracing::debug!(
            "Stored {} documents in '{}'",
            documents.len(),
            self.config.name
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TYPE_KEY;
    use tempfile::TempDir;

    fn meta(source: &str, doc_type: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(SOURCE_KEY.to_string(), source.to_string());
        m.insert(TYPE_KEY.to_string(), doc_type.to_string());
        m
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn memory_base() -> KnowledgeBase {
        KnowledgeBase::in_memory(KnowledgeBaseConfig {
            name: "test".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_length_mismatch_is_validation_error() {
        let base = memory_base().await;
        let err = base
            .add_documents(
                &strings(&["a", "b"]),
                &strings(&["only one"]),
                &[meta("a.txt", "text"), meta("b.txt", "text")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(base.index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let err = validate_batch(
            &strings(&["a", "a"]),
            &strings(&["x", "y"]),
            &[meta("a.txt", "text"), meta("a.txt", "text")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[tokio::test]
    async fn test_missing_source_rejected() {
        let err = validate_batch(&strings(&["a"]), &strings(&["x"]), &[Metadata::new()]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_query_returns_most_relevant_first() {
        let base = memory_base().await;
        base.add_documents(
            &strings(&["report_0", "report_1", "chart_img"]),
            &strings(&[
                "Quarterly revenue increased twelve percent over the prior quarter",
                "The office moved to a new building downtown",
                "Bar chart of revenue by quarter",
            ]),
            &[
                meta("data/text/report.txt", "text"),
                meta("data/text/report.txt", "text"),
                meta("data/images/chart.png", "image"),
            ],
        )
        .await
        .unwrap();

        let results = base.query("quarterly revenue", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|item| item.text.to_lowercase().contains("revenue")));
    }

    #[tokio::test]
    async fn test_query_limit_zero_and_empty_base() {
        let base = memory_base().await;
        assert!(base.query("anything", 5).await.unwrap().is_empty());
        assert!(base.query("anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_copy() {
        let base = memory_base().await;
        for text in ["first version", "second version"] {
            base.add_documents(
                &strings(&["doc_0"]),
                &strings(&[text]),
                &[meta("doc.txt", "text")],
            )
            .await
            .unwrap();
        }

        let stats = base.stats().await.unwrap();
        assert_eq!(stats.documents_count, 1);
        let results = base.query("version", 5).await.unwrap();
        assert_eq!(results[0].text, "second version");
    }

    #[tokio::test]
    async fn test_stats_and_reset() {
        let base = memory_base().await;
        base.add_documents(
            &strings(&["t_0", "i_img"]),
            &strings(&["text body", "a photo caption"]),
            &[meta("t.txt", "text"), meta("i.png", "image")],
        )
        .await
        .unwrap();

        let stats = base.stats().await.unwrap();
        assert_eq!(stats.documents_count, 2);
        assert_eq!(stats.text_count, 1);
        assert_eq!(stats.image_count, 1);
        assert_eq!(stats.db_size_bytes, 0);
        assert_eq!(stats.provider, "trigram");

        base.reset().await.unwrap();
        assert_eq!(base.stats().await.unwrap().documents_count, 0);
    }

    #[tokio::test]
    async fn test_open_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        {
            let base = KnowledgeBase::open(temp.path(), "kb").await.unwrap();
            base.add_documents(
                &strings(&["notes_0"]),
                &strings(&["Revenue forecasts for next year"]),
                &[meta("notes.md", "text")],
            )
            .await
            .unwrap();
        }

        assert!(config::get_config_path(temp.path(), "kb").exists());

        let reopened = KnowledgeBase::open(temp.path(), "kb").await.unwrap();
        let results = reopened.query("revenue forecasts", 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source(), Some("notes.md"));
        assert!(reopened.stats().await.unwrap().db_size_bytes > 0);
    }
}
