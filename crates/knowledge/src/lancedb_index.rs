//! LanceDB-backed vector index implementation.

use crate::types::{Metadata, StoredDocument, SOURCE_KEY, TYPE_KEY};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use sage_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Default table name inside an index directory.
pub const DOCUMENTS_TABLE: &str = "documents";

/// LanceDB-backed vector index for documents.
pub struct LanceDbIndex {
    table: Table,
    embedding_dim: usize,
}

fn lance_err(context: &str) -> impl Fn(lancedb::Error) -> AppError + '_ {
    move |e| AppError::Retrieval(format!("{}: {}", context, e))
}

/// Quote a string literal for a Lance SQL predicate.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl LanceDbIndex {
    /// Create or open a LanceDB index at the specified path.
    ///
    /// # Arguments
    /// * `db_path` - Directory path for the LanceDB database
    /// * `table_name` - Name of the table (typically [`DOCUMENTS_TABLE`])
    /// * `embedding_dim` - Dimension of embedding vectors (e.g., 384)
    pub async fn open(db_path: &Path, table_name: &str, embedding_dim: usize) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(lance_err("Failed to connect to LanceDB"))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(lance_err("Failed to list tables"))?;

        let table = if table_names.iter().any(|name| name == table_name) {
            conn.open_table(table_name)
                .execute()
                .await
                .map_err(lance_err("Failed to open table"))?
        } else {
            let schema = Self::create_schema(embedding_dim);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(lance_err("Failed to create table"))?
        };

        tracing::debug!("Opened LanceDB index at {:?}", db_path);

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    /// Arrow schema for the documents table.
    ///
    /// `source` and `doc_type` are lifted out of the metadata so they can be
    /// filtered on; the full metadata map is kept as JSON.
    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
            Field::new("source", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, true),
            Field::new("metadata", DataType::Utf8, false),
        ]))
    }

    /// Convert documents to a single Arrow RecordBatch.
    fn documents_to_batch(&self, documents: &[StoredDocument]) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(self.embedding_dim);

        let mut flat = Vec::with_capacity(documents.len() * self.embedding_dim);
        let mut metadata_json = Vec::with_capacity(documents.len());

        for doc in documents {
            if doc.embedding.len() != self.embedding_dim {
                return Err(AppError::Retrieval(format!(
                    "Embedding dimension mismatch for '{}': expected {}, got {}",
                    doc.id,
                    self.embedding_dim,
                    doc.embedding.len()
                )));
            }
            flat.extend_from_slice(&doc.embedding);
            metadata_json.push(serde_json::to_string(&doc.metadata)?);
        }

        let ids = StringArray::from_iter_values(documents.iter().map(|d| d.id.as_str()));
        let texts = StringArray::from_iter_values(documents.iter().map(|d| d.text.as_str()));
        let sources = StringArray::from_iter_values(
            documents
                .iter()
                .map(|d| d.metadata.get(SOURCE_KEY).map(String::as_str).unwrap_or("")),
        );
        let doc_types: StringArray = documents
            .iter()
            .map(|d| d.metadata.get(TYPE_KEY).map(String::as_str))
            .collect();
        let metadata = StringArray::from_iter_values(metadata_json.iter().map(String::as_str));

        let embeddings = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to build embedding column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(texts),
                Arc::new(embeddings),
                Arc::new(sources),
                Arc::new(doc_types),
                Arc::new(metadata),
            ],
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to create RecordBatch: {}", e)))
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| AppError::Retrieval(format!("Invalid {} column", name)))
    }

    /// Convert every row of a batch back into documents.
    fn batch_to_documents(batch: &RecordBatch) -> AppResult<Vec<StoredDocument>> {
        let ids = Self::string_column(batch, "id")?;
        let texts = Self::string_column(batch, "text")?;
        let metadata = Self::string_column(batch, "metadata")?;
        let embeddings = batch
            .column_by_name("embedding")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| AppError::Retrieval("Invalid embedding column".to_string()))?;

        let mut documents = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let values = embeddings.value(row);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| AppError::Retrieval("Invalid embedding values".to_string()))?;

            let metadata: Metadata = serde_json::from_str(metadata.value(row))?;

            documents.push(StoredDocument {
                id: ids.value(row).to_string(),
                text: texts.value(row).to_string(),
                embedding: values.values().to_vec(),
                metadata,
            });
        }

        Ok(documents)
    }
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    async fn upsert(&self, documents: &[StoredDocument]) -> AppResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let batch = self.documents_to_batch(documents)?;
        let schema = batch.schema();

        // Single commit: existing ids are replaced, new ids inserted
        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .await
            .map_err(lance_err("Failed to upsert documents"))?;

        tracing::debug!("Upserted {} documents into LanceDB", documents.len());
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(StoredDocument, f32)>> {
        if query_embedding.len() != self.embedding_dim {
            return Err(AppError::Retrieval(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                query_embedding.len()
            )));
        }

        if top_k == 0 || self.count(None).await? == 0 {
            return Ok(Vec::new());
        }

        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .nearest_to(query_embedding.to_vec())
            .map_err(lance_err("Failed to create query"))?
            .limit(top_k)
            .execute()
            .await
            .map_err(lance_err("Failed to execute search"))?
            .try_collect()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to collect results: {}", e)))?;

        let mut scored = Vec::new();
        for batch in &batches {
            for doc in Self::batch_to_documents(batch)? {
                let score = cosine_similarity(query_embedding, &doc.embedding);
                scored.push((doc, score));
            }
        }

        tracing::debug!("Retrieved {} documents (requested top-{})", scored.len(), top_k);

        Ok(rank(scored, top_k))
    }

    async fn count(&self, doc_type: Option<&str>) -> AppResult<u64> {
        let filter = doc_type.map(|t| format!("doc_type = {}", sql_literal(t)));
        let count = self
            .table
            .count_rows(filter)
            .await
            .map_err(lance_err("Failed to count rows"))?;
        Ok(count as u64)
    }

    async fn reset(&self) -> AppResult<()> {
        if self.count(None).await? > 0 {
            self.table
                .delete("id IS NOT NULL")
                .await
                .map_err(lance_err("Failed to reset index"))?;
        }

        tracing::info!("Reset LanceDB index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str, embedding: Vec<f32>, source: &str, doc_type: &str) -> StoredDocument {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        metadata.insert(TYPE_KEY.to_string(), doc_type.to_string());
        StoredDocument {
            id: id.to_string(),
            text: format!("text of {}", id),
            embedding,
            metadata,
        }
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("o'brien_0"), "'o''brien_0'");
    }

    #[tokio::test]
    async fn test_upsert_search_roundtrip() {
        let temp = TempDir::new().unwrap();
        let index = LanceDbIndex::open(&temp.path().join("index.lance"), DOCUMENTS_TABLE, 3)
            .await
            .unwrap();

        index
            .upsert(&[
                doc("report_0", vec![1.0, 0.0, 0.0], "data/text/report.txt", "text"),
                doc("report_1", vec![0.0, 1.0, 0.0], "data/text/report.txt", "text"),
                doc("chart_img", vec![0.7, 0.7, 0.0], "data/images/chart.png", "image"),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "report_0");
        assert_eq!(results[1].0.id, "chart_img");
        assert_eq!(
            results[1].0.metadata.get(SOURCE_KEY).map(String::as_str),
            Some("data/images/chart.png")
        );

        assert_eq!(index.count(None).await.unwrap(), 3);
        assert_eq!(index.count(Some("image")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_reset_clears() {
        let temp = TempDir::new().unwrap();
        let index = LanceDbIndex::open(&temp.path().join("index.lance"), DOCUMENTS_TABLE, 2)
            .await
            .unwrap();

        index
            .upsert(&[doc("a", vec![1.0, 0.0], "a.txt", "text")])
            .await
            .unwrap();
        let mut replacement = doc("a", vec![1.0, 0.0], "a.txt", "text");
        replacement.text = "updated".to_string();
        index.upsert(&[replacement]).await.unwrap();

        assert_eq!(index.count(None).await.unwrap(), 1);
        let results = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].0.text, "updated");

        index.reset().await.unwrap();
        assert_eq!(index.count(None).await.unwrap(), 0);
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reupsert_mixed_batch_keeps_other_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.lance");
        let index = LanceDbIndex::open(&path, DOCUMENTS_TABLE, 2).await.unwrap();

        index
            .upsert(&[
                doc("report_0", vec![1.0, 0.0], "report.txt", "text"),
                doc("report_1", vec![0.0, 1.0], "report.txt", "text"),
            ])
            .await
            .unwrap();

        let mut changed = doc("report_1", vec![0.0, 1.0], "report.txt", "text");
        changed.text = "revised paragraph".to_string();
        index
            .upsert(&[changed, doc("fig_img", vec![0.6, 0.8], "images/fig.png", "image")])
            .await
            .unwrap();

        assert_eq!(index.count(None).await.unwrap(), 3);
        assert_eq!(index.count(Some("text")).await.unwrap(), 2);

        // Reopening sees the same committed state
        let reopened = LanceDbIndex::open(&path, DOCUMENTS_TABLE, 2).await.unwrap();
        let results = reopened.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].0.id, "report_1");
        assert_eq!(results[0].0.text, "revised paragraph");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let temp = TempDir::new().unwrap();
        let index = LanceDbIndex::open(&temp.path().join("index.lance"), DOCUMENTS_TABLE, 4)
            .await
            .unwrap();

        let err = index
            .upsert(&[doc("a", vec![1.0], "a.txt", "text")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }
}
