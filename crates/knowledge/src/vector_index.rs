//! Vector index abstraction for stored documents.
//!
//! Defines a trait for backend-agnostic vector storage and retrieval.

use crate::types::StoredDocument;
use sage_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting documents (an existing id is replaced)
/// - Searching for similar vectors (top-k)
/// - Counting documents, optionally by `type`
/// - Resetting/clearing the index
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert documents, replacing any stored under the same ids.
    async fn upsert(&self, documents: &[StoredDocument]) -> AppResult<()>;

    /// Search for the top-k most similar documents to the query embedding.
    ///
    /// Returns documents ordered by descending cosine similarity.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(StoredDocument, f32)>>;

    /// Count stored documents, restricted to one `type` when given.
    async fn count(&self, doc_type: Option<&str>) -> AppResult<u64>;

    /// Remove every document.
    async fn reset(&self) -> AppResult<()>;
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort scored documents by descending score and keep the first `top_k`.
pub(crate) fn rank(mut scored: Vec<(StoredDocument, f32)>, top_k: usize) -> Vec<(StoredDocument, f32)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}
