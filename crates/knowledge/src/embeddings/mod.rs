//! Embedding providers for knowledge bases.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
