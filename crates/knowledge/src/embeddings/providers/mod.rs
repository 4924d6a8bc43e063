//! Built-in embedding providers.

pub mod ollama;
pub mod trigram;
