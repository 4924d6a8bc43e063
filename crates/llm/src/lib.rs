//! LLM integration crate for Sage.
//!
//! Provider-agnostic access to the generation services behind the
//! answering and captioning collaborators.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default, also serves vision models)
//! - **OpenAI** and **Groq**: OpenAI-compatible chat completions
//!
//! # Example
//! ```no_run
//! use sage_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmImage, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
