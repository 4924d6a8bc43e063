//! Prompt system for Sage.
//!
//! This crate provides structured prompt management with:
//! - Built-in definitions for answering and image captioning
//! - YAML overrides under `.sage/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{builtin_prompt, ANSWER_PROMPT_ID, CAPTION_PROMPT_ID};
pub use loader::load_prompt;
pub use types::{BuiltPrompt, BuiltPromptMetadata, GenerationSettings, PromptDefinition};
