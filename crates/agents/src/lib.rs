//! The Sage assistant: an intent-routing controller and its collaborators.
//!
//! - [`intent`]: query classification (TF-IDF nearest centroid)
//! - [`vision`]: fail-soft image captioning through a vision LLM
//! - [`answer`]: grounded answer synthesis through an LLM
//! - [`controller`]: routes a query to the text or visual pipeline
//! - [`ingest`]: populates the knowledge base from text and image folders
//! - [`assistant`]: builds all of the above from configuration

pub mod answer;
pub mod assistant;
pub mod controller;
pub mod ingest;
pub mod intent;
pub mod vision;

mod request;


pub use answer::{AnsweringService, LlmAnswerer};
pub use assistant::build_controller;
pub use controller::{Controller, RoutedAnswer, INTENT_NOT_RECOGNIZED};
pub use ingest::{ingest_image_dir, ingest_text_dir, IngestStats};
pub use intent::{Intent, IntentClassifier, TfidfIntentClassifier};
pub use vision::{LlmCaptioner, VisionCaptioner};
