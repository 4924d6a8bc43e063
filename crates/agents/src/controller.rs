//! Intent-routing controller.
//!
//! Classifies a query, gathers context through the matching retrieval path
//! and hands query and context to the answering service. Collaborator calls
//! run one after another; the controller keeps no state between queries.

use crate::answer::AnsweringService;
use crate::intent::{Intent, IntentClassifier};
use crate::vision::VisionCaptioner;
use sage_core::{AppError, AppResult};
use sage_knowledge::{RetrievalService, RetrievedItem};
use serde::Serialize;
use std::sync::Arc;

/// Items requested for fact, summary and analysis queries.
pub const TEXT_RESULT_LIMIT: usize = 5;

/// Items requested for visual queries.
pub const VISUAL_RESULT_LIMIT: usize = 3;

/// Returned when the classifier's label is outside the known set.
pub const INTENT_NOT_RECOGNIZED: &str = "Intent not recognized.";

/// Fail-soft reply when a collaborator fails.
pub const TEMPORARILY_UNAVAILABLE: &str =
    "The assistant is temporarily unavailable. Please try again later.";

/// Fail-soft reply for an empty query.
pub const EMPTY_QUERY: &str = "Please enter a question.";

/// Substring a source path must contain to be captioned.
const IMAGE_SOURCE_MARKER: &str = "image";

/// The answer to one query together with how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedAnswer {
    pub intent: Intent,
    /// Raw classifier label, before mapping to an [`Intent`]
    pub label: String,
    pub answer: String,
    /// Sources of the items that fed the context, in context order
    pub sources: Vec<String>,
}

pub struct Controller {
    intent: Arc<dyn IntentClassifier>,
    retrieval: Arc<dyn RetrievalService>,
    vision: Arc<dyn VisionCaptioner>,
    answering: Arc<dyn AnsweringService>,
}

impl Controller {
    pub fn new(
        intent: Arc<dyn IntentClassifier>,
        retrieval: Arc<dyn RetrievalService>,
        vision: Arc<dyn VisionCaptioner>,
        answering: Arc<dyn AnsweringService>,
    ) -> Self {
        Self {
            intent,
            retrieval,
            vision,
            answering,
        }
    }

    /// Answer a query. Collaborator errors propagate.
    pub async fn handle_query(&self, query: &str) -> AppResult<String> {
        Ok(self.route(query).await?.answer)
    }

    /// Answer a query, reporting the intent and sources used.
    pub async fn route(&self, query: &str) -> AppResult<RoutedAnswer> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("Query must not be empty".to_string()));
        }

        let label = self.intent.predict(query).await?;
        let intent = Intent::from_label(&label);
        tracing::info!(
            classifier = self.intent.name(),
            label = %label,
            "Intent: {}",
            intent
        );

        let (context, sources) = match intent {
            Intent::Fact | Intent::Summary | Intent::Analysis => {
                self.text_context(query).await?
            }
            Intent::Visual => self.visual_context(query).await?,
            Intent::Unrecognized => {
                return Ok(RoutedAnswer {
                    intent,
                    label,
                    answer: INTENT_NOT_RECOGNIZED.to_string(),
                    sources: Vec::new(),
                });
            }
        };

        let answer = self.answering.answer(query, &context).await?;

        Ok(RoutedAnswer {
            intent,
            label,
            answer,
            sources,
        })
    }

    /// Answer a query, replacing collaborator failures and empty queries
    /// with fixed user-facing replies.
    ///
    /// Any other error (configuration, serialization) is not a service
    /// outage and is returned to the caller.
    pub async fn respond(&self, query: &str) -> AppResult<String> {
        match self.handle_query(query).await {
            Ok(answer) => Ok(answer),
            Err(AppError::Validation(msg)) => {
                tracing::warn!("Rejected query: {}", msg);
                Ok(EMPTY_QUERY.to_string())
            }
            Err(e) if e.is_collaborator_failure() => {
                tracing::error!("Query failed: {}", e);
                Ok(TEMPORARILY_UNAVAILABLE.to_string())
            }
            Err(e) => Err(e),
        }
    }

    async fn text_context(&self, query: &str) -> AppResult<(String, Vec<String>)> {
        let items = self.retrieval.query(query, TEXT_RESULT_LIMIT).await?;
        tracing::debug!("Text branch retrieved {} items", items.len());

        let context = items
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok((context, sources_of(&items)))
    }

    async fn visual_context(&self, query: &str) -> AppResult<(String, Vec<String>)> {
        let items = self.retrieval.query(query, VISUAL_RESULT_LIMIT).await?;

        let image_paths: Vec<&str> = items
            .iter()
            .filter_map(RetrievedItem::source)
            .filter(|source| source.contains(IMAGE_SOURCE_MARKER))
            .collect();
        tracing::debug!(
            "Visual branch retrieved {} items, {} image sources",
            items.len(),
            image_paths.len()
        );

        let mut captions = Vec::with_capacity(image_paths.len());
        for path in &image_paths {
            captions.push(self.vision.describe_image(path).await);
        }

        Ok((
            captions.join("\n"),
            image_paths.iter().map(|p| p.to_string()).collect(),
        ))
    }
}

fn sources_of(items: &[RetrievedItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(RetrievedItem::source)
        .map(str::to_string)
        .collect()
}
