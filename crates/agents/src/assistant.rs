//! Wiring of the controller and its collaborators from configuration.
//!
//! Collaborators are created once here and injected into the controller;
//! the caller owns their lifetime.

use crate::answer::LlmAnswerer;
use crate::controller::Controller;
use crate::intent::TfidfIntentClassifier;
use crate::vision::LlmCaptioner;
use sage_core::{AppConfig, AppError, AppResult};
use sage_knowledge::KnowledgeBase;
use sage_llm::{create_client, LlmClient};
use sage_prompt::{load_prompt, ANSWER_PROMPT_ID, CAPTION_PROMPT_ID};
use std::sync::Arc;

/// Create an LLM client for `provider` using the configured endpoint and key.
pub fn llm_client(config: &AppConfig, provider: &str) -> AppResult<Arc<dyn LlmClient>> {
    let endpoint = config.resolve_endpoint(provider);
    let api_key = config.resolve_api_key(provider);
    create_client(provider, endpoint.as_deref(), api_key.as_deref()).map_err(AppError::Config)
}

/// Open the configured knowledge base.
pub async fn open_knowledge_base(config: &AppConfig) -> AppResult<KnowledgeBase> {
    KnowledgeBase::open(&config.workspace, &config.assistant.collection).await
}

/// Build the image captioner for the configured vision provider.
pub fn build_captioner(config: &AppConfig) -> AppResult<LlmCaptioner> {
    let provider = config.vision_provider();
    let client = llm_client(config, provider)?;
    let prompt = load_prompt(&config.workspace, CAPTION_PROMPT_ID)?;

    tracing::debug!(
        "Vision captioner: provider={}, model={}",
        provider,
        config.vision_model()
    );

    Ok(LlmCaptioner::with_prompt(
        client,
        config.vision_model(),
        prompt,
    ))
}

/// Build a controller with every collaborator resolved from `config`.
pub async fn build_controller(config: &AppConfig) -> AppResult<Controller> {
    let model_path = config.intent_model_path();
    let classifier = TfidfIntentClassifier::load(&model_path).map_err(|e| {
        AppError::Classification(format!("{} (train one with `sage train`)", e))
    })?;

    let knowledge = open_knowledge_base(config).await?;

    let answer_client = llm_client(config, &config.provider)?;
    let answer_prompt = load_prompt(&config.workspace, ANSWER_PROMPT_ID)?;
    let answerer = LlmAnswerer::with_prompt(answer_client, config.model.clone(), answer_prompt);

    let captioner = build_captioner(config)?;

    tracing::info!(
        "Assistant ready: provider={}, model={}, collection={}",
        config.provider,
        config.model,
        config.assistant.collection
    );

    Ok(Controller::new(
        Arc::new(classifier),
        Arc::new(knowledge),
        Arc::new(captioner),
        Arc::new(answerer),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            workspace: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_intent_model_is_classification_error() {
        let temp = TempDir::new().unwrap();
        let result = build_controller(&config_in(temp.path())).await;
        match result {
            Err(AppError::Classification(msg)) => assert!(msg.contains("sage train")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("controller built without an intent model"),
        }
    }

    #[test]
    fn test_hosted_provider_without_key_fails() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(temp.path());
        config.api_key = None;
        config.llm = Some(sage_core::config::LlmConfig {
            active_provider: "openai".to_string(),
            providers: [(
                "openai".to_string(),
                sage_core::config::ProviderConfig::OpenAI {
                    api_key_env: "SAGE_TEST_UNSET_KEY_VAR".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    endpoint: None,
                },
            )]
            .into_iter()
            .collect(),
        });
        // OPENAI_API_KEY may be set in the environment; only assert when it is not.
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(matches!(llm_client(&config, "openai"), Err(AppError::Config(_))));
        }
        assert!(llm_client(&config, "ollama").is_ok());
    }

    #[tokio::test]
    async fn test_build_controller_with_trained_model() {
        let temp = TempDir::new().unwrap();
        let config = config_in(temp.path());

        let texts = vec!["describe the chart".to_string(), "net profit".to_string()];
        let labels = vec!["visual".to_string(), "fact".to_string()];
        TfidfIntentClassifier::train(&texts, &labels)
            .unwrap()
            .save(&config.intent_model_path())
            .unwrap();

        assert!(build_controller(&config).await.is_ok());
    }
}
