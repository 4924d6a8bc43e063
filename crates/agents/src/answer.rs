//! Answer synthesis over retrieved context.

use crate::request::llm_request;
use sage_core::{AppError, AppResult};
use sage_llm::LlmClient;
use sage_prompt::{build_prompt, builtin_prompt, PromptDefinition, ANSWER_PROMPT_ID};
use std::collections::HashMap;
use std::sync::Arc;

/// Produces a natural-language answer to `query` grounded in `context`.
#[async_trait::async_trait]
pub trait AnsweringService: Send + Sync {
    async fn answer(&self, query: &str, context: &str) -> AppResult<String>;
}

/// Answers through a remote LLM. Failures are returned, never masked.
pub struct LlmAnswerer {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl LlmAnswerer {
    /// Create an answerer using the built-in `answer.default` prompt.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> AppResult<Self> {
        let prompt = builtin_prompt(ANSWER_PROMPT_ID)
            .ok_or_else(|| AppError::Prompt(format!("Missing prompt {}", ANSWER_PROMPT_ID)))?;
        Ok(Self::with_prompt(client, model, prompt))
    }

    /// Create an answerer with an explicit prompt definition.
    pub fn with_prompt(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }
}

#[async_trait::async_trait]
impl AnsweringService for LlmAnswerer {
    async fn answer(&self, query: &str, context: &str) -> AppResult<String> {
        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), context.to_string());

        let built = build_prompt(&self.prompt, variables)?;
        let request = llm_request(built, &self.prompt.generation, &self.model);

        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            context_chars = context.len(),
            "Requesting answer"
        );

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Answer(e.to_string()))?;

        tracing::debug!(
            "Answer used {} prompt / {} completion tokens",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_llm::{LlmRequest, LlmResponse, LlmUsage};
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Result<String, String>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: request.model.clone(),
                    usage: LlmUsage::new(10, 5),
                    done: true,
                }),
                Err(e) => Err(AppError::Llm(e.clone())),
            }
        }
    }

    #[tokio::test]
    async fn test_answer_prompt_and_settings() {
        let client = ScriptedClient::new(Ok("  Revenue rose steadily.\n"));
        let answerer = LlmAnswerer::new(client.clone(), "llama-3.3-70b-versatile").unwrap();

        let answer = answerer
            .answer("What is the revenue trend?", "Q1: 10\nQ2: 12")
            .await
            .unwrap();
        assert_eq!(answer, "Revenue rose steadily.");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(
            request.prompt,
            "Answer the user's question using the following context:\n\nQ1: 10\nQ2: 12\n\nQuestion: What is the revenue trend?\nAnswer:"
        );
        assert_eq!(request.model, "llama-3.3-70b-versatile");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(512));
        assert!(request.images.is_empty());
    }

    #[tokio::test]
    async fn test_empty_context_still_answers() {
        let client = ScriptedClient::new(Ok("I don't know."));
        let answerer = LlmAnswerer::new(client.clone(), "m").unwrap();
        assert_eq!(answerer.answer("q", "").await.unwrap(), "I don't know.");
        assert!(client.seen.lock().unwrap()[0]
            .prompt
            .contains("context:\n\n\n\nQuestion: q"));
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let client = ScriptedClient::new(Err("503 Service Unavailable"));
        let answerer = LlmAnswerer::new(client, "m").unwrap();
        let err = answerer.answer("q", "c").await.unwrap_err();
        assert!(matches!(err, AppError::Answer(_)));
        assert!(err.to_string().contains("503"));
    }
}
