//! Turning a built prompt into an LLM request.

use sage_llm::LlmRequest;
use sage_prompt::{BuiltPrompt, GenerationSettings};

/// Build a request for `model`, carrying the prompt's system message and
/// generation settings.
pub(crate) fn llm_request(
    built: BuiltPrompt,
    settings: &GenerationSettings,
    model: &str,
) -> LlmRequest {
    let mut request = LlmRequest::new(built.user, model);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }
    if let Some(temperature) = settings.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(max_tokens) = settings.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    request
}
