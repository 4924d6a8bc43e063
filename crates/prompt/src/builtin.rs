//! Built-in prompt definitions.

use crate::types::{GenerationSettings, PromptDefinition};

/// Prompt used by the answering service.
pub const ANSWER_PROMPT_ID: &str = "answer.default";

/// Prompt used by the vision captioner.
pub const CAPTION_PROMPT_ID: &str = "vision.caption";

const ANSWER_TEMPLATE: &str = "Answer the user's question using the following context:\n\n{{context}}\n\nQuestion: {{query}}\nAnswer:";

const CAPTION_TEMPLATE: &str = "Describe this image in one short sentence. \
Say whether it is a chart or graph, a document page, a natural scene, a person, \
a diagram or infographic, or a technical figure, and what it shows.";

/// Look up a built-in prompt by ID.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Grounded answer".to_string(),
            api_version: "1.0".to_string(),
            variables: vec!["query".to_string(), "context".to_string()],
            system: None,
            template: ANSWER_TEMPLATE.to_string(),
            generation: GenerationSettings {
                temperature: Some(0.3),
                max_tokens: Some(512),
            },
        }),
        CAPTION_PROMPT_ID => Some(PromptDefinition {
            id: CAPTION_PROMPT_ID.to_string(),
            title: "Image caption".to_string(),
            api_version: "1.0".to_string(),
            variables: Vec::new(),
            system: None,
            template: CAPTION_TEMPLATE.to_string(),
            generation: GenerationSettings {
                temperature: Some(0.0),
                max_tokens: Some(96),
            },
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_resolve() {
        for id in [ANSWER_PROMPT_ID, CAPTION_PROMPT_ID] {
            let def = builtin_prompt(id).unwrap();
            assert_eq!(def.id, id);
            assert!(!def.template.is_empty());
        }
    }

    #[test]
    fn test_answer_prompt_settings() {
        let def = builtin_prompt(ANSWER_PROMPT_ID).unwrap();
        assert_eq!(def.generation.temperature, Some(0.3));
        assert_eq!(def.generation.max_tokens, Some(512));
        assert!(def.template.starts_with("Answer the user's question"));
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("agent.ask.default").is_none());
    }
}
