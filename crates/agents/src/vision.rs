//! Image captioning.
//!
//! Captioners are fail-soft: a bad image yields one of the sentinel strings
//! below instead of an error, so one unreadable file never aborts a request.

use crate::request::llm_request;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sage_core::{AppError, AppResult};
use sage_llm::{LlmClient, LlmImage};
use sage_prompt::{build_prompt, builtin_prompt, PromptDefinition, CAPTION_PROMPT_ID};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const IMAGE_MISSING: &str = "image file missing";
pub const IMAGE_UNREADABLE: &str = "unreadable or unsupported image";
pub const IMAGE_ANALYSIS_FAILED: &str = "image analysis failed";

/// Describes an image in a short sentence.
#[async_trait::async_trait]
pub trait VisionCaptioner: Send + Sync {
    /// Caption the image at `path`. Never fails; see the sentinel constants.
    async fn describe_image(&self, path: &str) -> String;
}

/// MIME type of an image recognised by its leading bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'B', b'M', ..] => Some("image/bmp"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        _ => None,
    }
}

/// Captions images with a vision-capable LLM.
pub struct LlmCaptioner {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl LlmCaptioner {
    /// Create a captioner using the built-in `vision.caption` prompt.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> AppResult<Self> {
        let prompt = builtin_prompt(CAPTION_PROMPT_ID)
            .ok_or_else(|| AppError::Prompt(format!("Missing prompt {}", CAPTION_PROMPT_ID)))?;
        Ok(Self::with_prompt(client, model, prompt))
    }

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

    async fn caption(&self, media_type: &str, bytes: &[u8]) -> AppResult<String> {
        let built = build_prompt(&self.prompt, HashMap::new())?;
        let request = llm_request(built, &self.prompt.generation, &self.model)
            .with_image(LlmImage::new(media_type, STANDARD.encode(bytes)));

        let response = self.client.complete(&request).await?;
        let caption = response.content.trim();
        if caption.is_empty() {
            return Err(AppError::Caption("model returned an empty caption".to_string()));
        }
        Ok(caption.to_string())
    }
}

#[async_trait::async_trait]
impl VisionCaptioner for LlmCaptioner {
    async fn describe_image(&self, path: &str) -> String {
        let file = Path::new(path);
        if !file.exists() {
            tracing::warn!("Image not found: {}", path);
            return IMAGE_MISSING.to_string();
        }

        let bytes = match tokio::fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Unreadable image skipped: {} ({})", path, e);
                return IMAGE_UNREADABLE.to_string();
            }
        };

        let Some(media_type) = sniff_image_type(&bytes) else {
            tracing::warn!("Unsupported image format skipped: {}", path);
            return IMAGE_UNREADABLE.to_string();
        };

        match self.caption(media_type, &bytes).await {
            Ok(caption) => {
                tracing::debug!("Captioned {}: {}", path, caption);
                caption
            }
            Err(e) => {
                tracing::warn!("Error describing image {}: {}", path, e);
                IMAGE_ANALYSIS_FAILED.to_string()
            }
        }
    }
}
