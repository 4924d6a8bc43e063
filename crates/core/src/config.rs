//! Configuration management for Sage.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.sage/config.yaml)
//!
//! The configuration is workspace-centric: the intent model, the knowledge
//! bases and prompt overrides all live under `.sage/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the assistant knows how to talk to.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .sage/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider used for answering ("ollama", "openai", "groq")
    pub provider: String,

    /// Model identifier used for answering
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Routing and collaborator settings
    pub assistant: AssistantConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// OpenAI-compatible chat completion endpoint (OpenAI, Groq)
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } => model,
            ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Endpoint configured for this provider, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Settings for the controller's collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Knowledge base (similarity index) name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Path of the serialized intent model; relative paths resolve against `.sage/`
    #[serde(rename = "intentModel", default = "default_intent_model")]
    pub intent_model: PathBuf,

    /// Provider used for image captioning (defaults to the answering provider)
    #[serde(rename = "visionProvider", default)]
    pub vision_provider: Option<String>,

    /// Vision-capable model used for image captioning (defaults per provider)
    #[serde(rename = "visionModel", default)]
    pub vision_model: Option<String>,
}

fn default_collection() -> String {
    "knowledge_base".to_string()
}

fn default_intent_model() -> PathBuf {
    PathBuf::from("models/intent_model.json")
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            intent_model: default_intent_model(),
            vision_provider: None,
            vision_model: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    assistant: Option<AssistantConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            assistant: AssistantConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `SAGE_WORKSPACE`: Override workspace path
    /// - `SAGE_CONFIG`: Path to config file
    /// - `SAGE_PROVIDER`: LLM provider
    /// - `SAGE_MODEL`: Model identifier
    /// - `SAGE_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use sage_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("SAGE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("SAGE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.sage_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("SAGE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("SAGE_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("SAGE_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(assistant) = config_file.assistant {
            result.assistant = assistant;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            } else if let Some(model) = default_model(&llm.active_provider) {
                result.model = model.to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            // A provider switch without an explicit model picks that provider's default
            if model.is_none() && provider != self.provider {
                if let Some(default) = self
                    .get_provider_config(&provider)
                    .map(|pc| pc.model().to_string())
                    .or_else(|| default_model(&provider).map(str::to_string))
                {
                    self.model = default;
                }
            }
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .sage directory.
    pub fn sage_dir(&self) -> PathBuf {
        self.workspace.join(".sage")
    }

    /// Ensure the .sage directory exists.
    pub fn ensure_sage_dir(&self) -> AppResult<()> {
        let sage_dir = self.sage_dir();
        if !sage_dir.exists() {
            std::fs::create_dir_all(&sage_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .sage directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved location of the serialized intent model.
    pub fn intent_model_path(&self) -> PathBuf {
        if self.assistant.intent_model.is_absolute() {
            self.assistant.intent_model.clone()
        } else {
            self.sage_dir().join(&self.assistant.intent_model)
        }
    }

    /// Provider used for image captioning.
    pub fn vision_provider(&self) -> &str {
        self.assistant
            .vision_provider
            .as_deref()
            .unwrap_or(&self.provider)
    }

    /// Model used for image captioning on the vision provider.
    pub fn vision_model(&self) -> &str {
        self.assistant
            .vision_model
            .as_deref()
            .or_else(|| default_vision_model(self.vision_provider()))
            .unwrap_or("llava")
    }

    /// Get a provider's configuration block, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Endpoint for a provider, if one is configured.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Resolve the API key for a provider.
    ///
    /// Order: `SAGE_API_KEY` (answering provider only), the provider's
    /// `apiKeyEnv`, then the provider's conventional variable
    /// (`OPENAI_API_KEY`, `GROQ_API_KEY`).
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if provider == self.provider {
            if let Some(ref key) = self.api_key {
                return Some(key.clone());
            }
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) = self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(&api_key_env) {
                return Some(key);
            }
        }

        default_api_key_env(provider).and_then(|var| std::env::var(var).ok())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if requires_api_key(provider) && self.resolve_api_key(provider).is_none() {
            let hint = match self.get_provider_config(provider) {
                Some(ProviderConfig::OpenAI { api_key_env, .. }) => api_key_env,
                _ => default_api_key_env(provider).unwrap_or("SAGE_API_KEY").to_string(),
            };
            return Err(AppError::Config(format!(
                "API key for provider '{}' not found (set {} or SAGE_API_KEY)",
                provider, hint
            )));
        }

        if self.assistant.collection.trim().is_empty() {
            return Err(AppError::Config(
                "assistant.collection cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Whether a provider needs an API key.
pub fn requires_api_key(provider: &str) -> bool {
    matches!(provider, "openai" | "groq")
}

/// Conventional API key variable for a provider.
pub fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        _ => None,
    }
}

/// Default answering model for a provider.
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "ollama" => Some("llama3.2"),
        "openai" => Some("gpt-4o-mini"),
        "groq" => Some("llama-3.3-70b-versatile"),
        _ => None,
    }
}

/// Default captioning model for a provider.
pub fn default_vision_model(provider: &str) -> Option<&'static str> {
    match provider {
        "ollama" => Some("llava"),
        "openai" => Some("gpt-4o-mini"),
        "groq" => Some("meta-llama/llama-4-scout-17b-16e-instruct"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.assistant.collection, "knowledge_base");
        assert_eq!(config.vision_model(), "llava");
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_sage_dir_and_intent_model_path() {
        let config = AppConfig::default();
        assert!(config.sage_dir().ends_with(".sage"));
        assert!(config
            .intent_model_path()
            .ends_with(".sage/models/intent_model.json"));
    }

    #[test]
    fn test_absolute_intent_model_path() {
        let mut config = AppConfig::default();
        let temp = TempDir::new().unwrap();
        let model = temp.path().join("intent.json");
        config.assistant.intent_model = model.clone();
        assert_eq!(config.intent_model_path(), model);
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_provider_override_picks_default_model() {
        let config = AppConfig::default();
        let overridden =
            config.with_overrides(None, None, Some("groq".into()), None, None, false, false);
        assert_eq!(overridden.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_vision_provider_falls_back_to_answering_provider() {
        let mut config = AppConfig::default();
        assert_eq!(config.vision_provider(), "ollama");
        config.assistant.vision_provider = Some("openai".into());
        assert_eq!(config.vision_provider(), "openai");
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: groq
  providers:
    groq:
      apiKeyEnv: MY_GROQ_KEY
      model: llama-3.1-8b-instant
      endpoint: https://api.groq.com/openai
    ollama:
      endpoint: http://gpu-box:11434
      model: llama3.2
assistant:
  collection: reports
  visionProvider: ollama
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.provider, "groq");
        assert_eq!(merged.model, "llama-3.1-8b-instant");
        assert_eq!(merged.assistant.collection, "reports");
        assert_eq!(merged.vision_model(), "llava");
        assert_eq!(merged.vision_provider(), "ollama");
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(
            merged.resolve_endpoint("ollama"),
            Some("http://gpu-box:11434".to_string())
        );
        assert_eq!(
            merged.resolve_endpoint("groq"),
            Some("https://api.groq.com/openai".to_string())
        );
    }

    #[test]
    fn test_merge_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "llm: [not, a, map").unwrap();
        assert!(AppConfig::default().merge_yaml(&path).is_err());
    }

    #[test]
    fn test_vision_model_follows_vision_provider() {
        let mut config = AppConfig::default();
        config.provider = "groq".to_string();
        assert_eq!(
            config.vision_model(),
            "meta-llama/llama-4-scout-17b-16e-instruct"
        );

        config.assistant.vision_provider = Some("openai".into());
        assert_eq!(config.vision_model(), "gpt-4o-mini");

        config.assistant.vision_model = Some("gpt-4o".into());
        assert_eq!(config.vision_model(), "gpt-4o");
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.provider = "groq".to_string();
        config.api_key = Some("sk-test".to_string());
        assert_eq!(config.resolve_api_key("groq"), Some("sk-test".to_string()));
    }

    #[test]
    fn test_explicit_api_key_stays_with_answering_provider() {
        let mut config = AppConfig::default();
        config.provider = "groq".to_string();
        config.api_key = Some("gsk-answering".to_string());
        config.llm = Some(LlmConfig {
            active_provider: "groq".to_string(),
            providers: [(
                "openai".to_string(),
                ProviderConfig::OpenAI {
                    api_key_env: "SAGE_TEST_VISION_KEY_UNSET".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    endpoint: None,
                },
            )]
            .into_iter()
            .collect(),
        });

        let vision_key = config.resolve_api_key("openai");
        assert_ne!(vision_key, Some("gsk-answering".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_keyed_provider_with_explicit_key() {
        let mut config = AppConfig::default();
        config.provider = "groq".to_string();
        config.api_key = Some("gsk-test".to_string());
        assert!(config.validate().is_ok());
    }
}
