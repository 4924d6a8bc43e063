//! Knowledge base configuration management.

use crate::types::KnowledgeBaseConfig;
use sage_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Load knowledge base configuration.
///
/// Loads from `.sage/knowledge/<base>/config.yaml` if it exists,
/// otherwise creates a default config with the provided base name.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    let config_path = get_config_path(workspace, base_name);

    if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        // Ensure name matches
        config.name = base_name.to_string();

        tracing::debug!("Loaded knowledge base config for '{}'", base_name);
        Ok(config)
    } else {
        let config = KnowledgeBaseConfig {
            name: base_name.to_string(),
            ..Default::default()
        };

        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        Ok(config)
    }
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml)?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(".sage").join("knowledge").join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Get the LanceDB index path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.lance")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "knowledge_base").unwrap();

        assert_eq!(config.name, "knowledge_base");
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.embedding_dim, 384);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeBaseConfig {
            name: "reports".to_string(),
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            embedding_dim: 768,
            endpoint: Some("http://localhost:11434".to_string()),
        };

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path(), "reports").unwrap();
        assert_eq!(loaded.provider, "ollama");
        assert_eq!(loaded.embedding_dim, 768);
        assert_eq!(loaded.endpoint.as_deref(), Some("http://localhost:11434"));
    }

    #[test]
    fn test_name_follows_directory() {
        let temp = TempDir::new().unwrap();
        let dir = get_base_dir(temp.path(), "renamed");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.yaml"),
            "name: original\nprovider: trigram\nmodel: trigram-v1\n",
        )
        .unwrap();

        let loaded = load_config(temp.path(), "renamed").unwrap();
        assert_eq!(loaded.name, "renamed");
    }

    #[test]
    fn test_paths() {
        let ws = Path::new("/ws");
        assert_eq!(
            get_index_path(ws, "kb"),
            PathBuf::from("/ws/.sage/knowledge/kb/index.lance")
        );
        assert_eq!(
            get_config_path(ws, "kb"),
            PathBuf::from("/ws/.sage/knowledge/kb/config.yaml")
        );
    }
}
