//! Knowledge command handler.
//!
//! Populates, inspects and clears the assistant's knowledge base.

use clap::{Args, Subcommand};
use sage_agents::assistant::{build_captioner, open_knowledge_base};
use sage_agents::{ingest_image_dir, ingest_text_dir, IngestStats};
use sage_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Ingest text and image folders
    Ingest(KnowledgeIngestCommand),
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
    /// Remove every stored document
    Clean(KnowledgeCleanCommand),
}

/// Ingest text and image folders
#[derive(Args, Debug)]
pub struct KnowledgeIngestCommand {
    /// Folder of .txt/.md files
    #[arg(long)]
    pub text_dir: Option<PathBuf>,

    /// Folder of images to caption
    #[arg(long)]
    pub image_dir: Option<PathBuf>,

    /// Reset base before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeIngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if self.text_dir.is_none() && self.image_dir.is_none() {
            return Err(AppError::Validation(
                "Nothing to ingest (use --text-dir and/or --image-dir)".to_string(),
            ));
        }

        let base = open_knowledge_base(config).await?;
        tracing::info!("Ingesting into knowledge base '{}'", base.name());

        if self.reset {
            base.reset().await?;
        }

        let mut stats = IngestStats::default();
        if let Some(dir) = &self.text_dir {
            stats.merge(&ingest_text_dir(&base, dir).await?);
        }
        if let Some(dir) = &self.image_dir {
            let captioner = build_captioner(config)?;
            stats.merge(&ingest_image_dir(&base, &captioner, dir).await?);
        }

        if self.json {
            let output = serde_json::json!({
                "base": base.name(),
                "textFiles": stats.text_files,
                "documents": stats.documents,
                "images": stats.images,
                "skipped": stats.skipped,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} documents from {} text files and {} images ({} skipped) in {:.2}s",
                stats.documents, stats.text_files, stats.images, stats.skipped, stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Show knowledge base stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let stats = open_knowledge_base(config).await?.stats().await?;

        if self.json {
            let output = serde_json::json!({
                "base": stats.base_name,
                "provider": stats.provider,
                "model": stats.model,
                "documentsCount": stats.documents_count,
                "textCount": stats.text_count,
                "imageCount": stats.image_count,
                "dbSizeBytes": stats.db_size_bytes,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Embeddings: {} ({})", stats.provider, stats.model);
            println!("  Documents: {}", stats.documents_count);
            println!("  Text: {}", stats.text_count);
            println!("  Images: {}", stats.image_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
        }

        Ok(())
    }
}

/// Clean knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeCleanCommand {}

impl KnowledgeCleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = open_knowledge_base(config).await?;
        base.reset().await?;

        println!("Knowledge base '{}' cleaned", base.name());

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Ingest(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
            KnowledgeAction::Clean(cmd) => cmd.execute(config).await,
        }
    }
}
