//! Ask command handler.
//!
//! Builds the controller from configuration and answers one question.

use clap::Args;
use sage_agents::build_controller;
use sage_agents::controller::{EMPTY_QUERY, TEMPORARILY_UNAVAILABLE};
use sage_core::{config::AppConfig, AppError, AppResult};

/// Answer a question
#[derive(Args, Debug, Default)]
pub struct AskCommand {
    /// The question to answer
    #[arg(short, long)]
    pub query: Option<String>,

    /// Output intent, answer and sources as JSON
    #[arg(long)]
    pub json: bool,

    /// Print a fixed message instead of failing when a service is down
    #[arg(long)]
    pub fail_soft: bool,
}

impl AskCommand {
    pub fn from_query(query: Option<String>) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        if self.fail_soft {
            let answer = self.answer_fail_soft(config).await?;
            if self.json {
                println!("{}", serde_json::json!({ "answer": answer }));
            } else {
                println!("{}", answer);
            }
            return Ok(());
        }

        let query = self
            .query
            .as_deref()
            .ok_or_else(|| AppError::Validation("No query provided (use --query)".to_string()))?;

        config.validate()?;
        let controller = build_controller(config).await?;

        if self.json {
            let routed = controller.route(query).await?;
            println!("{}", serde_json::to_string_pretty(&routed)?);
        } else {
            println!("{}", controller.handle_query(query).await?);
        }

        Ok(())
    }

    /// Configuration errors still fail; an assistant that cannot be built
    /// because a collaborator is unavailable reports the fixed reply.
    async fn answer_fail_soft(&self, config: &AppConfig) -> AppResult<String> {
        let Some(query) = self.query.as_deref() else {
            return Ok(EMPTY_QUERY.to_string());
        };

        config.validate()?;
        match build_controller(config).await {
            Ok(controller) => controller.respond(query).await,
            Err(e) if e.is_collaborator_failure() => {
                tracing::error!("Assistant unavailable: {}", e);
                Ok(TEMPORARILY_UNAVAILABLE.to_string())
            }
            Err(e) => Err(e),
        }
    }
}
