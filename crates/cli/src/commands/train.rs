//! Train command handler.

use clap::Args;
use sage_agents::intent::load_training_csv;
use sage_agents::TfidfIntentClassifier;
use sage_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Train the intent classifier
#[derive(Args, Debug)]
pub struct TrainCommand {
    /// CSV file with `text,label` columns
    #[arg(short, long)]
    pub data: PathBuf,

    /// Where to write the model (default: .sage/models/intent_model.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl TrainCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Training intent classifier from {:?}", self.data);

        let set = load_training_csv(&self.data)?;
        if set.is_empty() {
            return Err(AppError::Validation(format!(
                "No training rows in {:?}",
                self.data
            )));
        }

        let classifier = TfidfIntentClassifier::train(&set.texts, &set.labels)?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.intent_model_path());
        classifier.save(&output)?;

        println!(
            "Trained on {} examples ({} labels: {}, {} features) -> {}",
            set.len(),
            classifier.labels().len(),
            classifier.labels().join(", "),
            classifier.feature_count(),
            output.display()
        );

        Ok(())
    }
}
