//! Labelled training data for the intent classifier.

use csv::ReaderBuilder;
use sage_core::{AppError, AppResult};
use serde::Deserialize;
use std::path::Path;

/// Parallel texts and labels read from a training file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub texts: Vec<String>,
    pub labels: Vec<String>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    text: String,
    label: String,
}

/// Load a CSV file with a `text,label` header.
///
/// Extra columns are ignored. Labels are trimmed; rows with an empty text
/// or label are skipped with a warning.
pub fn load_training_csv(path: &Path) -> AppResult<TrainingSet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Fields)
        .from_path(path)
        .map_err(|e| AppError::Validation(format!("Failed to open {:?}: {}", path, e)))?;

    let mut set = TrainingSet::default();
    for (row_num, result) in reader.deserialize::<Row>().enumerate() {
        let row = result.map_err(|e| {
            AppError::Validation(format!(
                "Failed to parse {:?} row {}: {}",
                path,
                row_num + 1,
                e
            ))
        })?;

        if row.text.is_empty() || row.label.is_empty() {
            tracing::warn!("Skipping row {} of {:?}: empty field", row_num + 1, path);
            continue;
        }

        set.texts.push(row.text);
        set.labels.push(row.label);
    }

    tracing::debug!("Loaded {} training examples from {:?}", set.len(), path);
    Ok(set)
}
