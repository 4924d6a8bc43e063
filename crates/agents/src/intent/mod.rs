//! Intent classification.
//!
//! The controller treats a classifier's label as untrusted input: anything
//! outside the known set maps to [`Intent::Unrecognized`].

pub mod dataset;
pub mod tfidf;

pub use dataset::{load_training_csv, TrainingSet};
pub use tfidf::TfidfIntentClassifier;

use sage_core::AppResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing category of a user question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Fact,
    Summary,
    Analysis,
    Visual,
    Unrecognized,
}

impl Intent {
    /// Map a raw classifier label to an intent. Matching is exact and
    /// case-sensitive.
    pub fn from_label(label: &str) -> Self {
        match label {
            "fact" => Self::Fact,
            "summary" => Self::Summary,
            "analysis" => Self::Analysis,
            "visual" => Self::Visual,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Summary => "summary",
            Self::Analysis => "analysis",
            Self::Visual => "visual",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a free-text query to a label.
///
/// The label set is whatever the model was trained on; callers must not
/// assume it is closed.
#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Name of this classifier for logging.
    fn name(&self) -> &str;

    /// Predict the label for a query.
    async fn predict(&self, query: &str) -> AppResult<String>;
}
