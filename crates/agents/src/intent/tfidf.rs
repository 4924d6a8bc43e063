//! TF-IDF nearest-centroid intent classifier.
//!
//! Queries are vectorised over word unigrams and bigrams, weighted by
//! smoothed inverse document frequency and L2-normalised. Each label is
//! represented by the normalised mean of its training vectors, and a query
//! takes the label of the most cosine-similar centroid.

use super::{Intent, IntentClassifier};
use sage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Vocabulary cap.
pub const MAX_FEATURES: usize = 5000;

const MODEL_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    version: u32,
    features: Vec<String>,
    idf: Vec<f32>,
    centroids: BTreeMap<String, Vec<f32>>,
}

/// A trained TF-IDF centroid classifier.
#[derive(Debug, Clone)]
pub struct TfidfIntentClassifier {
    vocabulary: HashMap<String, usize>,
    features: Vec<String>,
    idf: Vec<f32>,
    centroids: BTreeMap<String, Vec<f32>>,
}

/// Lower-cased word tokens of at least two word characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by space-joined bigrams.
fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let bigrams: Vec<String> = tokens
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect();
    let mut all = tokens;
    all.extend(bigrams);
    all
}

fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

impl TfidfIntentClassifier {
    /// Fit a classifier on parallel texts and labels.
    pub fn train(texts: &[String], labels: &[String]) -> AppResult<Self> {
        if texts.len() != labels.len() {
            return Err(AppError::Validation(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        if texts.is_empty() {
            return Err(AppError::Validation(
                "Cannot train on an empty dataset".to_string(),
            ));
        }

        let documents: Vec<Vec<String>> = texts.iter().map(|t| terms(t)).collect();

        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &documents {
            for term in doc {
                *corpus_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        // Most frequent terms win; ties break alphabetically.
        let mut ranked: Vec<(&str, usize)> = corpus_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(MAX_FEATURES);

        let mut features: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        if features.is_empty() {
            return Err(AppError::Classification(
                "Training texts contain no usable tokens".to_string(),
            ));
        }
        features.sort();

        let vocabulary: HashMap<String, usize> = features
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let mut df = vec![0usize; features.len()];
        for doc in &documents {
            let mut seen = vec![false; features.len()];
            for term in doc {
                if let Some(&i) = vocabulary.get(term) {
                    if !seen[i] {
                        seen[i] = true;
                        df[i] += 1;
                    }
                }
            }
        }

        let n = documents.len() as f32;
        let idf: Vec<f32> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0)
            .collect();

        let mut classifier = Self {
            vocabulary,
            features,
            idf,
            centroids: BTreeMap::new(),
        };

        let mut sums: BTreeMap<String, (Vec<f32>, usize)> = BTreeMap::new();
        for (doc, label) in documents.iter().zip(labels) {
            let vector = classifier.vectorize_terms(doc);
            let entry = sums
                .entry(label.clone())
                .or_insert_with(|| (vec![0.0; classifier.features.len()], 0));
            for (acc, x) in entry.0.iter_mut().zip(&vector) {
                *acc += x;
            }
            entry.1 += 1;
        }

        for (label, (mut sum, count)) in sums {
            for x in sum.iter_mut() {
                *x /= count as f32;
            }
            l2_normalize(&mut sum);
            classifier.centroids.insert(label, sum);
        }

        tracing::info!(
            "Trained intent model: {} examples, {} features, labels [{}]",
            texts.len(),
            classifier.features.len(),
            classifier.labels().join(", ")
        );

        Ok(classifier)
    }

    fn vectorize_terms(&self, terms: &[String]) -> Vec<f32> {
        let mut v = vec![0.0f32; self.features.len()];
        for term in terms {
            if let Some(&i) = self.vocabulary.get(term) {
                v[i] += 1.0;
            }
        }
        for (x, idf) in v.iter_mut().zip(&self.idf) {
            *x *= idf;
        }
        l2_normalize(&mut v);
        v
    }

    /// Labels known to the model, sorted.
    pub fn labels(&self) -> Vec<&str> {
        self.centroids.keys().map(String::as_str).collect()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Best label and its cosine score; `None` when the query shares no
    /// vocabulary with the model.
    pub fn predict_with_score(&self, query: &str) -> Option<(&str, f32)> {
        let v = self.vectorize_terms(&terms(query));
        if v.iter().all(|&x| x == 0.0) {
            return None;
        }

        let mut best: Option<(&str, f32)> = None;
        for (label, centroid) in &self.centroids {
            let score: f32 = v.iter().zip(centroid).map(|(a, b)| a * b).sum();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((label.as_str(), score));
            }
        }
        best
    }

    /// Write the model as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = ModelFile {
            version: MODEL_VERSION,
            features: self.features.clone(),
            idf: self.idf.clone(),
            centroids: self.centroids.clone(),
        };
        fs::write(path, serde_json::to_string(&file)?)?;

        tracing::info!("Saved intent model to {:?}", path);
        Ok(())
    }

    /// Load a model written by [`save`](Self::save).
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Classification(format!("Failed to read intent model {:?}: {}", path, e))
        })?;

        let file: ModelFile = serde_json::from_str(&content).map_err(|e| {
            AppError::Classification(format!("Malformed intent model {:?}: {}", path, e))
        })?;

        if file.version != MODEL_VERSION {
            return Err(AppError::Classification(format!(
                "Unsupported intent model version {} in {:?}",
                file.version, path
            )));
        }
        if file.features.len() != file.idf.len()
            || file.centroids.values().any(|c| c.len() != file.features.len())
        {
            return Err(AppError::Classification(format!(
                "Intent model {:?} has inconsistent dimensions",
                path
            )));
        }

        let vocabulary = file
            .features
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        tracing::debug!(
            "Loaded intent model from {:?} ({} features)",
            path,
            file.features.len()
        );

        Ok(Self {
            vocabulary,
            features: file.features,
            idf: file.idf,
            centroids: file.centroids,
        })
    }
}

#[async_trait::async_trait]
impl IntentClassifier for TfidfIntentClassifier {
    fn name(&self) -> &str {
        "tfidf-centroid"
    }

    async fn predict(&self, query: &str) -> AppResult<String> {
        Ok(match self.predict_with_score(query) {
            Some((label, score)) => {
                tracing::debug!("Predicted '{}' (score {:.3})", label, score);
                label.to_string()
            }
            None => Intent::Unrecognized.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn training_data() -> (Vec<String>, Vec<String>) {
        let rows = [
            ("What was the net profit in 2023?", "fact"),
            ("How many employees does the company have?", "fact"),
            ("When was the company founded?", "fact"),
            ("Summarize the annual report", "summary"),
            ("Give me a summary of the findings", "summary"),
            ("Briefly summarize the key points", "summary"),
            ("What is the revenue trend?", "analysis"),
            ("Analyze the growth of operating costs", "analysis"),
            ("Compare revenue trend across regions", "analysis"),
            ("Describe the chart in Figure 2", "visual"),
            ("What does the graph show?", "visual"),
            ("Explain the diagram on page 4", "visual"),
        ];
        rows.iter()
            .map(|(t, l)| (t.to_string(), l.to_string()))
            .unzip()
    }

    fn trained() -> TfidfIntentClassifier {
        let (texts, labels) = training_data();
        TfidfIntentClassifier::train(&texts, &labels).unwrap()
    }

    #[test]
    fn test_terms_include_bigrams() {
        assert_eq!(
            terms("Revenue trend, a Q1 view"),
            vec!["revenue", "trend", "q1", "view", "revenue trend", "trend q1", "q1 view"]
        );
    }

    #[tokio::test]
    async fn test_predicts_training_intents() {
        let clf = trained();
        assert_eq!(clf.labels(), vec!["analysis", "fact", "summary", "visual"]);
        assert_eq!(clf.predict("Describe the chart").await.unwrap(), "visual");
        assert_eq!(clf.predict("summarize the report").await.unwrap(), "summary");
        assert_eq!(clf.predict("revenue trend by region").await.unwrap(), "analysis");
    }

    #[tokio::test]
    async fn test_out_of_vocabulary_is_unrecognized() {
        let clf = trained();
        assert_eq!(clf.predict("zzz qqq").await.unwrap(), "unrecognized");
        assert_eq!(clf.predict("").await.unwrap(), "unrecognized");
    }

    #[tokio::test]
    async fn test_prediction_is_deterministic() {
        let clf = trained();
        let first = clf.predict("What does the graph show?").await.unwrap();
        for _ in 0..5 {
            assert_eq!(clf.predict("What does the graph show?").await.unwrap(), first);
        }
    }

    #[test]
    fn test_feature_cap() {
        let texts: Vec<String> = (0..3000)
            .map(|i| format!("word{} other{}", i, i))
            .collect();
        let labels = vec!["fact".to_string(); texts.len()];
        let clf = TfidfIntentClassifier::train(&texts, &labels).unwrap();
        assert_eq!(clf.feature_count(), MAX_FEATURES);
    }

    #[test]
    fn test_train_rejects_bad_input() {
        assert!(matches!(
            TfidfIntentClassifier::train(&["a b".to_string()], &[]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            TfidfIntentClassifier::train(&[], &[]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            TfidfIntentClassifier::train(&["a ? b".to_string()], &["fact".to_string()]),
            Err(AppError::Classification(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("models").join("intent_model.json");
        let clf = trained();
        clf.save(&path).unwrap();

        let loaded = TfidfIntentClassifier::load(&path).unwrap();
        assert_eq!(loaded.labels(), clf.labels());
        for query in ["Describe the chart", "net profit", "summarize findings"] {
            assert_eq!(
                loaded.predict(query).await.unwrap(),
                clf.predict(query).await.unwrap()
            );
        }
    }

    #[test]
    fn test_load_missing_or_malformed() {
        let temp = TempDir::new().unwrap();
        let missing = TfidfIntentClassifier::load(&temp.path().join("none.json"));
        assert!(matches!(missing, Err(AppError::Classification(_))));

        let path = temp.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TfidfIntentClassifier::load(&path),
            Err(AppError::Classification(_))
        ));
    }
}
