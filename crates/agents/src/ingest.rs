//! Knowledge base population from text and image directories.

use crate::vision::{VisionCaptioner, IMAGE_ANALYSIS_FAILED, IMAGE_MISSING, IMAGE_UNREADABLE};
use sage_core::{AppError, AppResult};
use sage_knowledge::parser::read_text_file;
use sage_knowledge::{split_documents, ContentType, Metadata, RetrievalService, SOURCE_KEY, TYPE_KEY};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Counts from an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    /// Text files read
    pub text_files: u32,

    /// Text documents stored
    pub documents: u32,

    /// Image captions stored
    pub images: u32,

    /// Files skipped (unreadable text, failed captions)
    pub skipped: u32,

    pub duration_secs: f64,
}

impl IngestStats {
    pub fn merge(&mut self, other: &IngestStats) {
        self.text_files += other.text_files;
        self.documents += other.documents;
        self.images += other.images;
        self.skipped += other.skipped;
        self.duration_secs += other.duration_secs;
    }
}

/// Files directly inside `dir` (not recursive), sorted by name.
fn list_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::Validation(format!(
            "Not a directory: {:?}",
            dir
        )));
    }

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn metadata_for(path: &Path, doc_type: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(SOURCE_KEY.to_string(), path.display().to_string());
    metadata.insert(TYPE_KEY.to_string(), doc_type.to_string());
    metadata
}

/// Claim `path`'s stem for this run; `None` if another file already used it,
/// since ids derive from the stem alone.
fn claim_stem(stems: &mut HashSet<String>, path: &Path, stats: &mut IngestStats) -> Option<String> {
    let stem = file_stem(path);
    if stems.insert(stem.clone()) {
        Some(stem)
    } else {
        tracing::warn!("Skipping {:?}: another file with stem '{}' was already ingested", path, stem);
        stats.skipped += 1;
        None
    }
}

/// Store every `.txt`/`.md` file in `dir`, one document per blank-line
/// separated paragraph, with ids `<stem>_<n>`.
///
/// Files are taken in name order; a file whose stem was already used in
/// this run is skipped.
pub async fn ingest_text_dir(retrieval: &dyn RetrievalService, dir: &Path) -> AppResult<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();
    let mut stems = HashSet::new();

    for path in list_files(dir)? {
        if !ContentType::from_path(&path).is_text() {
            continue;
        }
        let Some(stem) = claim_stem(&mut stems, &path, &mut stats) else {
            continue;
        };

        let text = match read_text_file(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                stats.skipped += 1;
                continue;
            }
        };

        let documents = split_documents(&text);
        stats.text_files += 1;
        if documents.is_empty() {
            tracing::debug!("No content in {:?}", path);
            continue;
        }

        let ids: Vec<String> = (0..documents.len()).map(|i| format!("{}_{}", stem, i)).collect();
        let metadatas = vec![metadata_for(&path, "text"); documents.len()];

        retrieval.add_documents(&ids, &documents, &metadatas).await?;
        stats.documents += documents.len() as u32;
        tracing::info!("Ingested {} documents from {:?}", documents.len(), path);
    }

    stats.duration_secs = start.elapsed().as_secs_f64();
    Ok(stats)
}

/// Caption every image in `dir` and store the caption under `<stem>_img`.
///
/// Images whose caption comes back as a failure sentinel are skipped, as
/// are images whose stem was already used in this run.
pub async fn ingest_image_dir(
    retrieval: &dyn RetrievalService,
    captioner: &dyn VisionCaptioner,
    dir: &Path,
) -> AppResult<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();
    let mut stems = HashSet::new();

    for path in list_files(dir)? {
        if ContentType::from_path(&path) != ContentType::Image {
            continue;
        }
        let Some(stem) = claim_stem(&mut stems, &path, &mut stats) else {
            continue;
        };

        let source = path.display().to_string();
        let caption = captioner.describe_image(&source).await;
        if [IMAGE_MISSING, IMAGE_UNREADABLE, IMAGE_ANALYSIS_FAILED].contains(&caption.as_str()) {
            tracing::warn!("Skipping {}: {}", source, caption);
            stats.skipped += 1;
            continue;
        }

        retrieval
            .add_documents(
                &[format!("{}_img", stem)],
                &[caption],
                &[metadata_for(&path, "image")],
            )
            .await?;
        stats.images += 1;
        tracing::info!("Ingested image {}", source);
    }

    stats.duration_secs = start.elapsed().as_secs_f64();
    Ok(stats)
}
