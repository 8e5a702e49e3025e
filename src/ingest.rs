//! File, upload and directory ingestion.
//!
//! Wraps the core [`Ingestor`] with text extraction and filesystem
//! traversal:
//!
//! - [`ingest_file`]: one file on disk. Title is the file stem, source is
//!   the path as given.
//! - [`ingest_upload`]: raw PDF bytes under a synthetic
//!   `uploaded_<unix millis>.pdf` name used as both title and source.
//! - [`ingest_directory`]: every file in a directory (non-recursive) whose
//!   extension is listed in `[ingest].extensions`. Files are processed in
//!   sorted order with bounded concurrency, and each produces its own
//!   [`FileOutcome`]; one file failing never affects another's result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use lexrag_core::error::IngestionError;
use lexrag_core::ingest::{DocumentInput, IngestReport, Ingestor};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::extract::{extension_of, extract_bytes, extract_file, ExtractError, ExtractedDocument};

/// Failure ingesting a single file.
#[derive(Error, Debug)]
pub enum FileIngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Ingest(#[from] IngestionError),

    #[error("extraction task failed: {0}")]
    Task(String),
}

impl FileIngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            FileIngestError::Extract(e) => e.kind(),
            FileIngestError::Ingest(e) => e.kind(),
            FileIngestError::Task(_) => "internal",
        }
    }

    /// Whether the failure lies with the submitted file rather than a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FileIngestError::Extract(_) | FileIngestError::Ingest(IngestionError::NoContent { .. })
        )
    }
}

/// Machine-readable failure attached to a [`FileOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    pub kind: String,
    pub message: String,
}

impl From<&FileIngestError> for FailureDetail {
    fn from(err: &FileIngestError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Outcome {
    #[serde(rename = "result")]
    Indexed(IngestReport),
    #[serde(rename = "error")]
    Failed(FailureDetail),
}

/// Result of ingesting one file of a directory.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    /// File name relative to the directory.
    pub filename: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Indexed(_))
    }
}

/// Run extraction off the async runtime; PDF parsing is CPU-bound.
async fn extract_blocking<F>(f: F) -> Result<ExtractedDocument, FileIngestError>
where
    F: FnOnce() -> Result<ExtractedDocument, ExtractError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FileIngestError::Task(e.to_string()))?
        .map_err(FileIngestError::from)
}

/// Extract and ingest one file.
pub async fn ingest_file(ingestor: &Ingestor, path: &Path) -> Result<IngestReport, FileIngestError> {
    let owned = path.to_path_buf();
    let doc = extract_blocking(move || extract_file(&owned)).await?;

    let source_id = path.display().to_string();
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&source_id)
        .to_string();

    info!(source = %source_id, pages = doc.page_count, "extracted document");
    let report = ingestor
        .ingest(&DocumentInput {
            source_id: &source_id,
            title: &title,
            full_text: &doc.text,
            page_count: doc.page_count,
        })
        .await
        .inspect_err(log_ingestion_failure)?;
    Ok(report)
}

fn log_ingestion_failure(err: &IngestionError) {
    warn!(
        source = err.source_id(),
        ordinal = ?err.ordinal(),
        kind = err.kind(),
        retryable = err.is_retryable(),
        "document ingestion failed"
    );
}

/// Synthetic name for an uploaded PDF.
pub fn upload_name() -> String {
    format!("uploaded_{}.pdf", chrono::Utc::now().timestamp_millis())
}

/// Ingest an uploaded PDF from raw bytes.
pub async fn ingest_upload(ingestor: &Ingestor, bytes: Vec<u8>) -> Result<IngestReport, FileIngestError> {
    let name = upload_name();
    let doc = extract_blocking(move || extract_bytes(&bytes, "pdf")).await?;

    info!(source = %name, pages = doc.page_count, "extracted upload");
    let report = ingestor
        .ingest(&DocumentInput {
            source_id: &name,
            title: &name,
            full_text: &doc.text,
            page_count: doc.page_count,
        })
        .await
        .inspect_err(log_ingestion_failure)?;
    Ok(report)
}

/// Files directly inside `dir` whose extension is in `extensions`, sorted by name.
pub fn list_ingestable(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = extension_of(entry.path());
        if extensions.iter().any(|e| e == &ext) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Ingest every matching file in `dir`, one outcome per file in sorted order.
///
/// Fails only if the directory itself cannot be read.
pub async fn ingest_directory(
    ingestor: &Ingestor,
    dir: &Path,
    extensions: &[String],
    concurrency: usize,
) -> Result<Vec<FileOutcome>> {
    let files = list_ingestable(dir, extensions)?;
    info!(dir = %dir.display(), files = files.len(), "ingesting directory");

    let outcomes: Vec<FileOutcome> = stream::iter(files)
        .map(|path| async move {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let outcome = match ingest_file(ingestor, &path).await {
                Ok(report) => Outcome::Indexed(report),
                Err(e) => {
                    warn!(file = %filename, kind = e.kind(), error = %e, "file ingestion failed");
                    Outcome::Failed(FailureDetail::from(&e))
                }
            };
            FileOutcome { filename, outcome }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(
        dir = %dir.display(),
        indexed = outcomes.len() - failed,
        failed,
        "directory ingestion finished"
    );
    Ok(outcomes)
}
