//! Docket Normalizer
//!
//! Produces one canonical plain-text artifact per downloaded document,
//! dispatching on the record's source format tag:
//!
//! - binary documents go to the external parsing service
//! - plain text passes through with line-ending normalization only
//! - structured markup goes through tolerant text extraction
//!
//! An empty or whitespace-only result is a failure, not a silent success:
//! an empty canonical text would make downstream extraction vacuously
//! "succeed" with no findings.

#![warn(missing_docs)]

pub mod markup;

use docket_domain::traits::{DocumentParser, Manifest, UpsertOutcome};
use docket_domain::{reason, unix_now, DocumentRecord, SourceFormat, Stage};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use markup::markup_to_text;

/// Errors that abort a normalize run (per-document issues are recorded in
/// the manifest instead)
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Manifest (storage) error.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Filesystem error writing a canonical artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters for one normalize run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Documents normalized.
    pub normalized: usize,
    /// Documents recorded as failed.
    pub failed: usize,
}

impl NormalizeStats {
    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!("normalized {}, failed {}", self.normalized, self.failed)
    }
}

/// Converts each downloaded document into canonical plain text
pub struct Normalizer<P, M> {
    parser: Arc<P>,
    manifest: Arc<Mutex<M>>,
    data_dir: PathBuf,
}

impl<P, M> Normalizer<P, M>
where
    P: DocumentParser,
    P::Error: std::fmt::Display,
    M: Manifest,
    M::Error: std::fmt::Display,
{
    /// Create a normalizer writing canonical text under `data_dir`.
    pub fn new(parser: P, manifest: Arc<Mutex<M>>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            parser: Arc::new(parser),
            manifest,
            data_dir: data_dir.into(),
        }
    }

    /// Normalize a worklist of downloaded documents.
    ///
    /// One document's failure never halts the others.
    pub async fn run(&self, records: Vec<DocumentRecord>) -> Result<NormalizeStats, NormalizeError> {
        info!(count = records.len(), "starting normalize run");

        let mut stats = NormalizeStats::default();
        for record in records {
            match self.normalize_one(&record).await? {
                true => stats.normalized += 1,
                false => stats.failed += 1,
            }
        }

        info!("normalize run complete: {}", stats.summary());
        Ok(stats)
    }

    /// Normalize one document. Returns `true` on success, `false` when the
    /// document was recorded as failed.
    async fn normalize_one(&self, record: &DocumentRecord) -> Result<bool, NormalizeError> {
        let Some(raw_path) = record.raw_path.as_deref() else {
            self.fail(record, reason::with_detail(reason::PARSE_FAILED, "no raw artifact path"))?;
            return Ok(false);
        };

        let bytes = match tokio::fs::read(raw_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail(
                    record,
                    reason::with_detail(reason::PARSE_FAILED, format!("cannot read raw artifact: {}", e)),
                )?;
                return Ok(false);
            }
        };

        let text = match record.format {
            SourceFormat::BinaryDocument => match self.parser.parse(&bytes).await {
                Ok(text) => text,
                Err(e) => {
                    // Parsing failures are usually deterministic; no retry.
                    self.fail(record, reason::with_detail(reason::PARSE_FAILED, e.to_string()))?;
                    return Ok(false);
                }
            },
            SourceFormat::PlainText => String::from_utf8_lossy(&bytes).replace("\r\n", "\n"),
            SourceFormat::StructuredMarkup => markup_to_text(&String::from_utf8_lossy(&bytes)),
        };

        if text.trim().is_empty() {
            self.fail(record, reason::EMPTY_TEXT.to_string())?;
            return Ok(false);
        }

        let path = self.text_path(record);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, text.as_bytes()).await?;

        let mut done = record.clone();
        done.stage = Stage::Normalized;
        done.text_path = Some(path.to_string_lossy().into_owned());
        done.normalized_at = Some(unix_now());
        self.upsert(&done)?;

        debug!(id = done.id.as_str(), chars = text.len(), "normalized");
        Ok(true)
    }

    fn text_path(&self, record: &DocumentRecord) -> PathBuf {
        use chrono::Datelike;
        self.data_dir
            .join("text")
            .join(record.era.as_str())
            .join(record.date.year().to_string())
            .join(format!("digest_{}.txt", record.date.format("%Y-%m-%d")))
    }

    fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, NormalizeError> {
        self.manifest
            .lock()
            .map_err(|e| NormalizeError::Manifest(format!("lock poisoned: {}", e)))?
            .upsert(record)
            .map_err(|e| NormalizeError::Manifest(e.to_string()))
    }

    fn fail(&self, record: &DocumentRecord, why: String) -> Result<(), NormalizeError> {
        warn!(id = record.id.as_str(), reason = %why, "normalize failed");
        self.manifest
            .lock()
            .map_err(|e| NormalizeError::Manifest(format!("lock poisoned: {}", e)))?
            .mark_failed(&record.id, Stage::Downloaded, &why)
            .map_err(|e| NormalizeError::Manifest(e.to_string()))?;
        Ok(())
    }
}
