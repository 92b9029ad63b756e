//! Document records
//!
//! One record per source document, created at discovery and never deleted.
//! The record is the pipeline's audit trail: artifact paths and stage
//! timestamps accumulate, and a failure keeps everything the document had
//! already earned.

use crate::era::{Era, SourceFormat};
use crate::id::DocumentId;
use crate::stage::Stage;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One source document tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable identifier, derived from era + date.
    pub id: DocumentId,

    /// Canonical source location.
    pub url: String,

    /// Publication era.
    pub era: Era,

    /// Publication date.
    pub date: NaiveDate,

    /// Source format, fixed by the era at registration.
    pub format: SourceFormat,

    /// Current stage.
    pub stage: Stage,

    /// The stage the document held when it failed (set only with
    /// `stage == Failed`).
    pub failed_stage: Option<Stage>,

    /// Reason for the most recent failure, `<code>[: detail]`.
    pub last_error: Option<String>,

    /// Raw bytes artifact path (set once downloaded).
    pub raw_path: Option<String>,

    /// Canonical text artifact path (set once normalized).
    pub text_path: Option<String>,

    /// Extraction artifact path (set once extracted).
    pub artifact_path: Option<String>,

    /// Raw artifact size in bytes.
    pub byte_size: Option<u64>,

    /// Unix seconds at download completion.
    pub downloaded_at: Option<i64>,

    /// Unix seconds at normalization completion.
    pub normalized_at: Option<i64>,

    /// Unix seconds at extraction completion.
    pub extracted_at: Option<i64>,

    /// Unix seconds at consolidation.
    pub consolidated_at: Option<i64>,

    /// Fetch retries spent on this document.
    pub fetch_retries: u32,

    /// Extraction-service retries spent on this document.
    pub extract_retries: u32,
}

impl DocumentRecord {
    /// Create a fresh record at stage `Registered`.
    pub fn register(era: Era, date: NaiveDate, url: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(era, date),
            url: url.into(),
            era,
            date,
            format: era.source_format(),
            stage: Stage::Registered,
            failed_stage: None,
            last_error: None,
            raw_path: None,
            text_path: None,
            artifact_path: None,
            byte_size: None,
            downloaded_at: None,
            normalized_at: None,
            extracted_at: None,
            consolidated_at: None,
            fetch_retries: 0,
            extract_retries: 0,
        }
    }

    /// Rank used for monotonic stage comparison.
    ///
    /// A `Failed` record ranks at the stage it failed from, so a successful
    /// retry (which would land one stage higher) is forward progress, while
    /// re-asserting an older stage is a regression.
    pub fn effective_rank(&self) -> u8 {
        match self.stage.rank() {
            Some(r) => r,
            None => self
                .failed_stage
                .and_then(|s| s.rank())
                .unwrap_or(0),
        }
    }

    /// Whether an incoming record would move this one backward.
    pub fn would_regress(&self, incoming: &DocumentRecord) -> bool {
        incoming.effective_rank() < self.effective_rank()
    }
}
