//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and
//! infrastructure. Implementations live in other crates: the manifest store
//! in docket-manifest, the service clients in docket-services.

use crate::era::Era;
use crate::id::DocumentId;
use crate::record::DocumentRecord;
use crate::stage::Stage;
use std::collections::BTreeMap;

/// Outcome of a manifest upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record with this id existed; it was inserted.
    Inserted,
    /// An existing record was merged forward.
    Updated,
    /// The incoming record carried nothing new.
    Unchanged,
    /// The incoming record would have moved the stored one backward; the
    /// call was a no-op and the conflict was logged.
    Conflict,
}

/// Query criteria for retrieving document records.
#[derive(Debug, Clone, Default)]
pub struct StageFilter {
    /// Filter by current stage.
    pub stage: Option<Stage>,

    /// Filter by era.
    pub era: Option<Era>,

    /// Maximum results to return.
    pub limit: Option<usize>,
}

impl StageFilter {
    /// Filter for all records at a given stage.
    pub fn at(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }
}

/// Per-stage and per-failure-reason counts over the whole manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    /// Record count per stage label.
    pub by_stage: BTreeMap<String, usize>,

    /// Failed-record count per reason code.
    pub by_failure: BTreeMap<String, usize>,
}

impl ManifestSummary {
    /// Total records across all stages.
    pub fn total(&self) -> usize {
        self.by_stage.values().sum()
    }
}

/// Trait for the durable document-state store
///
/// Implemented by the infrastructure layer (docket-manifest). Every
/// mutation must be durably persisted before the call returns; all merges
/// are append-progress-only so concurrent stage writers never revert one
/// another's completions.
pub trait Manifest {
    /// Error type for store operations
    type Error;

    /// Insert or forward-merge a record. Backward transitions are no-ops
    /// reported as [`UpsertOutcome::Conflict`].
    fn upsert(&mut self, record: &DocumentRecord) -> Result<UpsertOutcome, Self::Error>;

    /// Get a record by id.
    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, Self::Error>;

    /// Query records matching the filter, ordered by date ascending.
    fn query(&self, filter: &StageFilter) -> Result<Vec<DocumentRecord>, Self::Error>;

    /// Transition a record to `Failed`, recording the stage it held and a
    /// human-readable reason. Prior artifacts are untouched.
    fn mark_failed(&mut self, id: &DocumentId, at: Stage, reason: &str)
        -> Result<UpsertOutcome, Self::Error>;

    /// Increment the retry counter for a retryable stage and return the new
    /// count. Does not advance the stage.
    fn record_retry(&mut self, id: &DocumentId, at: Stage) -> Result<u32, Self::Error>;

    /// Counts per stage and failure reason, for status output and the
    /// end-of-run summary.
    fn summary(&self) -> Result<ManifestSummary, Self::Error>;
}

/// Trait for the external document-parsing service (binary document → text)
///
/// Implemented by the infrastructure layer (docket-services). The service
/// is a black box: no contract on internal quality.
#[allow(async_fn_in_trait)]
pub trait DocumentParser {
    /// Error type for parsing operations
    type Error;

    /// Convert raw document bytes to plain text.
    async fn parse(&self, bytes: &[u8]) -> Result<String, Self::Error>;
}

/// Trait for the external structured-extraction service
///
/// Implemented by the infrastructure layer (docket-services). The service
/// returns a candidate payload; conformance is validated by the caller.
#[allow(async_fn_in_trait)]
pub trait ExtractionProvider {
    /// Error type for extraction operations
    type Error;

    /// Run one extraction call and return the raw response text.
    async fn extract(&self, system: &str, prompt: &str) -> Result<String, Self::Error>;

    /// Identifier of the backing service/model, recorded for provenance.
    fn model_name(&self) -> &str;

    /// Whether retrying after this error can plausibly succeed. Transient
    /// errors consume the stage's retry budget; the rest fail fast.
    fn is_transient(error: &Self::Error) -> bool {
        let _ = error;
        true
    }
}
