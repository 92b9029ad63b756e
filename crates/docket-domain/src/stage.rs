//! Pipeline stages
//!
//! A document moves through the ordered sequence registered → downloaded →
//! normalized → extracted → consolidated. `failed` is terminal for the run
//! but ranks at the stage the document held when it failed, so a later
//! successful retry may still advance the record.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when parsing a stage label fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown stage: {0}")]
pub struct ParseStageError(pub String);

/// One step in a document's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Discovered by the source registry; nothing fetched yet.
    Registered,
    /// Raw bytes persisted to storage.
    Downloaded,
    /// Canonical plain-text artifact produced.
    Normalized,
    /// Validated extraction artifact persisted.
    Extracted,
    /// Folded into the consolidated dataset.
    Consolidated,
    /// Failed at some stage; the record keeps the failing stage and reason.
    Failed,
}

impl Stage {
    /// The completed stages in pipeline order (excludes `Failed`).
    pub const ORDERED: [Stage; 5] = [
        Stage::Registered,
        Stage::Downloaded,
        Stage::Normalized,
        Stage::Extracted,
        Stage::Consolidated,
    ];

    /// Position in the pipeline order. `Failed` has no rank of its own;
    /// see [`crate::DocumentRecord::effective_rank`].
    pub fn rank(&self) -> Option<u8> {
        match self {
            Stage::Registered => Some(0),
            Stage::Downloaded => Some(1),
            Stage::Normalized => Some(2),
            Stage::Extracted => Some(3),
            Stage::Consolidated => Some(4),
            Stage::Failed => None,
        }
    }

    /// Stable string label used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Registered => "registered",
            Stage::Downloaded => "downloaded",
            Stage::Normalized => "normalized",
            Stage::Extracted => "extracted",
            Stage::Consolidated => "consolidated",
            Stage::Failed => "failed",
        }
    }

    /// Parse a stable label back into a stage.
    pub fn parse(s: &str) -> Result<Stage, ParseStageError> {
        match s {
            "registered" => Ok(Stage::Registered),
            "downloaded" => Ok(Stage::Downloaded),
            "normalized" => Ok(Stage::Normalized),
            "extracted" => Ok(Stage::Extracted),
            "consolidated" => Ok(Stage::Consolidated),
            "failed" => Ok(Stage::Failed),
            other => Err(ParseStageError(other.to_string())),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
