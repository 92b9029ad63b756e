//! Error types for the extraction adapter

use thiserror::Error;

/// Errors that abort an extraction run (per-document issues are recorded
/// in the manifest instead)
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Manifest (storage) error.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Filesystem error writing an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why one document's extraction did not produce an artifact.
///
/// These map onto the manifest failure reasons; they never abort the run.
#[derive(Error, Debug)]
pub enum DocumentFailure {
    /// The service response never parsed against the schema.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The service stayed unavailable through the retry budget.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}
