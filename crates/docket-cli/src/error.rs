//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] docket_manifest::ManifestError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] docket_fetch::registry::RegistryError),

    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] docket_fetch::FetchError),

    /// Normalize error
    #[error("Normalize error: {0}")]
    Normalize(#[from] docket_normalize::NormalizeError),

    /// Extraction error
    #[error("Extraction error: {0}")]
    Extract(#[from] docket_extract::ExtractError),

    /// Consolidation error
    #[error("Consolidation error: {0}")]
    Consolidate(#[from] docket_consolidate::ConsolidateError),
}
