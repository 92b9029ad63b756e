//! Configuration file handling.
//!
//! One `docket.toml` with a section per component; every field has a
//! default, so a missing file or a sparse one still yields a runnable
//! configuration.

use crate::error::{CliError, Result};
use docket_extract::ExtractConfig;
use docket_fetch::FetchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Year range and storage locations.
    pub pipeline: PipelineSettings,

    /// Fetch scheduler settings.
    pub fetch: FetchConfig,

    /// Document-parsing service settings.
    pub parser: ParserSettings,

    /// Structured-extraction service settings.
    pub extraction: ExtractionSettings,
}

/// Year range and storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// First year to process.
    pub start_year: i32,

    /// Last year to process.
    pub end_year: i32,

    /// Root directory for raw, text, and extracted artifacts.
    pub data_dir: PathBuf,

    /// Manifest + dataset database path.
    pub database: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            start_year: 1985,
            end_year: 1985,
            data_dir: PathBuf::from("data"),
            database: PathBuf::from("data/docket.db"),
        }
    }
}

/// Document-parsing service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Parse endpoint URL.
    pub endpoint: String,

    /// Per-call timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8070/parse".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Structured-extraction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Provider selection: `mock` or `ollama`.
    pub provider: String,

    /// Service endpoint URL (ollama provider).
    pub endpoint: String,

    /// Model name (ollama provider).
    pub model: String,

    /// Adapter settings (timeout, retry budget, text bound).
    #[serde(flatten)]
    pub adapter: ExtractConfig,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: docket_services::ollama::DEFAULT_ENDPOINT.to_string(),
            model: "llama3.1".to_string(),
            adapter: ExtractConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; a missing file yields the
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.start_year > self.pipeline.end_year {
            return Err(CliError::Config(format!(
                "start_year {} is after end_year {}",
                self.pipeline.start_year, self.pipeline.end_year
            )));
        }
        self.fetch.validate().map_err(CliError::Config)?;
        self.extraction.adapter.validate().map_err(CliError::Config)?;
        match self.extraction.provider.as_str() {
            "mock" | "ollama" => Ok(()),
            other => Err(CliError::Config(format!(
                "unknown extraction provider '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_sparse_toml_fills_defaults() {
        let raw = r#"
            [pipeline]
            start_year = 1956
            end_year = 1960

            [fetch]
            max_retries = 5

            [extraction]
            provider = "mock"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.pipeline.start_year, 1956);
        assert_eq!(config.fetch.max_retries, 5);
        // Unspecified fields keep their defaults.
        assert_eq!(config.fetch.concurrency, FetchConfig::default().concurrency);
        assert_eq!(config.extraction.provider, "mock");
        assert_eq!(config.extraction.model, "llama3.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_year_range_rejected() {
        let mut config = Config::default();
        config.pipeline.start_year = 1990;
        config.pipeline.end_year = 1985;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = Config::default();
        config.extraction.provider = "gpt".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/docket.toml").unwrap();
        assert_eq!(config.pipeline.start_year, 1985);
    }
}
