//! Configuration for the extraction adapter

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the extraction adapter
///
/// Fields omitted from a config file fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Maximum time for a single extraction call (seconds).
    pub timeout_secs: u64,

    /// Maximum retries per document for transient service failures.
    pub max_retries: u32,

    /// Initial backoff delay after a transient failure (milliseconds);
    /// doubles per attempt.
    pub backoff_ms: u64,

    /// Maximum canonical-text length sent to the service (characters);
    /// longer documents are truncated with a note.
    pub max_text_length: usize,
}

impl ExtractConfig {
    /// Extraction call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_retries: 5,
            backoff_ms: 2_000,
            max_text_length: 200_000,
        }
    }
}
