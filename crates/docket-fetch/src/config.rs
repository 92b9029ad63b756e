//! Configuration for the fetch scheduler

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the fetch scheduler
///
/// Fields omitted from a config file fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Minimum interval between requests to one host (milliseconds).
    pub host_interval_ms: u64,

    /// Maximum retries per document for transient failures.
    pub max_retries: u32,

    /// Concurrent in-flight downloads.
    pub concurrency: usize,

    /// Per-request timeout (seconds).
    pub timeout_secs: u64,

    /// Initial backoff delay after a transient failure (milliseconds);
    /// doubles per attempt.
    pub backoff_ms: u64,

    /// User-Agent header sent with every request. Archive operators ask
    /// for a contact address here.
    pub user_agent: String,

    /// Re-download documents already at `downloaded`.
    pub force_refresh: bool,

    /// Re-queue documents that failed at fetch (mostly known 404s).
    pub retry_failed: bool,
}

impl FetchConfig {
    /// Host interval as a `Duration`.
    pub fn host_interval(&self) -> Duration {
        Duration::from_millis(self.host_interval_ms)
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            host_interval_ms: 1_500,
            max_retries: 3,
            concurrency: 3,
            timeout_secs: 30,
            backoff_ms: 2_000,
            user_agent: "docket archive pipeline (research contact: research@example.org)"
                .to_string(),
            force_refresh: false,
            retry_failed: false,
        }
    }
}
