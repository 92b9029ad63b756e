//! Docket Fetch Layer
//!
//! The source registry (which documents exist, per era) and the fetch
//! scheduler (rate-limited, retrying downloads into raw storage).
//!
//! # Architecture
//!
//! - `Registry` enumerates every candidate document for a year range with
//!   its era-specific source URL; it is pure lookup, no network
//! - `HostThrottle` is a shared token-bucket: all concurrent fetches
//!   against one host receive send slots spaced by the configured minimum
//!   interval, so concurrency never multiplies the effective request rate
//! - `FetchScheduler` drives bounded-concurrency downloads, classifies
//!   failures as transient (retried with exponential backoff) or permanent
//!   (failed immediately), and records every outcome in the manifest

#![warn(missing_docs)]

pub mod config;
pub mod registry;
pub mod scheduler;
pub mod throttle;

use thiserror::Error;

pub use config::FetchConfig;
pub use registry::Registry;
pub use scheduler::{FetchScheduler, FetchStats};
pub use throttle::HostThrottle;

/// Errors that can occur during fetch operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Http(u16),

    /// Network-level failure (connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The fetch succeeded but the body was empty.
    #[error("Empty response body")]
    EmptyBody,

    /// The source URL could not be used.
    #[error("Bad URL: {0}")]
    BadUrl(String),

    /// Filesystem error writing the raw artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest error surfaced through the scheduler.
    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl FetchError {
    /// Whether retrying the same fetch can plausibly succeed.
    ///
    /// Timeouts, connection failures, and 5xx-class statuses are
    /// transient; not-found and client errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Http(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
