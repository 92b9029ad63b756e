//! Docket Service Clients
//!
//! Clients for the two external collaborators: the document-parsing service
//! (binary document → text) and the structured-extraction service
//! (canonical text → candidate structured payload).
//!
//! # Providers
//!
//! - `MockParser` / `MockExtractor`: deterministic mocks for testing
//! - `HttpParser`: HTTP client for a remote parsing service
//! - `OllamaExtractor`: Ollama chat API in JSON mode
//!
//! Both services are black boxes: the pipeline validates everything they
//! return and never assumes schema conformance.
//!
//! # Examples
//!
//! ```
//! use docket_services::MockExtractor;
//! use docket_domain::traits::ExtractionProvider;
//!
//! # tokio_test::block_on(async {
//! let provider = MockExtractor::new(r#"{"actions": []}"#);
//! let result = provider.extract("system", "prompt").await.unwrap();
//! assert_eq!(result, r#"{"actions": []}"#);
//! # });
//! ```

#![warn(missing_docs)]

pub mod http_parser;
pub mod ollama;

use docket_domain::traits::{DocumentParser, ExtractionProvider};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use http_parser::HttpParser;
pub use ollama::OllamaExtractor;

/// Errors that can occur talking to an external service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Network failure, timeout, or service-side unavailability; the
    /// caller's retry budget applies.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The service answered but the payload was unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service rejected the request outright (auth, bad request);
    /// retrying will not help.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The parsing service could not convert the document.
    #[error("Parse failed: {0}")]
    ParseFailed(String),
}

impl ServiceError {
    /// Whether retrying the same call can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

/// Mock document parser for deterministic testing
///
/// Returns a fixed text for any input, or a configured failure.
#[derive(Debug, Clone)]
pub struct MockParser {
    text: String,
    fail_with: Option<String>,
    call_count: Arc<Mutex<usize>>,
}

impl MockParser {
    /// Create a parser that returns `text` for every document.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fail_with: None,
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Create a parser that fails every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            fail_with: Some(message.into()),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of times `parse` was called.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl DocumentParser for MockParser {
    type Error = ServiceError;

    async fn parse(&self, _bytes: &[u8]) -> Result<String, Self::Error> {
        *self.call_count.lock().unwrap() += 1;
        match &self.fail_with {
            Some(msg) => Err(ServiceError::ParseFailed(msg.clone())),
            None => Ok(self.text.clone()),
        }
    }
}

/// Mock extraction provider for deterministic testing
///
/// Returns a default response, or a specific response for prompts
/// containing a configured marker. Can be told to fail the first N calls
/// with a transient error, which is how retry paths are exercised.
#[derive(Debug, Clone)]
pub struct MockExtractor {
    default_response: String,
    responses: Arc<Mutex<Vec<(String, String)>>>,
    fail_first: Arc<Mutex<usize>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockExtractor {
    /// Create a provider returning `response` for every prompt.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            fail_first: Arc::new(Mutex::new(0)),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Return `response` for any prompt containing `marker`.
    pub fn respond_when(&mut self, marker: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push((marker.into(), response.into()));
    }

    /// Fail the next `n` calls with a transient `Unavailable` error.
    pub fn fail_first(&mut self, n: usize) {
        *self.fail_first.lock().unwrap() = n;
    }

    /// Number of times `extract` was called.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new(r#"{"actions": [], "suspensions": [], "residual": [], "extraction_notes": null}"#)
    }
}

impl ExtractionProvider for MockExtractor {
    type Error = ServiceError;

    async fn extract(&self, _system: &str, prompt: &str) -> Result<String, Self::Error> {
        *self.call_count.lock().unwrap() += 1;

        {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(ServiceError::Unavailable("mock outage".to_string()));
            }
        }

        let responses = self.responses.lock().unwrap();
        for (marker, response) in responses.iter() {
            if prompt.contains(marker) {
                return Ok(response.clone());
            }
        }

        Ok(self.default_response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn is_transient(error: &Self::Error) -> bool {
        error.is_transient()
    }
}
