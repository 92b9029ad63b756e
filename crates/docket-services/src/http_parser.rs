//! HTTP document-parsing client
//!
//! Posts raw document bytes to a remote parsing service and receives plain
//! text back. Parsing failures are usually deterministic (a bad scan stays
//! bad), so this client makes a single attempt; the pipeline records the
//! failure instead of retrying.

use crate::ServiceError;
use docket_domain::traits::DocumentParser;
use std::time::Duration;

/// Default timeout for parsing requests (long: scanned documents are slow)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HTTP client for a remote document-parsing service
pub struct HttpParser {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpParser {
    /// Create a new client against the given parse endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }
}

impl DocumentParser for HttpParser {
    type Error = ServiceError;

    async fn parse(&self, bytes: &[u8]) -> Result<String, Self::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::ParseFailed(format!("HTTP {}: {}", status, text)));
        }

        response
            .text()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("bad response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let parser = HttpParser::new("http://localhost:8070/parse");
        assert_eq!(parser.endpoint, "http://localhost:8070/parse");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let parser = HttpParser::new("http://127.0.0.1:9/parse");
        let result = parser.parse(b"%PDF-1.4").await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
    }
}
