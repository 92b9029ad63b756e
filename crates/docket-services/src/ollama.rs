//! Ollama extraction client
//!
//! Talks to an Ollama chat endpoint in JSON mode with temperature 0, the
//! configuration used for deterministic structured extraction.
//!
//! Each `extract` call is a single attempt: the extraction adapter owns the
//! retry budget so that every retry is recorded against the document in the
//! manifest.

use crate::ServiceError;
use docket_domain::traits::ExtractionProvider;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for extraction requests (120 seconds; digests are long)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP statuses classified as transient (service-side).
const TRANSIENT: [u16; 5] = [429, 500, 502, 503, 504];

/// Ollama chat API client for structured extraction
pub struct OllamaExtractor {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: String,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaExtractor {
    /// Create a new client.
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client,
        }
    }

    /// Create a client against the default local endpoint.
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
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

impl ExtractionProvider for OllamaExtractor {
    type Error = ServiceError;

    async fn extract(&self, system: &str, prompt: &str) -> Result<String, Self::Error> {
        let url = format!("{}/api/chat", self.endpoint);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            // Deterministic JSON-mode extraction.
            format: "json".to_string(),
            options: ChatOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| ServiceError::InvalidResponse(format!("bad response body: {}", e)))?;
            return Ok(chat.message.content);
        }

        let text = response.text().await.unwrap_or_default();
        if TRANSIENT.contains(&status.as_u16()) {
            Err(ServiceError::Unavailable(format!("HTTP {}: {}", status, text)))
        } else {
            Err(ServiceError::Rejected(format!("HTTP {}: {}", status, text)))
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_transient(error: &Self::Error) -> bool {
        error.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OllamaExtractor::new("http://localhost:11434", "llama3.1");
        assert_eq!(client.endpoint, "http://localhost:11434");
        assert_eq!(client.model_name(), "llama3.1");
    }

    #[test]
    fn test_default_endpoint() {
        let client = OllamaExtractor::default_endpoint("llama3.1");
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Nothing listens here; the attempt is a connect failure.
        let client = OllamaExtractor::new("http://127.0.0.1:9", "llama3.1");
        let result = client.extract("system", "prompt").await;
        match result {
            Err(e) => assert!(e.is_transient(), "expected transient, got {}", e),
            Ok(_) => panic!("expected connect failure"),
        }
    }

    // Integration test (requires a running Ollama instance)
    #[tokio::test]
    #[ignore]
    async fn test_extract_integration() {
        let client = OllamaExtractor::default_endpoint("llama3.1");
        let result = client
            .extract("Reply with a JSON object.", "Return {\"ok\": true}")
            .await;
        if let Ok(content) = result {
            assert!(!content.is_empty());
        }
    }
}
