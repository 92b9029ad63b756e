//! Extraction adapter
//!
//! Drives the external structured-extraction service over every normalized
//! document. Extraction is the most expensive and least reliable stage, so
//! progress is checkpointed per document: the artifact is written and the
//! manifest updated immediately after each validated response, never
//! batched. A mid-run crash loses at most the one in-flight document.

use crate::config::ExtractConfig;
use crate::error::{DocumentFailure, ExtractError};
use crate::parser::parse_response;
use crate::prefilter;
use crate::prompt::{PromptBuilder, SYSTEM_PROMPT};
use docket_domain::traits::{ExtractionProvider, Manifest, UpsertOutcome};
use docket_domain::{reason, unix_now, DocumentRecord, ExtractionArtifact, Stage};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters for one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Documents with a validated artifact.
    pub extracted: usize,
    /// Of those, documents short-circuited by the pre-filter (no service
    /// call made).
    pub prefiltered: usize,
    /// Documents recorded as failed.
    pub failed: usize,
}

impl ExtractStats {
    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "extracted {} ({} pre-filtered), failed {}",
            self.extracted, self.prefiltered, self.failed
        )
    }
}

/// Orchestrates extraction-service calls and validates the results
pub struct ExtractionAdapter<X, M> {
    provider: Arc<X>,
    manifest: Arc<Mutex<M>>,
    config: ExtractConfig,
    data_dir: PathBuf,
}

impl<X, M> ExtractionAdapter<X, M>
where
    X: ExtractionProvider,
    X::Error: std::fmt::Display,
    M: Manifest,
    M::Error: std::fmt::Display,
{
    /// Create an adapter writing artifacts under `data_dir`.
    pub fn new(
        provider: X,
        manifest: Arc<Mutex<M>>,
        config: ExtractConfig,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            manifest,
            config,
            data_dir: data_dir.into(),
        }
    }

    /// Extract a worklist of normalized documents.
    ///
    /// One document's failure never halts the others.
    pub async fn run(&self, records: Vec<DocumentRecord>) -> Result<ExtractStats, ExtractError> {
        info!(count = records.len(), model = self.provider.model_name(), "starting extraction run");

        let mut stats = ExtractStats::default();
        for record in records {
            match self.extract_one(&record).await? {
                Some(prefiltered) => {
                    stats.extracted += 1;
                    if prefiltered {
                        stats.prefiltered += 1;
                    }
                }
                None => stats.failed += 1,
            }
        }

        info!("extraction run complete: {}", stats.summary());
        Ok(stats)
    }

    /// Extract one document. Returns `Some(prefiltered)` on success, `None`
    /// when the document was recorded as failed.
    async fn extract_one(&self, record: &DocumentRecord) -> Result<Option<bool>, ExtractError> {
        let canonical = match self.read_canonical(record).await {
            Ok(text) => text,
            Err(why) => {
                self.fail(record, why)?;
                return Ok(None);
            }
        };

        // Documents with no enforcement sections never reach the service.
        if !prefilter::has_enforcement_sections(&canonical) {
            let mut artifact = ExtractionArtifact::empty(
                record.id.clone(),
                record.date,
                unix_now(),
                self.provider.model_name(),
            );
            artifact
                .notes
                .push("no enforcement sections detected by pre-filter".to_string());
            self.checkpoint(record, &artifact).await?;
            debug!(id = record.id.as_str(), "pre-filtered, empty artifact");
            return Ok(Some(true));
        }

        let artifact = match self.call_service(record, &canonical).await? {
            Ok(artifact) => artifact,
            Err(failure) => {
                let why = match &failure {
                    DocumentFailure::Malformed(detail) => {
                        reason::with_detail(reason::EXTRACTION_MALFORMED, detail)
                    }
                    DocumentFailure::Unavailable(detail) => {
                        reason::with_detail(reason::EXTRACTION_UNAVAILABLE, detail)
                    }
                };
                self.fail(record, why)?;
                return Ok(None);
            }
        };

        self.checkpoint(record, &artifact).await?;
        debug!(
            id = record.id.as_str(),
            actions = artifact.actions.len(),
            suspensions = artifact.suspensions.len(),
            "extracted"
        );
        Ok(Some(false))
    }

    /// Call the service with the stage's retry budget, then validate.
    ///
    /// Transient failures and timeouts retry with exponential backoff and
    /// count against the document's retry counter; a malformed response is
    /// re-asked once before failing.
    async fn call_service(
        &self,
        record: &DocumentRecord,
        canonical: &str,
    ) -> Result<Result<ExtractionArtifact, DocumentFailure>, ExtractError> {
        let text = self.bounded_text(canonical);
        let truncated_note = (text.len() < canonical.len()).then(|| {
            format!(
                "canonical text truncated from {} to {} chars for extraction",
                canonical.len(),
                text.len()
            )
        });
        let prompt = PromptBuilder::new(text).build();

        let mut attempt: u32 = 0;
        let mut reasked = false;
        loop {
            let call = self.provider.extract(SYSTEM_PROMPT, &prompt);
            let response = match tokio::time::timeout(self.config.timeout(), call).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) if X::is_transient(&e) => {
                    if !self.backoff(record, &mut attempt, &e.to_string()).await? {
                        return Ok(Err(DocumentFailure::Unavailable(format!(
                            "{} after {} retries",
                            e, attempt
                        ))));
                    }
                    continue;
                }
                Ok(Err(e)) => {
                    // Rejected outright (auth, bad request): no retry.
                    return Ok(Err(DocumentFailure::Unavailable(e.to_string())));
                }
                Err(_) => {
                    if !self.backoff(record, &mut attempt, "timeout").await? {
                        return Ok(Err(DocumentFailure::Unavailable(format!(
                            "timeout after {} retries",
                            attempt
                        ))));
                    }
                    continue;
                }
            };

            match parse_response(&response, canonical) {
                Ok(parsed) => {
                    let mut artifact = ExtractionArtifact {
                        document_id: record.id.clone(),
                        digest_date: record.date,
                        produced_at: unix_now(),
                        model: self.provider.model_name().to_string(),
                        actions: parsed.actions,
                        suspensions: parsed.suspensions,
                        residual: parsed.residual,
                        notes: parsed.notes,
                    };
                    if let Some(note) = truncated_note.as_ref() {
                        artifact.notes.push(note.clone());
                    }
                    return Ok(Ok(artifact));
                }
                Err(detail) if !reasked => {
                    // One fresh ask for a malformed response, then give up.
                    warn!(id = record.id.as_str(), detail = %detail, "malformed response, re-asking once");
                    reasked = true;
                }
                Err(detail) => {
                    return Ok(Err(DocumentFailure::Malformed(detail)));
                }
            }
        }
    }

    /// Sleep out one backoff step if budget remains. Returns `false` when
    /// the retry budget is exhausted.
    async fn backoff(
        &self,
        record: &DocumentRecord,
        attempt: &mut u32,
        detail: &str,
    ) -> Result<bool, ExtractError> {
        if *attempt >= self.config.max_retries {
            return Ok(false);
        }
        *attempt += 1;
        self.record_retry(record)?;
        let delay = Duration::from_millis(self.config.backoff_ms * (1 << (*attempt - 1)));
        warn!(
            id = record.id.as_str(),
            attempt = *attempt,
            detail,
            ?delay,
            "transient extraction failure, backing off"
        );
        tokio::time::sleep(delay).await;
        Ok(true)
    }

    async fn read_canonical(&self, record: &DocumentRecord) -> Result<String, String> {
        let Some(text_path) = record.text_path.as_deref() else {
            return Err(reason::with_detail(
                reason::EMPTY_TEXT,
                "no canonical text path",
            ));
        };
        match tokio::fs::read_to_string(text_path).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(reason::EMPTY_TEXT.to_string()),
            Err(e) => Err(reason::with_detail(
                reason::EMPTY_TEXT,
                format!("cannot read canonical text: {}", e),
            )),
        }
    }

    fn bounded_text<'a>(&self, canonical: &'a str) -> &'a str {
        if canonical.len() <= self.config.max_text_length {
            return canonical;
        }
        // Cut on a char boundary at or below the limit.
        let mut end = self.config.max_text_length;
        while !canonical.is_char_boundary(end) {
            end -= 1;
        }
        &canonical[..end]
    }

    /// Persist the artifact and advance the manifest, atomically enough
    /// that a crash between documents loses nothing.
    async fn checkpoint(
        &self,
        record: &DocumentRecord,
        artifact: &ExtractionArtifact,
    ) -> Result<(), ExtractError> {
        let path = self.artifact_path(record);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(artifact)
            .map_err(|e| ExtractError::Config(format!("artifact serialization: {}", e)))?;
        tokio::fs::write(&path, json).await?;

        let mut done = record.clone();
        done.stage = Stage::Extracted;
        done.artifact_path = Some(path.to_string_lossy().into_owned());
        done.extracted_at = Some(unix_now());
        self.upsert(&done)?;
        Ok(())
    }

    fn artifact_path(&self, record: &DocumentRecord) -> PathBuf {
        use chrono::Datelike;
        self.data_dir
            .join("extracted")
            .join(record.era.as_str())
            .join(record.date.year().to_string())
            .join(format!("digest_{}.json", record.date.format("%Y-%m-%d")))
    }

    fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, ExtractError> {
        self.manifest
            .lock()
            .map_err(|e| ExtractError::Manifest(format!("lock poisoned: {}", e)))?
            .upsert(record)
            .map_err(|e| ExtractError::Manifest(e.to_string()))
    }

    fn record_retry(&self, record: &DocumentRecord) -> Result<(), ExtractError> {
        self.manifest
            .lock()
            .map_err(|e| ExtractError::Manifest(format!("lock poisoned: {}", e)))?
            .record_retry(&record.id, Stage::Normalized)
            .map_err(|e| ExtractError::Manifest(e.to_string()))?;
        Ok(())
    }

    fn fail(&self, record: &DocumentRecord, why: String) -> Result<(), ExtractError> {
        warn!(id = record.id.as_str(), reason = %why, "extraction failed");
        self.manifest
            .lock()
            .map_err(|e| ExtractError::Manifest(format!("lock poisoned: {}", e)))?
            .mark_failed(&record.id, Stage::Normalized, &why)
            .map_err(|e| ExtractError::Manifest(e.to_string()))?;
        Ok(())
    }
}
