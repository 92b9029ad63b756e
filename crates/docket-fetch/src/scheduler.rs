//! Rate-limited fetch scheduler
//!
//! Pulls raw bytes for registered documents, persists them to era/date
//! addressed storage, and records every outcome in the manifest. Transient
//! failures retry with exponential backoff up to a ceiling; permanent
//! failures (not-found, malformed URL, empty body) fail immediately.
//! Re-running over a partially fetched archive is safe: completed
//! documents are skipped unless a refresh is forced.

use crate::config::FetchConfig;
use crate::throttle::HostThrottle;
use crate::FetchError;
use docket_domain::traits::{Manifest, UpsertOutcome};
use docket_domain::{reason, unix_now, DocumentRecord, Stage};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Counters for one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Documents fetched and recorded as downloaded.
    pub downloaded: usize,
    /// Documents recorded as failed.
    pub failed: usize,
    /// Documents skipped (already downloaded, or failed without
    /// `retry_failed`).
    pub skipped: usize,
}

impl FetchStats {
    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "downloaded {}, failed {}, skipped {}",
            self.downloaded, self.failed, self.skipped
        )
    }
}

/// Outcome of one document's fetch.
enum Outcome {
    Downloaded,
    Failed,
    Skipped,
}

/// Rate-limited, retrying downloader
pub struct FetchScheduler<M> {
    client: reqwest::Client,
    config: FetchConfig,
    throttle: Arc<HostThrottle>,
    manifest: Arc<Mutex<M>>,
    data_dir: PathBuf,
}

impl<M> Clone for FetchScheduler<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            throttle: Arc::clone(&self.throttle),
            manifest: Arc::clone(&self.manifest),
            data_dir: self.data_dir.clone(),
        }
    }
}

impl<M> FetchScheduler<M>
where
    M: Manifest + Send + 'static,
    M::Error: std::fmt::Display,
{
    /// Create a scheduler writing raw artifacts under `data_dir`.
    pub fn new(config: FetchConfig, manifest: Arc<Mutex<M>>, data_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();

        let throttle = Arc::new(HostThrottle::new(config.host_interval()));

        Self {
            client,
            config,
            throttle,
            manifest,
            data_dir: data_dir.into(),
        }
    }

    /// Fetch a bounded set of documents with bounded concurrency.
    ///
    /// One document's failure never halts the others; only a manifest
    /// (storage) error aborts the run.
    pub async fn run(&self, records: Vec<DocumentRecord>) -> Result<FetchStats, FetchError> {
        info!(count = records.len(), "starting fetch run");

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for record in records {
            let scheduler = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                scheduler.fetch_one(record).await
            });
        }

        let mut stats = FetchStats::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| FetchError::Manifest(e.to_string()))??;
            match outcome {
                Outcome::Downloaded => stats.downloaded += 1,
                Outcome::Failed => stats.failed += 1,
                Outcome::Skipped => stats.skipped += 1,
            }
        }

        info!("fetch run complete: {}", stats.summary());
        Ok(stats)
    }

    async fn fetch_one(&self, record: DocumentRecord) -> Result<Outcome, FetchError> {
        if self.should_skip(&record) {
            debug!(id = record.id.as_str(), stage = record.stage.as_str(), "skipping");
            return Ok(Outcome::Skipped);
        }

        // Ensure the record exists before any failure can be recorded
        // against it.
        self.upsert(&record)?;

        let host = match reqwest::Url::parse(&record.url) {
            Ok(url) => match url.host_str() {
                Some(host) => host.to_string(),
                None => {
                    self.fail(&record, reason::with_detail(reason::BAD_URL, "no host"))?;
                    return Ok(Outcome::Failed);
                }
            },
            Err(e) => {
                self.fail(&record, reason::with_detail(reason::BAD_URL, e.to_string()))?;
                return Ok(Outcome::Failed);
            }
        };

        let mut attempt: u32 = 0;
        loop {
            self.throttle.acquire(&host).await;

            match self.try_fetch(&record.url).await {
                Ok(bytes) => {
                    let path = self.raw_path(&record);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, &bytes).await?;

                    let mut done = record.clone();
                    done.stage = Stage::Downloaded;
                    done.raw_path = Some(path.to_string_lossy().into_owned());
                    done.byte_size = Some(bytes.len() as u64);
                    done.downloaded_at = Some(unix_now());
                    done.fetch_retries = record.fetch_retries + attempt;
                    self.upsert(&done)?;

                    debug!(id = done.id.as_str(), bytes = bytes.len(), "downloaded");
                    return Ok(Outcome::Downloaded);
                }
                Err(e) if e.is_transient() => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        self.record_retry(&record)?;
                        let delay =
                            Duration::from_millis(self.config.backoff_ms * (1 << (attempt - 1)));
                        warn!(
                            id = record.id.as_str(),
                            attempt,
                            error = %e,
                            ?delay,
                            "transient fetch failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        self.fail(
                            &record,
                            reason::with_detail(
                                reason::FETCH_EXHAUSTED,
                                format!("{} after {} retries", e, attempt),
                            ),
                        )?;
                        return Ok(Outcome::Failed);
                    }
                }
                Err(FetchError::EmptyBody) => {
                    self.fail(&record, reason::EMPTY_BODY.to_string())?;
                    return Ok(Outcome::Failed);
                }
                Err(e) => {
                    // Permanent: mostly 404s on non-publication days.
                    self.fail(&record, reason::with_detail(reason::NOT_FOUND, e.to_string()))?;
                    return Ok(Outcome::Failed);
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(bytes.to_vec())
    }

    fn should_skip(&self, record: &DocumentRecord) -> bool {
        match record.stage {
            Stage::Registered => false,
            // Only failures at the fetch stage itself are re-fetchable.
            Stage::Failed => {
                !(self.config.retry_failed && record.failed_stage == Some(Stage::Registered))
            }
            // Downloaded or beyond.
            _ => !self.config.force_refresh,
        }
    }

    fn raw_path(&self, record: &DocumentRecord) -> PathBuf {
        use chrono::Datelike;
        self.data_dir
            .join("raw")
            .join(record.era.as_str())
            .join(record.date.year().to_string())
            .join(format!(
                "digest_{}.{}",
                record.date.format("%Y-%m-%d"),
                record.era.file_ext()
            ))
    }

    fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, FetchError> {
        self.manifest
            .lock()
            .map_err(|e| FetchError::Manifest(format!("lock poisoned: {}", e)))?
            .upsert(record)
            .map_err(|e| FetchError::Manifest(e.to_string()))
    }

    fn record_retry(&self, record: &DocumentRecord) -> Result<(), FetchError> {
        self.manifest
            .lock()
            .map_err(|e| FetchError::Manifest(format!("lock poisoned: {}", e)))?
            .record_retry(&record.id, Stage::Registered)
            .map_err(|e| FetchError::Manifest(e.to_string()))?;
        Ok(())
    }

    fn fail(&self, record: &DocumentRecord, why: String) -> Result<(), FetchError> {
        warn!(id = record.id.as_str(), reason = %why, "fetch failed");
        self.manifest
            .lock()
            .map_err(|e| FetchError::Manifest(format!("lock poisoned: {}", e)))?
            .mark_failed(&record.id, Stage::Registered, &why)
            .map_err(|e| FetchError::Manifest(e.to_string()))?;
        Ok(())
    }
}
