//! Command implementations.
//!
//! Each command queries the manifest for its stage's worklist, runs the
//! stage component, and prints a short summary. The manifest is the only
//! coordination point, which is what makes any command safe to re-run.

use crate::cli::{FetchArgs, YearArgs};
use crate::config::Config;
use crate::error::Result;
use docket_consolidate::Consolidator;
use docket_domain::traits::{ExtractionProvider, Manifest, StageFilter, UpsertOutcome};
use docket_domain::Stage;
use docket_extract::ExtractionAdapter;
use docket_fetch::{FetchScheduler, Registry};
use docket_manifest::ManifestStore;
use docket_normalize::Normalizer;
use docket_services::{HttpParser, MockExtractor, OllamaExtractor};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Open the manifest configured in `[pipeline]`, creating parent
/// directories as needed.
pub fn open_manifest(config: &Config) -> Result<Arc<Mutex<ManifestStore>>> {
    if let Some(parent) = config.pipeline.database.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = ManifestStore::new(&config.pipeline.database)?;
    Ok(Arc::new(Mutex::new(store)))
}

/// Discover and register every candidate document in the year range.
pub fn execute_register(
    config: &Config,
    manifest: &Arc<Mutex<ManifestStore>>,
    years: &YearArgs,
) -> Result<()> {
    let start = years.start_year.unwrap_or(config.pipeline.start_year);
    let end = years.end_year.unwrap_or(config.pipeline.end_year);

    let records = Registry::new().documents_for_range(start, end)?;
    let total = records.len();

    let mut inserted = 0usize;
    {
        let mut manifest = manifest.lock().expect("manifest lock");
        for record in &records {
            if manifest.upsert(record)? == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }
    }

    info!(total, inserted, "registration complete");
    println!("registered {} documents ({} new)", total, inserted);
    Ok(())
}

/// Fetch every registered document (and, optionally, fetch-failed ones).
pub async fn execute_fetch(
    config: &Config,
    manifest: &Arc<Mutex<ManifestStore>>,
    args: &FetchArgs,
) -> Result<()> {
    let mut fetch_config = config.fetch.clone();
    fetch_config.force_refresh |= args.force_refresh;
    fetch_config.retry_failed |= args.retry_failed;

    let mut worklist = {
        let manifest = manifest.lock().expect("manifest lock");
        let mut records = manifest.query(&StageFilter::at(Stage::Registered))?;
        if fetch_config.retry_failed {
            let failed = manifest.query(&StageFilter::at(Stage::Failed))?;
            records.extend(
                failed
                    .into_iter()
                    .filter(|r| r.failed_stage == Some(Stage::Registered)),
            );
        }
        records
    };
    worklist.sort_by(|a, b| a.date.cmp(&b.date));

    let scheduler = FetchScheduler::new(
        fetch_config,
        Arc::clone(manifest),
        &config.pipeline.data_dir,
    );
    let stats = scheduler.run(worklist).await?;
    println!("fetch: {}", stats.summary());
    Ok(())
}

/// Normalize every downloaded document to canonical text.
pub async fn execute_normalize(
    config: &Config,
    manifest: &Arc<Mutex<ManifestStore>>,
) -> Result<()> {
    let worklist = manifest
        .lock()
        .expect("manifest lock")
        .query(&StageFilter::at(Stage::Downloaded))?;

    let parser = HttpParser::new(&config.parser.endpoint)
        .with_timeout(std::time::Duration::from_secs(config.parser.timeout_secs));
    let normalizer = Normalizer::new(parser, Arc::clone(manifest), &config.pipeline.data_dir);
    let stats = normalizer.run(worklist).await?;
    println!("normalize: {}", stats.summary());
    Ok(())
}

/// Run structured extraction over every normalized document.
pub async fn execute_extract(config: &Config, manifest: &Arc<Mutex<ManifestStore>>) -> Result<()> {
    match config.extraction.provider.as_str() {
        "mock" => run_extraction(config, manifest, MockExtractor::default()).await,
        _ => {
            let provider = OllamaExtractor::new(
                &config.extraction.endpoint,
                &config.extraction.model,
            )
            .with_timeout(config.extraction.adapter.timeout());
            run_extraction(config, manifest, provider).await
        }
    }
}

async fn run_extraction<X>(
    config: &Config,
    manifest: &Arc<Mutex<ManifestStore>>,
    provider: X,
) -> Result<()>
where
    X: ExtractionProvider,
    X::Error: std::fmt::Display,
{
    let worklist = manifest
        .lock()
        .expect("manifest lock")
        .query(&StageFilter::at(Stage::Normalized))?;

    let adapter = ExtractionAdapter::new(
        provider,
        Arc::clone(manifest),
        config.extraction.adapter.clone(),
        &config.pipeline.data_dir,
    );
    let stats = adapter.run(worklist).await?;
    println!("extract: {}", stats.summary());
    Ok(())
}

/// Fold every extracted artifact into the consolidated dataset.
pub fn execute_consolidate(config: &Config, manifest: &Arc<Mutex<ManifestStore>>) -> Result<()> {
    let mut consolidator =
        Consolidator::new(Arc::clone(manifest), &config.pipeline.database)?;
    let report = consolidator.run()?;
    println!("{}", report.summary());
    Ok(())
}

/// Print per-stage and per-failure counts from the manifest.
pub fn execute_status(manifest: &Arc<Mutex<ManifestStore>>) -> Result<()> {
    let summary = manifest.lock().expect("manifest lock").summary()?;

    println!("documents: {}", summary.total());
    for stage in Stage::ORDERED.into_iter().chain([Stage::Failed]) {
        if let Some(count) = summary.by_stage.get(stage.as_str()) {
            println!("  {:<13} {}", stage.as_str(), count);
        }
    }
    if !summary.by_failure.is_empty() {
        println!("failure reasons:");
        for (code, count) in &summary.by_failure {
            println!("  {:<24} {}", code, count);
        }
    }
    Ok(())
}

/// Run every stage in order, stopping cleanly on ctrl-c.
///
/// Interruption between documents is safe: every completed document is
/// already durable in the manifest, and the next run resumes from there.
pub async fn execute_run(
    config: &Config,
    manifest: &Arc<Mutex<ManifestStore>>,
    years: &YearArgs,
) -> Result<()> {
    let pipeline = async {
        execute_register(config, manifest, years)?;
        execute_fetch(config, manifest, &FetchArgs { force_refresh: false, retry_failed: false })
            .await?;
        execute_normalize(config, manifest).await?;
        execute_extract(config, manifest).await?;
        execute_consolidate(config, manifest)?;
        execute_status(manifest)
    };

    tokio::select! {
        result = pipeline => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; completed documents remain durable in the manifest");
            println!("interrupted - re-run to resume from the last durable state");
            Ok(())
        }
    }
}
