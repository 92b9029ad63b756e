//! Docket Consolidator
//!
//! Folds every validated extraction artifact into the consolidated
//! dataset: one digests table, one enforcement-actions table, one
//! trading-suspensions table, a superseded audit table, and append-only
//! run metadata.
//!
//! # Determinism
//!
//! Artifacts are processed grouped by era in ascending date order, and the
//! dataset tables are rebuilt from scratch on every run, so consolidating
//! the same inputs twice produces an identical dataset.
//!
//! # Defense in depth
//!
//! Artifacts on disk may predate the current schema; every artifact is
//! re-validated here. Internally inconsistent rows are retained and
//! flagged: never silently included, never silently dropped.

#![warn(missing_docs)]

pub mod report;

use docket_domain::traits::{Manifest, StageFilter};
use docket_domain::{unix_now, DocumentRecord, Era, ExtractionArtifact, Stage};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

pub use report::{EraCounts, QualityReport};

/// Errors that can occur during consolidation
#[derive(Error, Debug)]
pub enum ConsolidateError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The written dataset violates an integrity invariant.
    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// One artifact displaced by same-date deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Superseded {
    /// The losing artifact, retained for audit.
    pub artifact: ExtractionArtifact,
    /// `produced_at` of the artifact that displaced it.
    pub winner_produced_at: i64,
}

/// Result of the deterministic dedup fold.
#[derive(Debug, Default)]
pub struct FoldOutcome {
    /// Winning artifacts in era/date order, one per digest date.
    pub winners: Vec<ExtractionArtifact>,
    /// Artifacts displaced by a later-produced one for the same date.
    pub superseded: Vec<Superseded>,
}

/// Deduplicate artifacts by digest date.
///
/// Two artifacts for the same date are a conflict: the later-produced one
/// wins, and on an exact `produced_at` tie the one encountered later in
/// scan order wins. Losers are retained, not discarded.
pub fn fold(artifacts: Vec<ExtractionArtifact>) -> FoldOutcome {
    let mut outcome = FoldOutcome::default();
    let mut by_date: BTreeMap<chrono::NaiveDate, ExtractionArtifact> = BTreeMap::new();

    for artifact in artifacts {
        match by_date.remove(&artifact.digest_date) {
            None => {
                by_date.insert(artifact.digest_date, artifact);
            }
            Some(existing) => {
                let (winner, loser) = if artifact.produced_at >= existing.produced_at {
                    (artifact, existing)
                } else {
                    (existing, artifact)
                };
                warn!(
                    date = %winner.digest_date,
                    "duplicate artifacts for one digest date, later-produced wins"
                );
                outcome.superseded.push(Superseded {
                    winner_produced_at: winner.produced_at,
                    artifact: loser,
                });
                by_date.insert(winner.digest_date, winner);
            }
        }
    }

    let mut winners: Vec<ExtractionArtifact> = by_date.into_values().collect();
    winners.sort_by_key(|a| {
        let era = a.document_id.components().map(|(era, _)| era).unwrap_or(Era::Typeset);
        (era, a.digest_date)
    });
    outcome.winners = winners;
    outcome
}

/// Folds extracted artifacts into the consolidated dataset
pub struct Consolidator<M> {
    manifest: Arc<Mutex<M>>,
    conn: Connection,
}

impl<M> Consolidator<M>
where
    M: Manifest,
    M::Error: std::fmt::Display,
{
    /// Open (or create) the dataset at the given database path.
    pub fn new<P: AsRef<Path>>(
        manifest: Arc<Mutex<M>>,
        dataset_path: P,
    ) -> Result<Self, ConsolidateError> {
        let conn = Connection::open(dataset_path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { manifest, conn })
    }

    /// Consolidate every extracted document into the dataset.
    ///
    /// Re-runs include previously consolidated documents, so the dataset is
    /// rebuilt deterministically from the full artifact set each time.
    pub fn run(&mut self) -> Result<QualityReport, ConsolidateError> {
        let started_at = unix_now();

        let records = self.worklist()?;
        info!(count = records.len(), "starting consolidation");

        let mut artifacts = Vec::new();
        let mut unreadable = 0usize;
        for record in &records {
            match Self::load_artifact(record) {
                Some(artifact) => artifacts.push(artifact),
                None => {
                    warn!(id = record.id.as_str(), "unreadable extraction artifact");
                    unreadable += 1;
                }
            }
        }

        let outcome = fold(artifacts);

        let mut report = QualityReport {
            run_id: uuid::Uuid::now_v7().to_string(),
            started_at,
            finished_at: 0,
            per_era: BTreeMap::new(),
            superseded: outcome.superseded.len(),
            unreadable_artifacts: unreadable,
        };

        self.write_dataset(&outcome, &mut report)?;
        self.verify_integrity()?;

        // Winners advance in the manifest only after the dataset is down.
        for artifact in &outcome.winners {
            self.mark_consolidated(&records, artifact)?;
        }

        report.finished_at = unix_now();
        self.record_run(&report)?;

        info!("consolidation complete:\n{}", report.summary());
        Ok(report)
    }

    /// Re-check the no-orphan invariant over the written tables.
    pub fn verify_integrity(&self) -> Result<(), ConsolidateError> {
        for table in ["actions", "suspensions"] {
            let orphans: i64 = self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} t LEFT JOIN digests d
                     ON t.document_id = d.document_id WHERE d.document_id IS NULL",
                    table
                ),
                [],
                |row| row.get(0),
            )?;
            if orphans > 0 {
                return Err(ConsolidateError::Integrity(format!(
                    "{} orphan rows in {}",
                    orphans, table
                )));
            }
        }
        Ok(())
    }

    fn worklist(&self) -> Result<Vec<DocumentRecord>, ConsolidateError> {
        let manifest = self
            .manifest
            .lock()
            .map_err(|e| ConsolidateError::Manifest(format!("lock poisoned: {}", e)))?;
        let mut records = manifest
            .query(&StageFilter::at(Stage::Extracted))
            .map_err(|e| ConsolidateError::Manifest(e.to_string()))?;
        records.extend(
            manifest
                .query(&StageFilter::at(Stage::Consolidated))
                .map_err(|e| ConsolidateError::Manifest(e.to_string()))?,
        );
        Ok(records)
    }

    fn load_artifact(record: &DocumentRecord) -> Option<ExtractionArtifact> {
        let path = record.artifact_path.as_deref()?;
        let json = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&json).ok()
    }

    fn write_dataset(
        &mut self,
        outcome: &FoldOutcome,
        report: &mut QualityReport,
    ) -> Result<(), ConsolidateError> {
        let tx = self.conn.transaction()?;

        // Children are written before their parent digest below, so defer
        // foreign-key checks until commit, by which point every parent row
        // exists. (Reset automatically at the end of the transaction.)
        tx.execute_batch("PRAGMA defer_foreign_keys = ON")?;

        // Deterministic rebuild: children first, then digests.
        tx.execute("DELETE FROM actions", [])?;
        tx.execute("DELETE FROM suspensions", [])?;
        tx.execute("DELETE FROM superseded", [])?;
        tx.execute("DELETE FROM digests", [])?;

        for artifact in &outcome.winners {
            let era = artifact
                .document_id
                .components()
                .map(|(era, _)| era)
                .unwrap_or(Era::Typeset);

            let defects = artifact.validate();
            for defect in &defects {
                warn!(id = artifact.document_id.as_str(), defect = %defect, "artifact re-validation flag");
            }

            let mut flagged_count = 0usize;
            let counts = report.per_era.entry(era.as_str().to_string()).or_default();
            counts.digests += 1;
            counts.unverified_excerpts += artifact.unverified_excerpts();

            for action in &artifact.actions {
                let flagged = !action.is_internally_consistent();
                if flagged {
                    flagged_count += 1;
                }
                tx.execute(
                    "INSERT INTO actions (document_id, kind, respondent, respondent_kind,
                                          violations, auditor, audit_firm, penalty_usd, settled,
                                          description, excerpt, excerpt_verified, release_number,
                                          flagged)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    params![
                        artifact.document_id.as_str(),
                        action.kind.as_str(),
                        action.respondent,
                        action.respondent_kind.as_str(),
                        action
                            .violations
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(","),
                        action.auditor,
                        action.audit_firm,
                        action.penalty_usd,
                        action.settled as i64,
                        action.description,
                        action.excerpt,
                        action.excerpt_verified as i64,
                        action.release_number,
                        flagged as i64,
                    ],
                )?;
                counts.actions += 1;
            }

            for suspension in &artifact.suspensions {
                tx.execute(
                    "INSERT INTO suspensions (document_id, company, reason, excerpt,
                                              excerpt_verified)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        artifact.document_id.as_str(),
                        suspension.company,
                        suspension.reason,
                        suspension.excerpt,
                        suspension.excerpt_verified as i64,
                    ],
                )?;
                counts.suspensions += 1;
            }

            counts.flagged += flagged_count;

            tx.execute(
                "INSERT INTO digests (document_id, era, digest_date, produced_at, model,
                                      action_count, suspension_count, flagged_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    artifact.document_id.as_str(),
                    era.as_str(),
                    artifact.digest_date.format("%Y-%m-%d").to_string(),
                    artifact.produced_at,
                    artifact.model,
                    artifact.actions.len() as i64,
                    artifact.suspensions.len() as i64,
                    flagged_count as i64,
                ],
            )?;
        }

        for superseded in &outcome.superseded {
            let json = serde_json::to_string(&superseded.artifact)
                .map_err(|e| ConsolidateError::Integrity(format!("audit serialization: {}", e)))?;
            tx.execute(
                "INSERT INTO superseded (document_id, digest_date, superseded_produced_at,
                                         winner_produced_at, artifact_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    superseded.artifact.document_id.as_str(),
                    superseded.artifact.digest_date.format("%Y-%m-%d").to_string(),
                    superseded.artifact.produced_at,
                    superseded.winner_produced_at,
                    json,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn mark_consolidated(
        &self,
        records: &[DocumentRecord],
        artifact: &ExtractionArtifact,
    ) -> Result<(), ConsolidateError> {
        let Some(record) = records.iter().find(|r| r.id == artifact.document_id) else {
            return Ok(());
        };
        if record.stage == Stage::Consolidated {
            return Ok(());
        }

        let mut done = record.clone();
        done.stage = Stage::Consolidated;
        done.consolidated_at = Some(unix_now());
        self.manifest
            .lock()
            .map_err(|e| ConsolidateError::Manifest(format!("lock poisoned: {}", e)))?
            .upsert(&done)
            .map_err(|e| ConsolidateError::Manifest(e.to_string()))?;
        Ok(())
    }

    fn record_run(&self, report: &QualityReport) -> Result<(), ConsolidateError> {
        self.conn.execute(
            "INSERT INTO runs (run_id, started_at, finished_at, digest_count, action_count,
                               suspension_count, flagged_count, unverified_excerpts,
                               superseded_count, unreadable_artifacts, report)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                report.run_id,
                report.started_at,
                report.finished_at,
                report.total_digests() as i64,
                report.total_actions() as i64,
                report.total_suspensions() as i64,
                report.total_flagged() as i64,
                report.total_unverified() as i64,
                report.superseded as i64,
                report.unreadable_artifacts as i64,
                report.summary(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use docket_domain::{
        ActionKind, DocumentId, EnforcementAction, RespondentKind, ViolationKind,
    };
    use docket_manifest::ManifestStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn action(respondent: &str) -> EnforcementAction {
        EnforcementAction {
            kind: ActionKind::Administrative,
            respondent: respondent.to_string(),
            respondent_kind: RespondentKind::Company,
            violations: vec![ViolationKind::Fraud],
            auditor: None,
            audit_firm: None,
            penalty_usd: Some(50_000.0),
            settled: true,
            description: "Settled.".to_string(),
            excerpt: "The Commission accepted an offer of settlement".to_string(),
            excerpt_verified: true,
            release_number: None,
        }
    }

    fn artifact(era: Era, d: NaiveDate, produced_at: i64) -> ExtractionArtifact {
        let mut artifact =
            ExtractionArtifact::empty(DocumentId::new(era, d), d, produced_at, "mock");
        artifact.actions.push(action("John Doe & Co."));
        artifact
    }

    #[test]
    fn test_fold_keeps_unique_dates() {
        let outcome = fold(vec![
            artifact(Era::Typeset, date(1985, 9, 28), 100),
            artifact(Era::Typeset, date(1985, 9, 29), 100),
        ]);
        assert_eq!(outcome.winners.len(), 2);
        assert!(outcome.superseded.is_empty());
    }

    #[test]
    fn test_fold_same_date_later_produced_wins() {
        // Scenario: two artifacts for one digest date.
        let earlier = artifact(Era::Typeset, date(1985, 9, 28), 100);
        let later = artifact(Era::Typeset, date(1985, 9, 28), 200);

        let outcome = fold(vec![later.clone(), earlier.clone()]);
        assert_eq!(outcome.winners.len(), 1);
        assert_eq!(outcome.winners[0].produced_at, 200);

        // The earlier artifact is retained for audit, not discarded.
        assert_eq!(outcome.superseded.len(), 1);
        assert_eq!(outcome.superseded[0].artifact.produced_at, 100);
        assert_eq!(outcome.superseded[0].winner_produced_at, 200);
    }

    #[test]
    fn test_fold_orders_by_era_then_date() {
        let outcome = fold(vec![
            artifact(Era::Markup, date(2007, 1, 2), 1),
            artifact(Era::Typeset, date(1985, 9, 28), 1),
            artifact(Era::Text, date(1995, 6, 1), 1),
            artifact(Era::Typeset, date(1985, 3, 1), 1),
        ]);
        let ids: Vec<&str> = outcome.winners.iter().map(|a| a.document_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "typeset:1985-03-01",
                "typeset:1985-09-28",
                "text:1995-06-01",
                "markup:2007-01-02",
            ]
        );
    }

    struct Fixture {
        manifest: Arc<Mutex<ManifestStore>>,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                manifest: Arc::new(Mutex::new(ManifestStore::new(":memory:").unwrap())),
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn extracted(&self, artifact: &ExtractionArtifact) -> DocumentRecord {
            let (era, d) = artifact.document_id.components().unwrap();
            let path = self
                .dir
                .path()
                .join(format!("artifact_{}.json", d.format("%Y-%m-%d")));
            std::fs::write(&path, serde_json::to_string(artifact).unwrap()).unwrap();

            let mut rec = DocumentRecord::register(era, d, "https://example.test/doc");
            rec.stage = Stage::Extracted;
            rec.artifact_path = Some(path.to_string_lossy().into_owned());
            self.manifest.lock().unwrap().upsert(&rec).unwrap();
            rec
        }

        fn consolidator(&self) -> Consolidator<ManifestStore> {
            Consolidator::new(Arc::clone(&self.manifest), self.dataset_path()).unwrap()
        }

        fn dataset_path(&self) -> std::path::PathBuf {
            self.dir.path().join("dataset.db")
        }

        fn dataset(&self) -> Connection {
            Connection::open(self.dataset_path()).unwrap()
        }
    }

    #[test]
    fn test_run_writes_dataset_and_advances_manifest() {
        let fx = Fixture::new();
        let art = artifact(Era::Typeset, date(1985, 9, 28), 100);
        let rec = fx.extracted(&art);

        let report = fx.consolidator().run().unwrap();
        assert_eq!(report.total_digests(), 1);
        assert_eq!(report.total_actions(), 1);
        assert_eq!(report.total_flagged(), 0);

        let loaded = fx.manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Consolidated);
        assert!(loaded.consolidated_at.is_some());

        let conn = fx.dataset();
        let digests: i64 = conn
            .query_row("SELECT COUNT(*) FROM digests", [], |r| r.get(0))
            .unwrap();
        let actions: i64 = conn
            .query_row("SELECT COUNT(*) FROM actions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(digests, 1);
        assert_eq!(actions, 1);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let fx = Fixture::new();
        fx.extracted(&artifact(Era::Typeset, date(1985, 9, 28), 100));
        fx.extracted(&artifact(Era::Text, date(1995, 6, 1), 100));

        let first = fx.consolidator().run().unwrap();
        let second = fx.consolidator().run().unwrap();
        assert_eq!(first.total_digests(), second.total_digests());
        assert_eq!(first.total_actions(), second.total_actions());

        let conn = fx.dataset();
        let digests: i64 = conn
            .query_row("SELECT COUNT(*) FROM digests", [], |r| r.get(0))
            .unwrap();
        let actions: i64 = conn
            .query_row("SELECT COUNT(*) FROM actions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(digests, 2, "re-run must not duplicate digest rows");
        assert_eq!(actions, 2, "re-run must not duplicate action rows");

        // Two runs recorded in the append-only history.
        let runs: i64 = conn
            .query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(runs, 2);
    }

    #[test]
    fn test_inconsistent_row_is_retained_and_flagged() {
        let fx = Fixture::new();
        let mut art = artifact(Era::Typeset, date(1985, 9, 28), 100);
        // Settled with no penalty and no description: likely extraction
        // error, kept but flagged.
        art.actions[0].penalty_usd = None;
        art.actions[0].description = String::new();
        fx.extracted(&art);

        let report = fx.consolidator().run().unwrap();
        assert_eq!(report.total_actions(), 1);
        assert_eq!(report.total_flagged(), 1);

        let conn = fx.dataset();
        let flagged: i64 = conn
            .query_row("SELECT flagged FROM actions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(flagged, 1);
    }

    #[test]
    fn test_superseded_artifact_lands_in_audit_table() {
        let fx = Fixture::new();
        // Same digest date extracted twice; records under the same id, so
        // fabricate the second artifact file directly.
        let early = artifact(Era::Typeset, date(1985, 9, 28), 100);
        fx.extracted(&early);

        let late = artifact(Era::Typeset, date(1985, 9, 28), 200);
        // Dataset-level check through fold: the manifest would merge two
        // records with the same id into one.
        let outcome = fold(vec![early.clone(), late.clone()]);

        let mut consolidator = fx.consolidator();
        let mut report = QualityReport::default();
        consolidator.write_dataset(&outcome, &mut report).unwrap();
        consolidator.verify_integrity().unwrap();

        let conn = fx.dataset();
        let (digests, superseded): (i64, i64) = (
            conn.query_row("SELECT COUNT(*) FROM digests", [], |r| r.get(0)).unwrap(),
            conn.query_row("SELECT COUNT(*) FROM superseded", [], |r| r.get(0)).unwrap(),
        );
        assert_eq!(digests, 1);
        assert_eq!(superseded, 1);

        let kept: i64 = conn
            .query_row("SELECT produced_at FROM digests", [], |r| r.get(0))
            .unwrap();
        assert_eq!(kept, 200);
    }

    #[test]
    fn test_unreadable_artifact_is_counted_not_fatal() {
        let fx = Fixture::new();
        let good = artifact(Era::Typeset, date(1985, 9, 28), 100);
        fx.extracted(&good);

        let mut bad = DocumentRecord::register(
            Era::Typeset,
            date(1985, 9, 29),
            "https://example.test/doc",
        );
        bad.stage = Stage::Extracted;
        bad.artifact_path = Some(
            fx.dir
                .path()
                .join("missing.json")
                .to_string_lossy()
                .into_owned(),
        );
        fx.manifest.lock().unwrap().upsert(&bad).unwrap();

        let report = fx.consolidator().run().unwrap();
        assert_eq!(report.total_digests(), 1);
        assert_eq!(report.unreadable_artifacts, 1);
    }
}
