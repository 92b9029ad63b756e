//! Docket Manifest Store
//!
//! Implements the `Manifest` trait over SQLite: the single source of truth
//! for every document's progress through the pipeline.
//!
//! # Architecture
//!
//! - One `documents` table, one row per source document, never deleted
//! - All merges are append-progress-only: a later stage, a higher retry
//!   count, or a newly present artifact path can land; a backward stage
//!   transition is a logged no-op
//! - Every mutation is committed before the call returns, so a crash
//!   immediately after a successful call cannot lose the transition
//!
//! # Examples
//!
//! ```no_run
//! use docket_manifest::ManifestStore;
//!
//! let store = ManifestStore::new(":memory:").unwrap();
//! // Store is ready for document records
//! ```

#![warn(missing_docs)]

use chrono::NaiveDate;
use docket_domain::traits::{Manifest, ManifestSummary, StageFilter, UpsertOutcome};
use docket_domain::{reason, DocumentId, DocumentRecord, Era, SourceFormat, Stage};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during manifest operations
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid data in a stored row
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// SQLite-backed implementation of the `Manifest` trait
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe; share a `ManifestStore` across
/// tasks behind a mutex, and do not hold the lock across await points.
pub struct ManifestStore {
    conn: Connection,
}

impl ManifestStore {
    /// Open (or create) a manifest at the given database path.
    ///
    /// Use `:memory:` for an in-memory manifest (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), ManifestError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    fn parse_stage(s: &str) -> Result<Stage, ManifestError> {
        Stage::parse(s).map_err(|e| ManifestError::InvalidData(e.to_string()))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        let invalid = |e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(ManifestError::InvalidData(e)),
            )
        };

        let id_str: String = row.get("id")?;
        let id = DocumentId::parse(&id_str).map_err(|e| invalid(e.to_string()))?;
        let era_str: String = row.get("era")?;
        let era = Era::parse(&era_str).map_err(|e| invalid(e.to_string()))?;
        let date_str: String = row.get("date")?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| invalid(format!("bad date: {}", e)))?;
        let format_str: String = row.get("format")?;
        let format = SourceFormat::parse(&format_str).map_err(|e| invalid(e.to_string()))?;
        let stage_str: String = row.get("stage")?;
        let stage = Stage::parse(&stage_str).map_err(|e| invalid(e.to_string()))?;
        let failed_stage: Option<String> = row.get("failed_stage")?;
        let failed_stage = failed_stage
            .map(|s| Stage::parse(&s).map_err(|e| invalid(e.to_string())))
            .transpose()?;

        Ok(DocumentRecord {
            id,
            url: row.get("url")?,
            era,
            date,
            format,
            stage,
            failed_stage,
            last_error: row.get("last_error")?,
            raw_path: row.get("raw_path")?,
            text_path: row.get("text_path")?,
            artifact_path: row.get("artifact_path")?,
            byte_size: row.get::<_, Option<i64>>("byte_size")?.map(|v| v as u64),
            downloaded_at: row.get("downloaded_at")?,
            normalized_at: row.get("normalized_at")?,
            extracted_at: row.get("extracted_at")?,
            consolidated_at: row.get("consolidated_at")?,
            fetch_retries: row.get::<_, i64>("fetch_retries")? as u32,
            extract_retries: row.get::<_, i64>("extract_retries")? as u32,
        })
    }

    fn write_record(&self, record: &DocumentRecord) -> Result<(), ManifestError> {
        self.conn.execute(
            "INSERT INTO documents (id, url, era, date, format, stage, failed_stage, last_error,
                                    raw_path, text_path, artifact_path, byte_size,
                                    downloaded_at, normalized_at, extracted_at, consolidated_at,
                                    fetch_retries, extract_retries)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(id) DO UPDATE SET
                 url = excluded.url,
                 stage = excluded.stage,
                 failed_stage = excluded.failed_stage,
                 last_error = excluded.last_error,
                 raw_path = excluded.raw_path,
                 text_path = excluded.text_path,
                 artifact_path = excluded.artifact_path,
                 byte_size = excluded.byte_size,
                 downloaded_at = excluded.downloaded_at,
                 normalized_at = excluded.normalized_at,
                 extracted_at = excluded.extracted_at,
                 consolidated_at = excluded.consolidated_at,
                 fetch_retries = excluded.fetch_retries,
                 extract_retries = excluded.extract_retries",
            params![
                record.id.as_str(),
                record.url,
                record.era.as_str(),
                record.date.format("%Y-%m-%d").to_string(),
                record.format.as_str(),
                record.stage.as_str(),
                record.failed_stage.map(|s| s.as_str()),
                record.last_error,
                record.raw_path,
                record.text_path,
                record.artifact_path,
                record.byte_size.map(|v| v as i64),
                record.downloaded_at,
                record.normalized_at,
                record.extracted_at,
                record.consolidated_at,
                record.fetch_retries as i64,
                record.extract_retries as i64,
            ],
        )?;
        Ok(())
    }

    /// Merge forward progress from `incoming` into `existing`.
    ///
    /// Stage moves only to a higher effective rank; artifact paths,
    /// timestamps, sizes, and errors fill in but never blank out; retry
    /// counters take the maximum.
    fn merge(existing: &DocumentRecord, incoming: &DocumentRecord) -> DocumentRecord {
        let advance = incoming.effective_rank() > existing.effective_rank()
            || (incoming.effective_rank() == existing.effective_rank()
                && incoming.stage == Stage::Failed);

        let (stage, failed_stage) = if advance {
            // failed_stage only accompanies a Failed stage; a successful
            // retry out of Failed clears it.
            let failed_stage = (incoming.stage == Stage::Failed)
                .then_some(incoming.failed_stage)
                .flatten();
            (incoming.stage, failed_stage)
        } else {
            (existing.stage, existing.failed_stage)
        };

        DocumentRecord {
            id: existing.id.clone(),
            url: existing.url.clone(),
            era: existing.era,
            date: existing.date,
            format: existing.format,
            stage,
            failed_stage,
            last_error: if advance {
                incoming.last_error.clone().or_else(|| existing.last_error.clone())
            } else {
                existing.last_error.clone()
            },
            raw_path: incoming.raw_path.clone().or_else(|| existing.raw_path.clone()),
            text_path: incoming.text_path.clone().or_else(|| existing.text_path.clone()),
            artifact_path: incoming
                .artifact_path
                .clone()
                .or_else(|| existing.artifact_path.clone()),
            byte_size: incoming.byte_size.or(existing.byte_size),
            downloaded_at: incoming.downloaded_at.or(existing.downloaded_at),
            normalized_at: incoming.normalized_at.or(existing.normalized_at),
            extracted_at: incoming.extracted_at.or(existing.extracted_at),
            consolidated_at: incoming.consolidated_at.or(existing.consolidated_at),
            fetch_retries: existing.fetch_retries.max(incoming.fetch_retries),
            extract_retries: existing.extract_retries.max(incoming.extract_retries),
        }
    }
}

impl Manifest for ManifestStore {
    type Error = ManifestError;

    fn upsert(&mut self, record: &DocumentRecord) -> Result<UpsertOutcome, Self::Error> {
        let existing = self.get(&record.id)?;

        let Some(existing) = existing else {
            self.write_record(record)?;
            return Ok(UpsertOutcome::Inserted);
        };

        if existing.would_regress(record) {
            warn!(
                id = record.id.as_str(),
                stored = existing.stage.as_str(),
                incoming = record.stage.as_str(),
                "rejected backward stage transition"
            );
            return Ok(UpsertOutcome::Conflict);
        }

        let merged = Self::merge(&existing, record);
        if merged == existing {
            return Ok(UpsertOutcome::Unchanged);
        }

        self.write_record(&merged)?;
        Ok(UpsertOutcome::Updated)
    }

    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, Self::Error> {
        let record = self
            .conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![id.as_str()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn query(&self, filter: &StageFilter) -> Result<Vec<DocumentRecord>, Self::Error> {
        let mut sql = String::from("SELECT * FROM documents WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(stage) = filter.stage {
            sql.push_str(" AND stage = ?");
            params.push(Box::new(stage.as_str()));
        }

        if let Some(era) = filter.era {
            sql.push_str(" AND era = ?");
            params.push(Box::new(era.as_str()));
        }

        sql.push_str(" ORDER BY date ASC, id ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let records = stmt
            .query_map(&param_refs[..], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn mark_failed(
        &mut self,
        id: &DocumentId,
        at: Stage,
        reason: &str,
    ) -> Result<UpsertOutcome, Self::Error> {
        let existing = self
            .get(id)?
            .ok_or_else(|| ManifestError::NotFound(id.to_string()))?;

        let mut incoming = existing.clone();
        incoming.stage = Stage::Failed;
        incoming.failed_stage = Some(at);
        incoming.last_error = Some(reason.to_string());

        if existing.would_regress(&incoming) {
            warn!(
                id = id.as_str(),
                stored = existing.stage.as_str(),
                at = at.as_str(),
                reason,
                "rejected failure transition for record already past that stage"
            );
            return Ok(UpsertOutcome::Conflict);
        }

        self.write_record(&incoming)?;
        Ok(UpsertOutcome::Updated)
    }

    fn record_retry(&mut self, id: &DocumentId, at: Stage) -> Result<u32, Self::Error> {
        let column = match at {
            Stage::Registered | Stage::Downloaded => "fetch_retries",
            _ => "extract_retries",
        };

        let updated = self.conn.execute(
            &format!("UPDATE documents SET {col} = {col} + 1 WHERE id = ?1", col = column),
            params![id.as_str()],
        )?;
        if updated == 0 {
            return Err(ManifestError::NotFound(id.to_string()));
        }

        let count: i64 = self.conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", column),
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    fn summary(&self) -> Result<ManifestSummary, Self::Error> {
        let mut summary = ManifestSummary::default();

        let mut stmt = self
            .conn
            .prepare("SELECT stage, COUNT(*) FROM documents GROUP BY stage")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (stage, count) = row?;
            Self::parse_stage(&stage)?;
            summary.by_stage.insert(stage, count as usize);
        }

        let mut stmt = self.conn.prepare(
            "SELECT last_error FROM documents WHERE stage = 'failed' AND last_error IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            let code = reason::code(&row?).to_string();
            *summary.by_failure.entry(code).or_insert(0) += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate) -> DocumentRecord {
        DocumentRecord::register(Era::Typeset, d, "https://example.test/doc.pdf")
    }

    fn store() -> ManifestStore {
        ManifestStore::new(":memory:").unwrap()
    }

    #[test]
    fn test_insert_then_get() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        assert_eq!(store.upsert(&rec).unwrap(), UpsertOutcome::Inserted);

        let loaded = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        store.upsert(&rec).unwrap();
        assert_eq!(store.upsert(&rec).unwrap(), UpsertOutcome::Unchanged);
    }

    #[test]
    fn test_forward_progress_merges() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        store.upsert(&rec).unwrap();

        let mut downloaded = rec.clone();
        downloaded.stage = Stage::Downloaded;
        downloaded.raw_path = Some("raw/typeset/1985/digest_1985-09-28.pdf".to_string());
        downloaded.byte_size = Some(40_960);
        downloaded.downloaded_at = Some(1_000);
        assert_eq!(store.upsert(&downloaded).unwrap(), UpsertOutcome::Updated);

        let loaded = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Downloaded);
        assert_eq!(loaded.byte_size, Some(40_960));
    }

    #[test]
    fn test_backward_transition_is_conflict_not_overwrite() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        let mut extracted = rec.clone();
        extracted.stage = Stage::Extracted;
        store.upsert(&extracted).unwrap();

        // Re-asserting an earlier stage must not move the record back.
        let mut downloaded = rec.clone();
        downloaded.stage = Stage::Downloaded;
        assert_eq!(store.upsert(&downloaded).unwrap(), UpsertOutcome::Conflict);
        assert_eq!(store.get(&rec.id).unwrap().unwrap().stage, Stage::Extracted);
    }

    #[test]
    fn test_merge_fills_but_never_blanks_artifacts() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        let mut downloaded = rec.clone();
        downloaded.stage = Stage::Downloaded;
        downloaded.raw_path = Some("raw/a.pdf".to_string());
        store.upsert(&downloaded).unwrap();

        let mut normalized = rec.clone();
        normalized.stage = Stage::Normalized;
        normalized.text_path = Some("text/a.txt".to_string());
        store.upsert(&normalized).unwrap();

        let loaded = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.raw_path.as_deref(), Some("raw/a.pdf"));
        assert_eq!(loaded.text_path.as_deref(), Some("text/a.txt"));
    }

    #[test]
    fn test_mark_failed_records_stage_and_reason() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        store.upsert(&rec).unwrap();

        store
            .mark_failed(&rec.id, Stage::Registered, "fetch_exhausted: HTTP 503 after 3 retries")
            .unwrap();

        let loaded = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Failed);
        assert_eq!(loaded.failed_stage, Some(Stage::Registered));
        assert!(loaded.last_error.unwrap().starts_with("fetch_exhausted"));
    }

    #[test]
    fn test_mark_failed_cannot_revert_later_stage() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        let mut extracted = rec.clone();
        extracted.stage = Stage::Extracted;
        store.upsert(&extracted).unwrap();

        let outcome = store
            .mark_failed(&rec.id, Stage::Registered, "fetch_exhausted")
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Conflict);
        assert_eq!(store.get(&rec.id).unwrap().unwrap().stage, Stage::Extracted);
    }

    #[test]
    fn test_retry_after_failure_can_advance() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        store.upsert(&rec).unwrap();
        store.mark_failed(&rec.id, Stage::Registered, "not_found: HTTP 404").unwrap();

        // A later successful fetch outranks the failure.
        let mut downloaded = rec.clone();
        downloaded.stage = Stage::Downloaded;
        assert_eq!(store.upsert(&downloaded).unwrap(), UpsertOutcome::Updated);

        let loaded = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Downloaded);
        assert_eq!(loaded.failed_stage, None);
    }

    #[test]
    fn test_record_retry_increments_per_stage() {
        let mut store = store();
        let rec = record(date(1985, 9, 28));
        store.upsert(&rec).unwrap();

        assert_eq!(store.record_retry(&rec.id, Stage::Registered).unwrap(), 1);
        assert_eq!(store.record_retry(&rec.id, Stage::Registered).unwrap(), 2);
        assert_eq!(store.record_retry(&rec.id, Stage::Normalized).unwrap(), 1);

        let loaded = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.fetch_retries, 2);
        assert_eq!(loaded.extract_retries, 1);
    }

    #[test]
    fn test_query_filters_and_orders_by_date() {
        let mut store = store();
        for day in [28, 3, 15] {
            let mut rec = record(date(1985, 9, day));
            rec.stage = Stage::Downloaded;
            store.upsert(&rec).unwrap();
        }
        let mut other_era = DocumentRecord::register(
            Era::Text,
            date(1995, 1, 2),
            "https://example.test/doc.txt",
        );
        other_era.stage = Stage::Downloaded;
        store.upsert(&other_era).unwrap();

        let filter = StageFilter {
            stage: Some(Stage::Downloaded),
            era: Some(Era::Typeset),
            limit: None,
        };
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 3);
        let days: Vec<u32> = results.iter().map(|r| {
            use chrono::Datelike;
            r.date.day()
        }).collect();
        assert_eq!(days, vec![3, 15, 28]);
    }

    #[test]
    fn test_summary_groups_failure_codes() {
        let mut store = store();
        for (day, reason) in [(1, "not_found: HTTP 404"), (2, "not_found: HTTP 404"), (3, "fetch_exhausted: timeout")] {
            let rec = record(date(1985, 9, day));
            store.upsert(&rec).unwrap();
            store.mark_failed(&rec.id, Stage::Registered, reason).unwrap();
        }
        let mut ok = record(date(1985, 9, 4));
        ok.stage = Stage::Downloaded;
        store.upsert(&ok).unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.by_stage.get("failed"), Some(&3));
        assert_eq!(summary.by_stage.get("downloaded"), Some(&1));
        assert_eq!(summary.by_failure.get("not_found"), Some(&2));
        assert_eq!(summary.by_failure.get("fetch_exhausted"), Some(&1));
        assert_eq!(summary.total(), 4);
    }
}
