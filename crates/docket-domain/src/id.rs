//! Document identifiers
//!
//! Identifiers are derived, not generated: a document's identity is its era
//! plus its publication date, so re-discovering the same archive always
//! produces the same ids. That determinism is what makes manifest upserts
//! idempotent across runs.

use crate::era::Era;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when parsing a document identifier fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid document id '{input}': {detail}")]
pub struct ParseIdError {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub detail: String,
}

/// Stable identifier for one source document.
///
/// Rendered as `<era>:<date>`, e.g. `typeset:1985-09-28`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derive the identifier for a document of `era` published on `date`.
    pub fn new(era: Era, date: NaiveDate) -> Self {
        Self(format!("{}:{}", era.as_str(), date.format("%Y-%m-%d")))
    }

    /// Parse an identifier back into its era and date components.
    pub fn components(&self) -> Result<(Era, NaiveDate), ParseIdError> {
        Self::split(&self.0)
    }

    /// Parse a string into a validated identifier.
    pub fn parse(s: &str) -> Result<Self, ParseIdError> {
        Self::split(s)?;
        Ok(Self(s.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(s: &str) -> Result<(Era, NaiveDate), ParseIdError> {
        let (era_part, date_part) = s.split_once(':').ok_or_else(|| ParseIdError {
            input: s.to_string(),
            detail: "expected '<era>:<date>'".to_string(),
        })?;
        let era = Era::parse(era_part).map_err(|e| ParseIdError {
            input: s.to_string(),
            detail: e.to_string(),
        })?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| ParseIdError {
            input: s.to_string(),
            detail: format!("bad date: {}", e),
        })?;
        Ok((era, date))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_id_rendering() {
        let id = DocumentId::new(Era::Typeset, date(1985, 9, 28));
        assert_eq!(id.as_str(), "typeset:1985-09-28");
    }

    #[test]
    fn test_id_round_trip() {
        let id = DocumentId::new(Era::Markup, date(2007, 1, 3));
        let parsed = DocumentId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
        let (era, d) = parsed.components().unwrap();
        assert_eq!(era, Era::Markup);
        assert_eq!(d, date(2007, 1, 3));
    }

    #[test]
    fn test_same_inputs_same_id() {
        let a = DocumentId::new(Era::Text, date(1995, 6, 1));
        let b = DocumentId::new(Era::Text, date(1995, 6, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(DocumentId::parse("no-separator").is_err());
        assert!(DocumentId::parse("pdf:1985-09-28").is_err());
        assert!(DocumentId::parse("typeset:28-09-1985").is_err());
        assert!(DocumentId::parse("").is_err());
    }

    #[test]
    fn test_ids_order_by_date_within_era() {
        let earlier = DocumentId::new(Era::Text, date(1995, 1, 2));
        let later = DocumentId::new(Era::Text, date(1995, 1, 10));
        assert!(earlier < later);
    }
}
