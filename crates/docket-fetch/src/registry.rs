//! Source registry
//!
//! Enumerates every candidate document for a year with its era-specific
//! source URL. The archive publishes on business days only, but the
//! publication calendar is not predictable decades back, so the registry
//! emits every calendar date and lets the fetch stage record the permanent
//! not-founds for weekends and holidays.

use chrono::{Datelike, Days, NaiveDate};
use docket_domain::{DocumentRecord, Era};
use thiserror::Error;

/// Default archive base URL.
pub const DEFAULT_BASE_URL: &str = "https://www.sec.gov/news/digest";

/// Errors that can occur during registry enumeration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// The year falls outside the archive.
    #[error("Year {0} is outside the archive")]
    YearOutOfArchive(i32),

    /// The range is inverted.
    #[error("Invalid year range {0}..={1}")]
    InvalidRange(i32, i32),
}

/// Enumerates known documents per era with their source locations
#[derive(Debug, Clone)]
pub struct Registry {
    base_url: String,
}

impl Registry {
    /// Create a registry against the default archive location.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create a registry against a custom base URL (used in tests and for
    /// mirrored archives).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Every candidate document for one year, at stage `registered`.
    pub fn documents_for_year(&self, year: i32) -> Result<Vec<DocumentRecord>, RegistryError> {
        let era = Era::for_year(year).ok_or(RegistryError::YearOutOfArchive(year))?;

        let start = NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1 always exists");
        let mut records = Vec::with_capacity(366);
        let mut current = start;
        while current.year() == year {
            records.push(DocumentRecord::register(era, current, self.url_for(era, current)));
            current = current
                .checked_add_days(Days::new(1))
                .expect("date arithmetic within archive range");
        }

        Ok(records)
    }

    /// Every candidate document for an inclusive year range.
    pub fn documents_for_range(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DocumentRecord>, RegistryError> {
        if start_year > end_year {
            return Err(RegistryError::InvalidRange(start_year, end_year));
        }
        let mut all = Vec::new();
        for year in start_year..=end_year {
            all.extend(self.documents_for_year(year)?);
        }
        Ok(all)
    }

    /// The archive's naming scheme: `dig<MMDDYY>.<ext>` inside a year
    /// directory, with the extension fixed by the era.
    fn url_for(&self, era: Era, date: NaiveDate) -> String {
        format!(
            "{}/{}/dig{}.{}",
            self.base_url,
            date.year(),
            date.format("%m%d%y"),
            era.file_ext()
        )
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
