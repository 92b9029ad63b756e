//! Archive eras and their source formats
//!
//! The digest archive spans three publication periods, each distributed in a
//! different format. The era is a closed tagged variant: every era maps to
//! exactly one source format and one normalization strategy, selected by this
//! enumeration and never inferred from a file extension at call time.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// First year of the typeset (scanned binary) era.
pub const TYPESET_START: i32 = 1956;
/// Last year of the typeset era.
pub const TYPESET_END: i32 = 1986;
/// Last year of the plain-text era (starts the year after the typeset era).
pub const TEXT_END: i32 = 2001;
/// Last year of the markup era (starts the year after the text era); the
/// archive ends here.
pub const MARKUP_END: i32 = 2014;

/// Error returned when parsing an era label fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown era: {0}")]
pub struct ParseEraError(pub String);

/// A publication period of the digest archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    /// 1956–1986: scanned typeset bulletins distributed as binary documents.
    Typeset,
    /// 1987–2001: plain-text bulletins.
    Text,
    /// 2002–2014: structured-markup bulletins.
    Markup,
}

impl Era {
    /// All eras in ascending chronological order.
    pub const ALL: [Era; 3] = [Era::Typeset, Era::Text, Era::Markup];

    /// Resolve the era covering a given publication year.
    ///
    /// Returns `None` for years outside the archive.
    pub fn for_year(year: i32) -> Option<Era> {
        match year {
            TYPESET_START..=TYPESET_END => Some(Era::Typeset),
            y if y > TYPESET_END && y <= TEXT_END => Some(Era::Text),
            y if y > TEXT_END && y <= MARKUP_END => Some(Era::Markup),
            _ => None,
        }
    }

    /// The source format every document of this era carries.
    pub fn source_format(&self) -> SourceFormat {
        match self {
            Era::Typeset => SourceFormat::BinaryDocument,
            Era::Text => SourceFormat::PlainText,
            Era::Markup => SourceFormat::StructuredMarkup,
        }
    }

    /// File extension of raw artifacts in this era.
    pub fn file_ext(&self) -> &'static str {
        match self {
            Era::Typeset => "pdf",
            Era::Text => "txt",
            Era::Markup => "htm",
        }
    }

    /// Inclusive year range of this era.
    pub fn years(&self) -> (i32, i32) {
        match self {
            Era::Typeset => (TYPESET_START, TYPESET_END),
            Era::Text => (TYPESET_END + 1, TEXT_END),
            Era::Markup => (TEXT_END + 1, MARKUP_END),
        }
    }

    /// Stable string label used in identifiers, paths, and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Era::Typeset => "typeset",
            Era::Text => "text",
            Era::Markup => "markup",
        }
    }

    /// Parse a stable label back into an era.
    pub fn parse(s: &str) -> Result<Era, ParseEraError> {
        match s {
            "typeset" => Ok(Era::Typeset),
            "text" => Ok(Era::Text),
            "markup" => Ok(Era::Markup),
            other => Err(ParseEraError(other.to_string())),
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The format a source document arrives in.
///
/// Stored explicitly on every [`crate::DocumentRecord`]; the normalizer
/// dispatches on this tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Scanned/typeset binary document; requires the external parsing service.
    BinaryDocument,
    /// Plain text; passes through unchanged.
    PlainText,
    /// Structured markup; text is extracted and boilerplate discarded.
    StructuredMarkup,
}

impl SourceFormat {
    /// Stable string label used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::BinaryDocument => "binary_document",
            SourceFormat::PlainText => "plain_text",
            SourceFormat::StructuredMarkup => "structured_markup",
        }
    }

    /// Parse a stable label back into a format tag.
    pub fn parse(s: &str) -> Result<SourceFormat, ParseEraError> {
        match s {
            "binary_document" => Ok(SourceFormat::BinaryDocument),
            "plain_text" => Ok(SourceFormat::PlainText),
            "structured_markup" => Ok(SourceFormat::StructuredMarkup),
            other => Err(ParseEraError(other.to_string())),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era_for_year_boundaries() {
        assert_eq!(Era::for_year(1956), Some(Era::Typeset));
        assert_eq!(Era::for_year(1986), Some(Era::Typeset));
        assert_eq!(Era::for_year(1987), Some(Era::Text));
        assert_eq!(Era::for_year(2001), Some(Era::Text));
        assert_eq!(Era::for_year(2002), Some(Era::Markup));
        assert_eq!(Era::for_year(2014), Some(Era::Markup));
    }

    #[test]
    fn test_era_for_year_out_of_archive() {
        assert_eq!(Era::for_year(1955), None);
        assert_eq!(Era::for_year(2015), None);
    }

    #[test]
    fn test_era_format_mapping_is_total() {
        assert_eq!(Era::Typeset.source_format(), SourceFormat::BinaryDocument);
        assert_eq!(Era::Text.source_format(), SourceFormat::PlainText);
        assert_eq!(Era::Markup.source_format(), SourceFormat::StructuredMarkup);
    }

    #[test]
    fn test_era_label_round_trip() {
        for era in Era::ALL {
            assert_eq!(Era::parse(era.as_str()), Ok(era));
        }
        assert!(Era::parse("pdf").is_err());
    }

    #[test]
    fn test_eras_are_chronologically_ordered() {
        assert!(Era::Typeset < Era::Text);
        assert!(Era::Text < Era::Markup);
    }

    #[test]
    fn test_format_label_round_trip() {
        for era in Era::ALL {
            let format = era.source_format();
            assert_eq!(SourceFormat::parse(format.as_str()), Ok(format));
        }
    }
}
