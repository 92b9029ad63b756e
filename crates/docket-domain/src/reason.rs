//! Well-known failure-reason codes
//!
//! Failure reasons recorded in the manifest are free-form strings, but the
//! machine-readable code always comes first, optionally followed by
//! `: detail`. The summary query groups on the code.

/// Transient fetch failures exhausted the retry budget.
pub const FETCH_EXHAUSTED: &str = "fetch_exhausted";
/// The source location returned a permanent not-found (expected for
/// non-publication days).
pub const NOT_FOUND: &str = "not_found";
/// The source URL could not be used at all.
pub const BAD_URL: &str = "bad_url";
/// The fetch succeeded but the body was empty.
pub const EMPTY_BODY: &str = "empty_body";
/// The document-parsing service could not convert the binary document.
pub const PARSE_FAILED: &str = "parse_failed";
/// Normalization produced empty or whitespace-only text.
pub const EMPTY_TEXT: &str = "empty_text";
/// The extraction service's response never parsed against the schema.
pub const EXTRACTION_MALFORMED: &str = "extraction_malformed";
/// The extraction service stayed unavailable through the retry budget.
pub const EXTRACTION_UNAVAILABLE: &str = "extraction_unavailable";

/// Join a reason code with human-readable detail.
pub fn with_detail(code: &str, detail: impl AsRef<str>) -> String {
    format!("{}: {}", code, detail.as_ref())
}

/// The machine-readable code of a recorded reason.
pub fn code(reason: &str) -> &str {
    reason.split(':').next().unwrap_or(reason).trim()
}
