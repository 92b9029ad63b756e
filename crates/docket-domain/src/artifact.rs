//! Extraction artifacts
//!
//! The validated structured output for one digest. Every enforcement entry
//! carries a verbatim excerpt from the canonical text; the excerpt is the
//! traceability contract the whole schema is built around. An entry whose
//! excerpt cannot be located is flagged, never silently kept or dropped.

use crate::id::DocumentId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of enforcement proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Administrative proceeding before the regulator.
    Administrative,
    /// Civil action in court.
    Civil,
    /// Criminal prosecution.
    Criminal,
    /// Anything the extraction service labeled outside the closed set.
    Other,
}

impl ActionKind {
    /// Stable label used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Administrative => "administrative",
            ActionKind::Civil => "civil",
            ActionKind::Criminal => "criminal",
            ActionKind::Other => "other",
        }
    }

    /// Parse a label from the closed set; unknown labels yield `None` so the
    /// caller can coerce and flag.
    pub fn from_label(s: &str) -> Option<ActionKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "administrative" => Some(ActionKind::Administrative),
            "civil" => Some(ActionKind::Civil),
            "criminal" => Some(ActionKind::Criminal),
            "other" => Some(ActionKind::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of respondent named in an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondentKind {
    /// A natural person.
    Individual,
    /// A company, partnership, or fund.
    Company,
    /// Anything else, or an unrecognized label.
    Other,
}

impl RespondentKind {
    /// Stable label used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RespondentKind::Individual => "individual",
            RespondentKind::Company => "company",
            RespondentKind::Other => "other",
        }
    }

    /// Parse a label from the closed set; unknown labels yield `None`.
    pub fn from_label(s: &str) -> Option<RespondentKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(RespondentKind::Individual),
            "company" => Some(RespondentKind::Company),
            "other" => Some(RespondentKind::Other),
            _ => None,
        }
    }
}

impl fmt::Display for RespondentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation categories (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Fraud or misrepresentation.
    Fraud,
    /// Registration violations (unregistered offerings, broker-dealers).
    Registration,
    /// Reporting and disclosure violations.
    Reporting,
    /// Insider trading.
    InsiderTrading,
    /// Market manipulation.
    MarketManipulation,
    /// Custody or misappropriation of client assets.
    Custody,
    /// Audit and accounting violations.
    Audit,
    /// Anything outside the closed set.
    Other,
}

impl ViolationKind {
    /// Stable label used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Fraud => "fraud",
            ViolationKind::Registration => "registration",
            ViolationKind::Reporting => "reporting",
            ViolationKind::InsiderTrading => "insider_trading",
            ViolationKind::MarketManipulation => "market_manipulation",
            ViolationKind::Custody => "custody",
            ViolationKind::Audit => "audit",
            ViolationKind::Other => "other",
        }
    }

    /// Parse a label from the closed set; unknown labels yield `None`.
    pub fn from_label(s: &str) -> Option<ViolationKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fraud" => Some(ViolationKind::Fraud),
            "registration" => Some(ViolationKind::Registration),
            "reporting" => Some(ViolationKind::Reporting),
            "insider_trading" => Some(ViolationKind::InsiderTrading),
            "market_manipulation" => Some(ViolationKind::MarketManipulation),
            "custody" => Some(ViolationKind::Custody),
            "audit" => Some(ViolationKind::Audit),
            "other" => Some(ViolationKind::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enforcement action extracted from a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementAction {
    /// Kind of proceeding.
    pub kind: ActionKind,

    /// Respondent name as it appears in the text.
    pub respondent: String,

    /// Respondent classification.
    pub respondent_kind: RespondentKind,

    /// Violation categories; may be empty when none classified.
    pub violations: Vec<ViolationKind>,

    /// Auditor name, when the action involves one.
    pub auditor: Option<String>,

    /// Audit firm, when the action involves one.
    pub audit_firm: Option<String>,

    /// Penalty in US dollars; absent when none imposed or stated.
    pub penalty_usd: Option<f64>,

    /// Whether the action was settled.
    pub settled: bool,

    /// Free-text description of the action.
    pub description: String,

    /// Verbatim excerpt from the canonical text supporting this entry.
    pub excerpt: String,

    /// Whether the excerpt located within the canonical text.
    pub excerpt_verified: bool,

    /// Release citation when stated (e.g. "34-21595").
    pub release_number: Option<String>,
}

impl EnforcementAction {
    /// Internal-consistency check applied at consolidation.
    ///
    /// A settled action with neither a penalty nor a description signals a
    /// likely extraction error; the entry is retained but flagged.
    pub fn is_internally_consistent(&self) -> bool {
        if self.settled && self.penalty_usd.is_none() && self.description.trim().is_empty() {
            return false;
        }
        if let Some(p) = self.penalty_usd {
            if p < 0.0 || !p.is_finite() {
                return false;
            }
        }
        !self.respondent.trim().is_empty()
    }
}

/// One trading suspension noted in a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSuspension {
    /// Issuer whose securities were suspended.
    pub company: String,

    /// Stated reason, when given.
    pub reason: Option<String>,

    /// Verbatim excerpt from the canonical text.
    pub excerpt: String,

    /// Whether the excerpt located within the canonical text.
    pub excerpt_verified: bool,
}

/// Validated structured output for one digest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionArtifact {
    /// The document this artifact belongs to (non-owning reference).
    pub document_id: DocumentId,

    /// Publication date of the digest.
    pub digest_date: NaiveDate,

    /// Unix seconds when this artifact was produced; later wins on
    /// same-date deduplication.
    pub produced_at: i64,

    /// Extraction service/model identifier, for provenance.
    pub model: String,

    /// Enforcement actions in document order.
    pub actions: Vec<EnforcementAction>,

    /// Trading suspensions in document order.
    pub suspensions: Vec<TradingSuspension>,

    /// Free-text items that matched no category.
    pub residual: Vec<String>,

    /// Extraction confidence notes; every coercion and unverifiable
    /// excerpt appends one.
    pub notes: Vec<String>,
}

impl ExtractionArtifact {
    /// Create an empty artifact (a digest with nothing to extract).
    pub fn empty(
        document_id: DocumentId,
        digest_date: NaiveDate,
        produced_at: i64,
        model: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            digest_date,
            produced_at,
            model: model.into(),
            actions: Vec::new(),
            suspensions: Vec::new(),
            residual: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Re-validate the artifact and list the defects found.
    ///
    /// Used by the consolidator as defense in depth: artifacts on disk may
    /// have been produced by an earlier schema version. An empty result
    /// means the artifact is clean; entries describe flagged rows, which
    /// are retained and counted, never silently included or dropped.
    pub fn validate(&self) -> Vec<String> {
        let mut flags = Vec::new();

        if self.document_id.components().is_err() {
            flags.push(format!("unparseable document id '{}'", self.document_id));
        }

        for (idx, action) in self.actions.iter().enumerate() {
            if !action.is_internally_consistent() {
                flags.push(format!("action {} internally inconsistent", idx));
            }
            if !action.excerpt_verified {
                flags.push(format!("action {} excerpt unverified", idx));
            }
            if action.excerpt.trim().is_empty() {
                flags.push(format!("action {} excerpt empty", idx));
            }
        }

        for (idx, susp) in self.suspensions.iter().enumerate() {
            if susp.company.trim().is_empty() {
                flags.push(format!("suspension {} has no company", idx));
            }
            if !susp.excerpt_verified {
                flags.push(format!("suspension {} excerpt unverified", idx));
            }
        }

        flags
    }

    /// Count of entries whose excerpt did not verify.
    pub fn unverified_excerpts(&self) -> usize {
        self.actions.iter().filter(|a| !a.excerpt_verified).count()
            + self
                .suspensions
                .iter()
                .filter(|s| !s.excerpt_verified)
                .count()
    }
}
