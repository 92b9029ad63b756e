//! Parse and validate extraction-service responses
//!
//! The service does not guarantee schema conformance, so everything is
//! validated here. The policy is partial trust: unrecognized enum labels
//! coerce to "other" and are flagged in the notes, bad penalties drop to
//! null with a note, and an excerpt that cannot be located flags the entry
//! as unverifiable. Nothing is silently dropped or silently kept.

use docket_domain::{ActionKind, EnforcementAction, RespondentKind, TradingSuspension, ViolationKind};
use serde_json::Value;
use tracing::warn;

/// Validated content of one service response.
#[derive(Debug, Default)]
pub struct ParsedResponse {
    /// Enforcement actions in response order.
    pub actions: Vec<EnforcementAction>,
    /// Trading suspensions in response order.
    pub suspensions: Vec<TradingSuspension>,
    /// Free-text items that matched no category.
    pub residual: Vec<String>,
    /// Validation notes accumulated while parsing.
    pub notes: Vec<String>,
}

/// How an excerpt located within the canonical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcerptMatch {
    /// Found as an exact contiguous substring.
    Exact,
    /// Found after collapsing whitespace runs on both sides.
    Normalized,
    /// Not found; the entry is flagged unverifiable.
    Missing,
}

/// Verify that an excerpt is a contiguous substring of the canonical text.
pub fn verify_excerpt(canonical: &str, excerpt: &str) -> ExcerptMatch {
    if excerpt.trim().is_empty() {
        return ExcerptMatch::Missing;
    }
    if canonical.contains(excerpt.trim()) {
        return ExcerptMatch::Exact;
    }
    // Canonical text and model output legitimately differ in line breaks.
    let collapse = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapse(canonical).contains(&collapse(excerpt)) {
        return ExcerptMatch::Normalized;
    }
    ExcerptMatch::Missing
}

/// Parse a service response against the canonical text it was asked about.
///
/// Returns `Err` only when the response as a whole is unusable (not JSON,
/// or not the expected object shape); per-entry defects are repaired or
/// flagged in the returned notes.
pub fn parse_response(raw: &str, canonical: &str) -> Result<ParsedResponse, String> {
    let json_str = extract_json(raw)?;

    let json: Value =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {}", e))?;

    let obj = json
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let mut parsed = ParsedResponse::default();

    if let Some(note) = obj.get("extraction_notes").and_then(|v| v.as_str()) {
        if !note.trim().is_empty() {
            parsed.notes.push(format!("service: {}", note.trim()));
        }
    }

    for (idx, entry) in obj
        .get("actions")
        .and_then(|v| v.as_array())
        .unwrap_or(&Vec::new())
        .iter()
        .enumerate()
    {
        match parse_action(idx, entry, canonical, &mut parsed.notes) {
            Some(action) => parsed.actions.push(action),
            None => warn!(idx, "dropped unusable action entry"),
        }
    }

    for (idx, entry) in obj
        .get("suspensions")
        .and_then(|v| v.as_array())
        .unwrap_or(&Vec::new())
        .iter()
        .enumerate()
    {
        match parse_suspension(idx, entry, canonical, &mut parsed.notes) {
            Some(susp) => parsed.suspensions.push(susp),
            None => warn!(idx, "dropped unusable suspension entry"),
        }
    }

    if let Some(residual) = obj.get("residual").and_then(|v| v.as_array()) {
        for item in residual {
            if let Some(s) = item.as_str() {
                if !s.trim().is_empty() {
                    parsed.residual.push(s.trim().to_string());
                }
            }
        }
    }

    Ok(parsed)
}

/// Strip a markdown code fence if the service wrapped its JSON in one.
fn extract_json(response: &str) -> Result<String, String> {
    let trimmed = response.trim();
    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err("empty code block".to_string());
        }
        Ok(lines[1..lines.len().saturating_sub(1)].join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_action(
    idx: usize,
    entry: &Value,
    canonical: &str,
    notes: &mut Vec<String>,
) -> Option<EnforcementAction> {
    let obj = entry.as_object()?;

    let respondent = obj.get("respondent").and_then(|v| v.as_str())?.trim();
    if respondent.is_empty() {
        notes.push(format!("action {}: dropped, empty respondent", idx));
        return None;
    }

    let kind = match obj.get("kind").and_then(|v| v.as_str()) {
        Some(label) => ActionKind::from_label(label).unwrap_or_else(|| {
            notes.push(format!("action {}: unrecognized kind '{}' coerced to other", idx, label));
            ActionKind::Other
        }),
        None => {
            notes.push(format!("action {}: missing kind coerced to other", idx));
            ActionKind::Other
        }
    };

    let respondent_kind = match obj.get("respondent_kind").and_then(|v| v.as_str()) {
        Some(label) => RespondentKind::from_label(label).unwrap_or_else(|| {
            notes.push(format!(
                "action {}: unrecognized respondent_kind '{}' coerced to other",
                idx, label
            ));
            RespondentKind::Other
        }),
        None => RespondentKind::Other,
    };

    let mut violations = Vec::new();
    if let Some(raw_violations) = obj.get("violations").and_then(|v| v.as_array()) {
        for violation in raw_violations {
            let Some(label) = violation.as_str() else {
                continue;
            };
            let kind = ViolationKind::from_label(label).unwrap_or_else(|| {
                notes.push(format!(
                    "action {}: unrecognized violation '{}' coerced to other",
                    idx, label
                ));
                ViolationKind::Other
            });
            violations.push(kind);
        }
    }

    let penalty_usd = parse_penalty(idx, obj.get("penalty_usd"), notes);

    let excerpt = obj
        .get("excerpt")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let excerpt_verified = match verify_excerpt(canonical, &excerpt) {
        ExcerptMatch::Exact | ExcerptMatch::Normalized => true,
        ExcerptMatch::Missing => {
            notes.push(format!("action {}: excerpt not found in canonical text", idx));
            false
        }
    };

    Some(EnforcementAction {
        kind,
        respondent: respondent.to_string(),
        respondent_kind,
        violations,
        auditor: non_empty_string(obj.get("auditor")),
        audit_firm: non_empty_string(obj.get("audit_firm")),
        penalty_usd,
        settled: obj.get("settled").and_then(|v| v.as_bool()).unwrap_or(false),
        description: obj
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        excerpt,
        excerpt_verified,
        release_number: non_empty_string(obj.get("release_number")),
    })
}

fn parse_suspension(
    idx: usize,
    entry: &Value,
    canonical: &str,
    notes: &mut Vec<String>,
) -> Option<TradingSuspension> {
    let obj = entry.as_object()?;

    let company = obj.get("company").and_then(|v| v.as_str())?.trim();
    if company.is_empty() {
        notes.push(format!("suspension {}: dropped, empty company", idx));
        return None;
    }

    let excerpt = obj
        .get("excerpt")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let excerpt_verified = match verify_excerpt(canonical, &excerpt) {
        ExcerptMatch::Exact | ExcerptMatch::Normalized => true,
        ExcerptMatch::Missing => {
            notes.push(format!("suspension {}: excerpt not found in canonical text", idx));
            false
        }
    };

    Some(TradingSuspension {
        company: company.to_string(),
        reason: non_empty_string(obj.get("reason")),
        excerpt,
        excerpt_verified,
    })
}

/// Penalties arrive as numbers or as strings like "$50,000"; both are
/// accepted. Negative or unparsable values drop to null with a note.
fn parse_penalty(idx: usize, value: Option<&Value>, notes: &mut Vec<String>) -> Option<f64> {
    let amount = match value {
        None | Some(Value::Null) => return None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
            cleaned.parse::<f64>().ok()
        }
        Some(_) => None,
    };

    match amount {
        Some(a) if a >= 0.0 && a.is_finite() => Some(a),
        Some(a) => {
            notes.push(format!("action {}: negative penalty {} rejected", idx, a));
            None
        }
        None => {
            notes.push(format!("action {}: unparsable penalty rejected", idx));
            None
        }
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "ADMINISTRATIVE PROCEEDINGS\n\n\
        The Commission accepted an offer of settlement from John Doe & Co.\n\
        and imposed a civil penalty of $50,000.\n\n\
        TRADING SUSPENSIONS\n\n\
        Trading in the securities of Acme Mining Corp. was suspended.";

    fn response(actions: &str, suspensions: &str) -> String {
        format!(
            r#"{{"actions": [{}], "suspensions": [{}], "residual": [], "extraction_notes": null}}"#,
            actions, suspensions
        )
    }

    fn one_action() -> String {
        r#"{
            "kind": "administrative",
            "respondent": "John Doe & Co.",
            "respondent_kind": "company",
            "violations": ["fraud"],
            "auditor": null,
            "audit_firm": null,
            "penalty_usd": 50000,
            "settled": true,
            "description": "Settled administrative proceeding.",
            "excerpt": "The Commission accepted an offer of settlement from John Doe & Co.",
            "release_number": "34-21595"
        }"#
        .to_string()
    }

    #[test]
    fn test_well_formed_response_parses_clean() {
        let parsed = parse_response(&response(&one_action(), ""), CANONICAL).unwrap();
        assert_eq!(parsed.actions.len(), 1);
        assert!(parsed.notes.is_empty());

        let action = &parsed.actions[0];
        assert_eq!(action.kind, ActionKind::Administrative);
        assert_eq!(action.penalty_usd, Some(50_000.0));
        assert!(action.settled);
        assert!(action.excerpt_verified);
        assert_eq!(action.release_number.as_deref(), Some("34-21595"));
    }

    #[test]
    fn test_unrecognized_violation_is_coerced_not_dropped() {
        let action = one_action().replace(r#"["fraud"]"#, r#"["churning"]"#);
        let parsed = parse_response(&response(&action, ""), CANONICAL).unwrap();

        // The entry is retained with the category coerced to other, and a
        // non-empty note records the coercion.
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.actions[0].violations, vec![ViolationKind::Other]);
        assert!(parsed.notes.iter().any(|n| n.contains("churning")));
    }

    #[test]
    fn test_unrecognized_kind_is_coerced() {
        let action = one_action().replace("\"administrative\"", "\"injunctive\"");
        let parsed = parse_response(&response(&action, ""), CANONICAL).unwrap();
        assert_eq!(parsed.actions[0].kind, ActionKind::Other);
        assert!(parsed.notes.iter().any(|n| n.contains("injunctive")));
    }

    #[test]
    fn test_missing_excerpt_flags_unverifiable() {
        let action = one_action().replace(
            "The Commission accepted an offer of settlement from John Doe & Co.",
            "Text that appears nowhere in the document",
        );
        let parsed = parse_response(&response(&action, ""), CANONICAL).unwrap();
        assert_eq!(parsed.actions.len(), 1);
        assert!(!parsed.actions[0].excerpt_verified);
        assert!(parsed.notes.iter().any(|n| n.contains("excerpt not found")));
    }

    #[test]
    fn test_excerpt_with_different_line_breaks_verifies() {
        // Same words, different whitespace: counts as verified.
        let excerpt = "The Commission accepted an offer\nof settlement from John Doe & Co.";
        assert_eq!(verify_excerpt(CANONICAL, excerpt), ExcerptMatch::Normalized);
    }

    #[test]
    fn test_exact_excerpt_verifies() {
        assert_eq!(
            verify_excerpt(CANONICAL, "imposed a civil penalty of $50,000."),
            ExcerptMatch::Exact
        );
    }

    #[test]
    fn test_empty_excerpt_is_missing() {
        assert_eq!(verify_excerpt(CANONICAL, "   "), ExcerptMatch::Missing);
    }

    #[test]
    fn test_penalty_as_currency_string() {
        let action = one_action().replace("50000", "\"$50,000\"");
        let parsed = parse_response(&response(&action, ""), CANONICAL).unwrap();
        assert_eq!(parsed.actions[0].penalty_usd, Some(50_000.0));
    }

    #[test]
    fn test_negative_penalty_dropped_with_note() {
        let action = one_action().replace("50000", "-500");
        let parsed = parse_response(&response(&action, ""), CANONICAL).unwrap();
        assert_eq!(parsed.actions[0].penalty_usd, None);
        assert!(parsed.notes.iter().any(|n| n.contains("negative penalty")));
    }

    #[test]
    fn test_suspension_parses_and_verifies() {
        let suspension = r#"{
            "company": "Acme Mining Corp.",
            "reason": null,
            "excerpt": "Trading in the securities of Acme Mining Corp. was suspended."
        }"#;
        let parsed = parse_response(&response("", suspension), CANONICAL).unwrap();
        assert_eq!(parsed.suspensions.len(), 1);
        assert!(parsed.suspensions[0].excerpt_verified);
    }

    #[test]
    fn test_markdown_fenced_response_parses() {
        let fenced = format!("```json\n{}\n```", response(&one_action(), ""));
        let parsed = parse_response(&fenced, CANONICAL).unwrap();
        assert_eq!(parsed.actions.len(), 1);
    }

    #[test]
    fn test_non_json_response_is_malformed() {
        assert!(parse_response("I could not process this document.", CANONICAL).is_err());
    }

    #[test]
    fn test_array_response_is_malformed() {
        assert!(parse_response("[1, 2, 3]", CANONICAL).is_err());
    }

    #[test]
    fn test_entry_without_respondent_is_noted() {
        let bad = r#"{"kind": "civil", "excerpt": "x", "respondent": ""}"#;
        let parsed = parse_response(&response(bad, ""), CANONICAL).unwrap();
        assert!(parsed.actions.is_empty());
        assert!(parsed.notes.iter().any(|n| n.contains("empty respondent")));
    }

    #[test]
    fn test_service_notes_are_carried() {
        let raw = r#"{"actions": [], "suspensions": [], "residual": ["unclassifiable item"], "extraction_notes": "page 2 partially illegible"}"#;
        let parsed = parse_response(raw, CANONICAL).unwrap();
        assert_eq!(parsed.residual, vec!["unclassifiable item"]);
        assert!(parsed.notes.iter().any(|n| n.contains("illegible")));
    }
}
