//! Prompt construction for the extraction service
//!
//! The system prompt carries the anti-hallucination rules; the user prompt
//! embeds the canonical text and the exact JSON contract the parser
//! validates against. Categories offered to the service are the closed
//! sets from the domain schema.

/// System prompt sent with every extraction call.
pub const SYSTEM_PROMPT: &str = "\
You are an expert legal document analyst specializing in securities enforcement actions.

Your task is to extract structured information about enforcement actions and trading suspensions from regulatory bulletin text.

CRITICAL RULES:
1. ONLY extract information that is EXPLICITLY stated in the text
2. If a field is not mentioned, use null - DO NOT GUESS
3. Do not infer information that is not directly stated
4. If the text quality is poor and something is unreadable, note it in extraction_notes
5. Copy exact text for names, citations, and excerpts
6. The excerpt field must be copied verbatim from the document text

Focus on these sections:
- ADMINISTRATIVE PROCEEDINGS
- CIVIL PROCEEDINGS
- CRIMINAL PROCEEDINGS
- TRADING SUSPENSIONS

Ignore other sections such as registration releases and rule filings.";

/// Builder for the per-document user prompt
pub struct PromptBuilder {
    text: String,
}

impl PromptBuilder {
    /// Create a builder over one document's canonical text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Render the full user prompt.
    pub fn build(&self) -> String {
        format!(
            r#"Extract all enforcement actions and trading suspensions from this regulatory bulletin.

Document text:
{text}

Return a JSON object with this structure:
{{
  "actions": [
    {{
      "kind": "administrative" | "civil" | "criminal",
      "respondent": "Full name of the charged party",
      "respondent_kind": "individual" | "company" | "other",
      "violations": ["fraud" | "registration" | "reporting" | "insider_trading" | "market_manipulation" | "custody" | "audit"],
      "auditor": "Auditor name or null",
      "audit_firm": "Audit firm name or null",
      "penalty_usd": 50000 | null,
      "settled": true | false,
      "description": "Brief description of the action",
      "excerpt": "Verbatim text from the document supporting this entry",
      "release_number": "Release citation or null"
    }}
  ],
  "suspensions": [
    {{
      "company": "Issuer whose securities were suspended",
      "reason": "Stated reason or null",
      "excerpt": "Verbatim text from the document"
    }}
  ],
  "residual": ["Enforcement-related items that fit no category, as free text"],
  "extraction_notes": "Any notes about quality issues, or null"
}}

Remember:
- Only extract what is explicitly stated
- If information is missing, use null
- Copy excerpts verbatim, without rewording
- Be precise with names and citations"#,
            text = self.text
        )
    }
}
