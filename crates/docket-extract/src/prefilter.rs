//! Enforcement-section pre-filter
//!
//! Decades of the archive were scanned and OCR'd, so section headings
//! arrive mangled: `ADM1NISTRAT1VE PR0CEED|NGS`, `C!VIL PROCEEDINGS`, and
//! worse. The pre-filter folds the usual OCR confusions into canonical
//! letters before searching for headings, and a document with no match
//! skips the extraction service entirely.

/// Headings that mark enforcement content, in canonical form.
const HEADINGS: [&str; 4] = [
    "ADMINISTRATIVE PROCEEDING",
    "CIVIL PROCEEDING",
    "CRIMINAL PROCEEDING",
    "TRADING SUSPENSION",
];

/// Whether the canonical text contains any enforcement section heading.
pub fn has_enforcement_sections(text: &str) -> bool {
    !matched_headings(text).is_empty()
}

/// The canonical headings found in the text, for extraction notes.
pub fn matched_headings(text: &str) -> Vec<&'static str> {
    let folded = fold_ocr(text);
    HEADINGS
        .iter()
        .copied()
        // Headings go through the same fold so L→I etc. match both sides.
        .filter(|heading| folded.contains(&fold_ocr(heading)))
        .collect()
}

/// Uppercase, fold common OCR confusions, and collapse whitespace runs.
fn fold_ocr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        let folded = match c.to_ascii_uppercase() {
            '1' | '|' | '!' | 'L' => 'I',
            '0' | 'Q' => 'O',
            '5' | 'Z' => 'S',
            '(' => 'C',
            '8' => 'B',
            c => c,
        };
        if folded.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(folded);
            last_was_space = false;
        }
    }
    out
}
