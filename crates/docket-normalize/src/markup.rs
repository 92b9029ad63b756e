//! Markup-to-text extraction
//!
//! Hand-rolled, tolerant scanning: case-insensitive tag handling, no
//! full-document regexes, and no assumption that the archive's decades of
//! markup are well formed. Navigational and non-content blocks are dropped
//! whole; block-level boundaries become line breaks so reading order
//! survives.

/// Tags whose entire content is boilerplate, never digest text.
const DROP_BLOCKS: [&str; 5] = ["script", "style", "head", "nav", "footer"];

/// Closing tags that end a visual block; replaced by a newline.
const BLOCK_BREAKS: [&str; 12] = [
    "/p", "/div", "/tr", "/li", "/h1", "/h2", "/h3", "/h4", "/h5", "/h6", "/table", "/ul",
];

/// Extract human-readable text from markup, preserving reading order.
pub fn markup_to_text(markup: &str) -> String {
    let without_comments = strip_comments(markup);
    let mut stripped = without_comments;
    for tag in DROP_BLOCKS {
        stripped = strip_block(&stripped, tag);
    }
    let text = strip_tags(&stripped);
    collapse_whitespace(&decode_entities(&text))
}

/// Remove `<!-- ... -->` comments; an unterminated comment swallows the rest.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Remove `<tag ...> ... </tag>` blocks, case-insensitively.
fn strip_block(s: &str, tag: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);

    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&open) {
        let start = pos + found;
        // Reject prefix matches like <header> when looking for <head>.
        let after = lower.as_bytes().get(start + open.len());
        if !matches!(after, Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            out.push_str(&s[pos..start + open.len()]);
            pos = start + open.len();
            continue;
        }

        out.push_str(&s[pos..start]);
        match lower[start..].find(&close) {
            Some(close_rel) => {
                let close_abs = start + close_rel;
                match lower[close_abs..].find('>') {
                    Some(gt) => pos = close_abs + gt + 1,
                    None => return out,
                }
            }
            // Unterminated block: drop the remainder.
            None => return out,
        }
    }
    out.push_str(&s[pos..]);
    out
}

/// Remove remaining tags, turning block-level boundaries into newlines.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);

        // Only a letter, '/', or '!' can start a tag; a stray '<' is text.
        let next = rest[start + 1..].chars().next();
        if !matches!(next, Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!') {
            out.push('<');
            rest = &rest[start + 1..];
            continue;
        }

        match rest[start..].find('>') {
            Some(end) => {
                let tag_body = rest[start + 1..start + end].trim().to_ascii_lowercase();
                let name: String = tag_body
                    .chars()
                    .take_while(|c| !c.is_whitespace())
                    .collect();
                if name == "br" || name == "br/" || BLOCK_BREAKS.contains(&name.as_str()) {
                    out.push('\n');
                }
                rest = &rest[start + end + 1..];
            }
            // A bare '<' with no closing '>' is text, not markup.
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode the entities that actually occur in the archive.
fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            Some(end) if end <= 8 => {
                let entity = &tail[1..end];
                match entity {
                    "amp" => out.push('&'),
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "quot" => out.push('"'),
                    "apos" => out.push('\''),
                    "nbsp" => out.push(' '),
                    _ => {
                        if let Some(code) = entity
                            .strip_prefix('#')
                            .and_then(|d| d.parse::<u32>().ok())
                            .and_then(char::from_u32)
                        {
                            out.push(code);
                        } else {
                            // Unknown entity: keep the literal text.
                            out.push_str(&tail[..end + 1]);
                        }
                    }
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Trim trailing space per line and collapse runs of blank lines.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0;
    for line in s.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(trimmed);
            out.push('\n');
        }
    }
    out.trim_start_matches('\n').trim_end().to_string()
}
