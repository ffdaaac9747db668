//! Salvage structured data from provider text.
//!
//! A provider response is nominally a single JSON object, but in practice it
//! arrives prefixed with reasoning preamble, fenced in Markdown markers, or
//! (the dominant failure mode) truncated mid-document by the response budget.
//! Whole-document parsing discards every field on truncation, including the
//! ones that were emitted completely before the cutoff. The salvage path here
//! recovers exactly those: each expected field is located independently and
//! extracted by a balanced scan, so a field survives if and only if its own
//! text is structurally complete.

use serde_json::{Map, Value};

/// The structured mapping recovered for one response: a subset (or the full
/// set) of the caller's expected fields, each independently present or absent.
pub type RecoveredFields = Map<String, Value>;

/// Recover as many fields as the text actually contains.
///
/// Tries the whole-document parse first; on any failure falls back to
/// per-field salvage over `expected`. Never panics and never errors: an
/// empty map is the only failure signal, and interpreting it is the caller's
/// business.
pub fn recover_fields(raw: &str, expected: &[&str]) -> RecoveredFields {
    if let Some(Value::Object(map)) = parse_document(raw) {
        return map;
    }

    let text = strip_wrappers(raw);
    let mut recovered = Map::new();
    for &name in expected {
        if let Some(value) = extract_field(text, name) {
            recovered.insert(name.to_string(), value);
        }
    }
    recovered
}

/// Parse the response as one complete JSON object.
///
/// Returns `None` when no balanced top-level object exists or the parse
/// fails; callers wanting partial data go through [`recover_fields`].
pub fn parse_document(raw: &str) -> Option<Value> {
    let text = strip_wrappers(raw);
    let start = text.find('{')?;
    let end = scan_balanced(text, start)?;
    let candidate = sanitize(&text[start..end]);
    serde_json::from_str::<Value>(&candidate)
        .ok()
        .filter(Value::is_object)
}

/// Strip known non-content wrappers: reasoning blocks and code fences.
fn strip_wrappers(raw: &str) -> &str {
    let mut text = raw;

    // Reasoning preamble: drop everything through the last closing tag.
    if let Some(pos) = text.rfind("</think>") {
        text = &text[pos + "</think>".len()..];
    }

    // Fence markers only count as wrappers when they open before the payload;
    // a fence after the object belongs to trailing prose.
    let first_brace = text.find('{');
    if let Some(fence) = text.find("```") {
        if first_brace.is_none_or(|b| fence < b) {
            let body_start = match text[fence..].find('\n') {
                Some(newline) => fence + newline + 1,
                // Fence marker at end of text: nothing left to parse.
                None => return "",
            };
            let body = &text[body_start..];
            text = match body.find("```") {
                Some(close) => &body[..close],
                // Unterminated fence: the output was cut off inside it.
                None => body,
            };
        }
    }

    text
}

/// Locate the independent value of `"name":` and extract it by apparent shape.
fn extract_field(text: &str, name: &str) -> Option<Value> {
    let needle = format!("\"{name}\"");
    let bytes = text.as_bytes();
    let mut from = 0usize;

    while let Some(found) = text[from..].find(&needle) {
        let mut i = from + found + needle.len();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        // The name occurred inside some other value; keep looking.
        if i >= bytes.len() || bytes[i] != b':' {
            from += found + needle.len();
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        return extract_value(text, i);
    }
    None
}

/// Extract one value starting at `start`, keeping it only when structurally
/// complete within the supplied text.
fn extract_value(text: &str, start: usize) -> Option<Value> {
    let bytes = text.as_bytes();
    match bytes[start] {
        b'{' | b'[' => {
            let end = scan_balanced(text, start)?;
            serde_json::from_str(&sanitize(&text[start..end])).ok()
        }
        b'"' => {
            let end = scan_string(text, start)?;
            serde_json::from_str(&text[start..end]).ok()
        }
        _ => {
            let mut end = start;
            while end < bytes.len()
                && !matches!(bytes[end], b',' | b'}' | b']')
                && !bytes[end].is_ascii_whitespace()
            {
                end += 1;
            }
            // A bare literal running into end-of-text may itself be cut off;
            // only a delimiter proves it complete.
            if end == bytes.len() {
                return None;
            }
            serde_json::from_str(&sanitize(&text[start..end])).ok()
        }
    }
}

/// Depth-balanced scan from an opening `{` or `[` to the matching top-level
/// close, skipping over string literals (and escapes within them).
///
/// Returns the index one past the matching close, or `None` when depth never
/// returns to zero (the truncation signal).
fn scan_balanced(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = match open {
        b'{' => b'}',
        b'[' => b']',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Scan a string literal from its opening quote; returns the index one past
/// the closing quote, or `None` when the string never closes.
fn scan_string(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(i + 1);
        }
    }
    None
}

/// One string-aware pass over a JSON candidate that repairs two provider
/// habits the strict parser rejects: trailing commas immediately before a
/// closing bracket/brace, and thousands-separator underscores between digits
/// (`55_750` → `55750`). String literal contents pass through untouched.
fn sanitize(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.char_indices().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some((i, c)) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '_' => {
                let prev_digit = out.chars().next_back().is_some_and(|p| p.is_ascii_digit());
                let next_digit = chars.peek().is_some_and(|&(_, n)| n.is_ascii_digit());
                if !(prev_digit && next_digit) {
                    out.push(c);
                }
            }
            ',' => {
                let next = src[i + 1..].chars().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
