//! Recovery of JSON documents from free-form model output.
//!
//! Vision models rarely answer with bare JSON. They wrap it in ```json fences,
//! print objects with single-quoted strings, or surround it with list
//! brackets. [`parse_structured`] undoes those habits in a fixed order:
//!
//! 1. Keep only the body of the first ```json fence, if there is one
//! 2. Strip surrounding `[`, `]` and `'` characters
//! 3. Rewrite single-quoted literals as double-quoted ones
//! 4. Parse as JSON
//!
//! [`extract_structured`] never fails: when parsing does not succeed the raw
//! input comes back unchanged.

use serde_json::Value;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Parse model output into JSON, returning the parse error on failure.
pub fn parse_structured(raw: &str) -> Result<Value, serde_json::Error> {
    let candidate = fenced_json(raw).unwrap_or(raw);
    let stripped = candidate
        .trim()
        .trim_matches(|c: char| matches!(c, '[' | ']' | '\''));
    let normalized = normalize_quotes(stripped);
    serde_json::from_str(&normalized)
}

/// Best-effort extraction: pretty-printed JSON (2-space indent) or the raw input.
pub fn extract_structured(raw: &str) -> String {
    match parse_structured(raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
        Err(e) => {
            tracing::warn!("Failed to parse JSON from model output: {e}");
            raw.to_string()
        }
    }
}

/// Body of the first ```json fence.
///
/// An unterminated fence yields everything after the opening tag.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find(JSON_FENCE)? + JSON_FENCE.len();
    let rest = &text[start..];
    let body = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(body.trim())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Outside,
    Double,
    Single,
}

/// Rewrite single-quoted string literals as JSON double-quoted strings.
///
/// Text inside double-quoted strings is copied verbatim, so apostrophes in
/// well-formed values survive. Inside a single-quoted literal, a `'` only
/// closes the literal when the next non-blank character is a JSON delimiter
/// (`,` `:` `}` `]`) or the end of input; otherwise it is kept as an
/// apostrophe. Embedded `"` characters are escaped.
pub fn normalize_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut state = QuoteState::Outside;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            QuoteState::Outside => match c {
                '"' => {
                    state = QuoteState::Double;
                    out.push('"');
                }
                '\'' => {
                    state = QuoteState::Single;
                    out.push('"');
                }
                _ => out.push(c),
            },
            QuoteState::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                } else if c == '"' {
                    state = QuoteState::Outside;
                }
            }
            QuoteState::Single => match c {
                '\\' => match chars.get(i + 1) {
                    Some('\'') => {
                        out.push('\'');
                        i += 1;
                    }
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                        i += 1;
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' if closes_literal(&chars[i + 1..]) => {
                    state = QuoteState::Outside;
                    out.push('"');
                }
                _ => out.push(c),
            },
        }
        i += 1;
    }

    out
}

fn closes_literal(rest: &[char]) -> bool {
    rest.iter()
        .copied()
        .find(|c| !c.is_whitespace())
        .map_or(true, |c| matches!(c, ',' | ':' | '}' | ']'))
}
