//! Response normalisation: raw model reply → parsed JSON value.
//!
//! Models asked for "ONLY valid JSON" still wrap it in a markdown fence more
//! often than not, sometimes with a sentence of preamble. Two strategies cut
//! the payload out:
//!
//! - [`FenceMode::Markers`]: first "```json" (else first "```") to the *last*
//!   "```". A triple backtick inside an extracted string breaks this.
//! - [`FenceMode::JsonSpan`]: first balanced `{…}` object, skipping braces
//!   inside strings. Immune to stray fences; falls back to markers when the
//!   reply holds no complete object.
//!
//! Whatever is left is parsed with `serde_json`. On failure the error keeps
//! the *original* reply so the caller can show what the model actually said.

use crate::config::FenceMode;
use crate::error::Iso2BomError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Strip fences per `mode`, then parse the payload as JSON.
///
/// # Errors
/// [`Iso2BomError::ParseFailed`] carrying `raw` unchanged.
pub fn parse_reply(raw: &str, mode: FenceMode) -> Result<Value, Iso2BomError> {
    let payload = match mode {
        FenceMode::Markers => strip_fences(raw),
        FenceMode::JsonSpan => balanced_object(raw).unwrap_or_else(|| strip_fences(raw)),
    };
    let payload = remove_invisible_chars(payload);
    debug!("JSON payload: {} of {} reply bytes", payload.len(), raw.len());

    serde_json::from_str(&payload).map_err(|e| Iso2BomError::ParseFailed {
        detail: e.to_string(),
        raw: raw.to_string(),
    })
}

// ── Marker stripping ─────────────────────────────────────────────────────────

/// Info string (language tag) left on the opening fence line, e.g. `JSON\n`.
static RE_INFO_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+.-]*[ \t]*\r?\n").unwrap());

/// Cut the payload out from between the opening fence and the last fence.
///
/// Returns the trimmed text unchanged when there is no fence. An opening
/// fence with no later closing fence yields everything after it.
pub fn strip_fences(text: &str) -> &str {
    let (body_start, tagged) = if let Some(pos) = text.find(JSON_FENCE) {
        (pos + JSON_FENCE.len(), true)
    } else if let Some(pos) = text.find(FENCE) {
        (pos + FENCE.len(), false)
    } else {
        return text.trim();
    };

    let body_end = match text.rfind(FENCE) {
        Some(end) if end >= body_start => end,
        _ => text.len(),
    };
    let mut body = &text[body_start..body_end];

    if !tagged {
        if let Some(m) = RE_INFO_STRING.find(body) {
            body = &body[m.end()..];
        }
    }
    body.trim()
}

// ── Balanced span ────────────────────────────────────────────────────────────

/// First complete top-level `{…}` object in `text`, if any.
///
/// Braces inside JSON strings (including escaped quotes) are ignored.
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut lexer = StringTracker::default();

    for (offset, ch) in text[start..].char_indices() {
        if lexer.step(ch) {
            continue;
        }
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tracks whether a character stream is inside a JSON string literal.
#[derive(Default)]
struct StringTracker {
    in_string: bool,
    escaped: bool,
}

impl StringTracker {
    /// Feed one character; true when it belongs to a string literal,
    /// quotes included.
    fn step(&mut self, ch: char) -> bool {
        if self.in_string {
            match ch {
                _ if self.escaped => self.escaped = false,
                '\\' => self.escaped = true,
                '"' => self.in_string = false,
                _ => {}
            }
            return true;
        }
        if ch == '"' {
            self.in_string = true;
            return true;
        }
        false
    }
}

// ── Invisible characters ─────────────────────────────────────────────────────

fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Remove zero-width characters and BOMs that break `serde_json`.
///
/// Only characters outside string literals are dropped: a ZWJ inside a note
/// is content and must reach the parsed value unchanged.
fn remove_invisible_chars(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_invisible) {
        return Cow::Borrowed(input);
    }
    let mut lexer = StringTracker::default();
    let cleaned = input
        .chars()
        .filter(|&ch| lexer.step(ch) || !is_invisible(ch))
        .collect();
    Cow::Owned(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_fence_is_stripped() {
        let v = parse_reply("```json\n{\"a\":1}\n```", FenceMode::Markers).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn bare_json_is_parsed() {
        let v = parse_reply("{\"a\":1}", FenceMode::Markers).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let err = parse_reply("{\"a\":}", FenceMode::Markers).unwrap_err();
        assert_eq!(err.raw_response(), Some("{\"a\":}"));
    }

    #[test]
    fn raw_text_is_the_unstripped_reply() {
        let raw = "Here you go:\n```json\n{\"a\":\n```";
        let err = parse_reply(raw, FenceMode::Markers).unwrap_err();
        assert_eq!(err.raw_response(), Some(raw));
    }

    #[test]
    fn generic_fence_with_preamble() {
        let raw = "Here is the extraction:\n```\n{\"pipes\": []}\n```\nLet me know!";
        assert_eq!(strip_fences(raw), "{\"pipes\": []}");
    }

    #[test]
    fn generic_fence_drops_info_string() {
        assert_eq!(strip_fences("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```javascript\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn json_fence_preferred_over_earlier_generic_fence() {
        let raw = "```\nnote\n```\n```json\n{\"a\":1}\n```";
        assert_eq!(strip_fences(raw), "{\"a\":1}");
    }

    #[test]
    fn unclosed_fence_takes_remainder() {
        assert_eq!(strip_fences("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn no_fence_returns_trimmed_text() {
        assert_eq!(strip_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn embedded_fence_breaks_marker_mode_but_not_span_mode() {
        let raw = "```json\n{\"notes\": [\"see ``` mark\"]}\n```";
        assert!(parse_reply(raw, FenceMode::Markers).is_ok());

        let raw = "```json\n{\"notes\": [\"a\"]}\n```\ntrailing ``` text";
        assert!(parse_reply(raw, FenceMode::Markers).is_err());
        let v = parse_reply(raw, FenceMode::JsonSpan).unwrap();
        assert_eq!(v, json!({"notes": ["a"]}));
    }

    #[test]
    fn balanced_object_ignores_braces_in_strings() {
        let text = r#"prefix {"a": "}{", "b": {"c": "\"}"}} suffix"#;
        assert_eq!(
            balanced_object(text),
            Some(r#"{"a": "}{", "b": {"c": "\"}"}}"#)
        );
    }

    #[test]
    fn balanced_object_none_when_unclosed() {
        assert_eq!(balanced_object("{\"a\": {\"b\": 1}"), None);
        assert_eq!(balanced_object("no braces"), None);
    }

    #[test]
    fn span_mode_falls_back_to_markers() {
        let err = parse_reply("```json\n{\"a\": [1,\n```", FenceMode::JsonSpan).unwrap_err();
        assert!(matches!(err, Iso2BomError::ParseFailed { .. }));
    }

    #[test]
    fn invisible_chars_inside_strings_are_preserved() {
        let raw = "{\"notes\": [\"fitter 👨\u{200D}🔧 check\", \"a\u{200C}b\"]}";
        let v = parse_reply(raw, FenceMode::Markers).unwrap();
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(v, expected);
        assert_eq!(v["notes"][0], json!("fitter 👨\u{200D}🔧 check"));
    }

    #[test]
    fn invisible_chars_between_tokens_are_removed() {
        let raw = "```json\n{\u{200B}\"a\":\u{2060} \"x\u{FEFF}y\"}\n```";
        let v = parse_reply(raw, FenceMode::JsonSpan).unwrap();
        assert_eq!(v, json!({"a": "x\u{FEFF}y"}));
    }

    #[test]
    fn bom_is_removed_before_parsing() {
        let v = parse_reply("\u{FEFF}{\"a\":1}", FenceMode::Markers).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }
}
