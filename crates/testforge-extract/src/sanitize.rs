//! Response sanitization
//!
//! Model responses are free text that may wrap the useful payload in
//! prose or markdown fences. Two independent pure functions recover the
//! payload: [`extract_json`] for structured agent replies and
//! [`extract_code`] for generated source.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// First fenced block, optional language tag. The lazy inner match means
/// the captured body can never itself contain a fence.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[a-zA-Z0-9_+#.-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
});

/// Recover a JSON value from a model response and require a top-level key.
///
/// Strips the first triple-backtick fenced block (optional `json` tag) if
/// one is present, parses the remainder with `serde_json`, and fails with
/// [`ExtractError::MalformedResponse`] when parsing fails or `required_key`
/// is absent. A one-element array wrapping an object is unwrapped, since
/// models occasionally return `[ { ... } ]` instead of `{ ... }`.
///
/// No partial or lenient JSON repair is attempted.
pub fn extract_json(raw: &str, required_key: &str) -> Result<Value, ExtractError> {
    let mut text = raw.trim();
    let captured;
    if text.contains("```") {
        if let Some(caps) = FENCED_BLOCK.captures(text) {
            captured = caps[1].trim().to_string();
            text = &captured;
        }
    }

    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| ExtractError::malformed(format!("JSON parse error: {e}")))?;

    // Unwrap [ { ... } ] to { ... }.
    if let Value::Array(items) = &value {
        if items.len() == 1 && items[0].is_object() {
            value = items[0].clone();
        }
    }

    match value.get(required_key) {
        Some(_) => Ok(value),
        None => Err(ExtractError::malformed(format!(
            "required key '{required_key}' missing from response"
        ))),
    }
}

/// Recover source code from a model response.
///
/// Strips a single leading and/or trailing fence (optional language tag);
/// if fences remain embedded, extracts the first fenced region; finally
/// strips stray backticks and whitespace at the boundaries until none
/// remain. Idempotent: applying it twice yields the same result as
/// applying it once.
#[must_use]
pub fn extract_code(raw: &str) -> String {
    let mut code = raw.trim().to_string();

    if code.starts_with("```") {
        code = match code.split_once('\n') {
            Some((_, rest)) => rest.to_string(),
            None => code[3..].to_string(),
        };
    }
    if code.ends_with("```") {
        code.truncate(code.len() - 3);
        code.truncate(code.trim_end().len());
    }

    if code.contains("```") {
        if let Some(caps) = FENCED_BLOCK.captures(&code) {
            code = caps[1].trim().to_string();
        }
    }

    // Whitespace can shield a boundary backtick from a single pass, so
    // strip both to a fixpoint.
    let mut cleaned = code.trim();
    loop {
        let next = cleaned.trim_matches('`').trim();
        if next.len() == cleaned.len() {
            return cleaned.to_string();
        }
        cleaned = next;
    }
}
