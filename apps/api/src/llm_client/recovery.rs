//! JSON recovery for model output.
//!
//! Models asked for "JSON only" still wrap it in prose, code fences, trailing
//! commas or typographic quotes. `recover_json` tries a direct parse and then a
//! fixed sequence of cleanups, re-parsing after each one. If nothing parses the
//! caller gets `RecoveryError::Malformed`; no placeholder data is ever produced here.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

const EXCERPT_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("model output is not valid JSON: {reason}")]
    Malformed { reason: String, excerpt: String },
}

/// The top-level JSON value the prompt asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
    /// Either; the one whose bracket opens first is tried first.
    Any,
}

type Cleanup = fn(&str, JsonShape) -> String;

const CLEANUPS: &[(&str, Cleanup)] = &[
    ("strip_fences", strip_fences_step),
    ("extract_span", extract_span),
    ("trailing_commas", trailing_commas_step),
    ("normalize_quotes", normalize_quotes_step),
];

fn strip_fences_step(text: &str, _: JsonShape) -> String {
    strip_json_fences(text).to_string()
}

fn trailing_commas_step(text: &str, _: JsonShape) -> String {
    remove_trailing_commas(text)
}

fn normalize_quotes_step(text: &str, _: JsonShape) -> String {
    normalize_quotes(text)
}

/// Parses `raw` as `T`, applying cleanups cumulatively until one parses.
///
/// `JsonShape::Any` tries the shape whose bracket opens first, then the other
/// one, so a stray `[` in leading prose cannot hide an object payload.
pub fn recover_json<T: DeserializeOwned>(raw: &str, shape: JsonShape) -> Result<T, RecoveryError> {
    let text = raw.trim();
    let mut first_error: Option<String> = None;

    for &candidate in candidate_shapes(text, shape) {
        match recover_as(text, candidate) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(RecoveryError::Malformed {
        reason: first_error.unwrap_or_default(),
        excerpt: text.chars().take(EXCERPT_CHARS).collect(),
    })
}

fn candidate_shapes(text: &str, shape: JsonShape) -> &'static [JsonShape] {
    const OBJECT: &[JsonShape] = &[JsonShape::Object];
    const ARRAY: &[JsonShape] = &[JsonShape::Array];
    const OBJECT_FIRST: &[JsonShape] = &[JsonShape::Object, JsonShape::Array];
    const ARRAY_FIRST: &[JsonShape] = &[JsonShape::Array, JsonShape::Object];

    match shape {
        JsonShape::Object => OBJECT,
        JsonShape::Array => ARRAY,
        JsonShape::Any => match (text.find('{'), text.find('[')) {
            (Some(o), Some(a)) if a < o => ARRAY_FIRST,
            (None, Some(_)) => ARRAY_FIRST,
            _ => OBJECT_FIRST,
        },
    }
}

fn recover_as<T: DeserializeOwned>(raw: &str, shape: JsonShape) -> Result<T, String> {
    let mut text = raw.to_string();
    let mut last_error = match serde_json::from_str::<T>(&text) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    for (name, cleanup) in CLEANUPS {
        let cleaned = cleanup(&text, shape);
        if cleaned == text {
            continue;
        }
        text = cleaned;
        match serde_json::from_str::<T>(&text) {
            Ok(value) => {
                debug!("Recovered model JSON after '{name}' cleanup");
                return Ok(value);
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(last_error)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    stripped
        .trim_start()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(stripped.trim_start())
}

/// Keeps only the outermost `{...}` or `[...]` span, dropping surrounding prose.
/// `Any` never reaches here; `recover_json` resolves it to a concrete shape.
fn extract_span(text: &str, shape: JsonShape) -> String {
    let (open, close) = match shape {
        JsonShape::Array => ('[', ']'),
        JsonShape::Object | JsonShape::Any => ('{', '}'),
    };
    match text.find(open) {
        Some(start) => match text.rfind(close) {
            Some(end) if end > start => text[start..=end].to_string(),
            _ => text[start..].to_string(),
        },
        None => text.to_string(),
    }
}

fn remove_trailing_commas(text: &str) -> String {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*([}\]])").expect("valid regex"));
    re.replace_all(text, "$1").into_owned()
}

fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}
