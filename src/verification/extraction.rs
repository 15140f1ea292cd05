//! Agent output extraction
//!
//! Turns the agent's free-text reply into a [`Verdict`]. The reply is asked
//! to be a JSON object but nothing enforces that, so extraction is two-stage:
//! a lenient structured decode of the outermost `{...}` span, and a keyword
//! and URL heuristic when that span is not a JSON object. Extraction itself
//! never fails.

use crate::models::{Verdict, VerifiedStatus};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

pub const SUMMARY_LIMIT: usize = 500;
pub const DEFAULT_CONFIDENCE: u8 = 50;
pub const HEURISTIC_CONFIDENCE: u8 = 40;
pub const HEURISTIC_SOURCE: &str = "Raw agent response";
const MAX_HEURISTIC_LINKS: usize = 5;

/// Substrings that mark a licensing requirement in an unstructured reply.
const REQUIREMENT_KEYWORDS: &[&str] = &["sim", "yes", "requer", "require"];

/// Trailing characters stripped from heuristically matched URLs.
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '}', '>', '"', '\''];

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r"https?://\S+").expect("valid URL pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Structured,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub verdict: Verdict,
    pub method: ExtractionMethod,
}

/// Extract a verdict from raw agent output.
pub fn extract_verdict(raw: &str) -> Extraction {
    match serde_json::from_str::<Value>(json_candidate(raw)) {
        Ok(Value::Object(payload)) => Extraction {
            verdict: decode_payload(&payload, raw),
            method: ExtractionMethod::Structured,
        },
        _ => Extraction {
            verdict: heuristic_verdict(raw),
            method: ExtractionMethod::Heuristic,
        },
    }
}

/// Span from the first `{` to the last `}`, or the whole text.
pub fn json_candidate(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Map a licensing flag to Yes/No.
///
/// Anything not recognised as an affirmative resolves to `No`. This mirrors
/// the established policy of treating ambiguous answers as "no license
/// required"; confirm with the sheet owners before changing it.
pub fn normalize_status(raw: &str) -> VerifiedStatus {
    match raw.trim().to_lowercase().as_str() {
        "sim" | "yes" => VerifiedStatus::Yes,
        "não" | "nao" | "no" => VerifiedStatus::No,
        _ => VerifiedStatus::No,
    }
}

/// Decode a JSON object into a fully defaulted verdict. Missing or
/// wrong-typed fields fall back to their defaults.
fn decode_payload(payload: &Map<String, Value>, raw: &str) -> Verdict {
    let status = payload
        .get("status_licenciamento")
        .and_then(Value::as_str)
        .map(normalize_status)
        .unwrap_or(VerifiedStatus::No);

    let summary = match payload.get("resumo") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) => None,
        _ => Some(truncate_chars(raw, SUMMARY_LIMIT)),
    };

    Verdict {
        status,
        confidence: coerce_confidence(payload.get("nivel_confianca")),
        sources: coerce_list(payload.get("fontes")),
        links: coerce_list(payload.get("links")),
        summary,
    }
}

/// Integer confidence clamped into 0..=100; numbers, numeric strings and
/// fractional values are accepted, anything else yields the default.
fn coerce_confidence(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => {
            let s = s.trim().trim_end_matches('%').trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    };

    match number {
        Some(n) => n.clamp(0, 100) as u8,
        None => DEFAULT_CONFIDENCE,
    }
}

/// A list of strings, or one `;`-delimited string.
fn coerce_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Keyword and URL fallback for replies that are not a JSON object.
pub fn heuristic_verdict(raw: &str) -> Verdict {
    let lowered = raw.to_lowercase();
    let status = if REQUIREMENT_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        VerifiedStatus::Yes
    } else {
        VerifiedStatus::No
    };

    Verdict {
        status,
        confidence: HEURISTIC_CONFIDENCE,
        sources: vec![HEURISTIC_SOURCE.to_string()],
        links: extract_links(raw, MAX_HEURISTIC_LINKS),
        summary: Some(truncate_chars(raw, SUMMARY_LIMIT)),
    }
}

fn extract_links(text: &str, limit: usize) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(URL_TRAILING_PUNCTUATION).to_string())
        .take(limit)
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
