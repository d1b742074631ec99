//! Normalizes untrusted provider output into an [`AgentExplanation`].
//!
//! Each decode step is a separate function so the order is explicit:
//! structured value, strict JSON text, generic JSON text, embedded object.
//! When every step fails the raw text becomes the narrative of a fallback
//! explanation, so [`coerce`] never fails.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{AgentExplanation, RawOutput};

pub const DEFAULT_RECOMMENDATIONS: [&str; 3] = [
    "Reassess weather minima and personal limits.",
    "Coordinate with an instructor or safety pilot before launch.",
    "Prepare alternates and contingency fuel reserves.",
];

pub fn coerce(raw: impl Into<RawOutput>) -> AgentExplanation {
    let raw = raw.into();
    if let Some(parsed) = try_parse(&raw) {
        return parsed;
    }
    fallback(stringify(raw))
}

/// All structured attempts, without the fallback.
pub fn try_parse(raw: &RawOutput) -> Option<AgentExplanation> {
    match raw {
        RawOutput::Explanation(explanation) => Some(explanation.clone()),
        RawOutput::Json(Value::String(text)) => parse_text(text),
        RawOutput::Json(value) => from_mapping(value),
        RawOutput::Text(text) => parse_text(text),
        RawOutput::Empty => None,
    }
}

fn from_mapping(value: &Value) -> Option<AgentExplanation> {
    if !value.is_object() {
        return None;
    }
    AgentExplanation::deserialize(value).ok()
}

fn parse_text(text: &str) -> Option<AgentExplanation> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    from_json_text(trimmed)
        .or_else(|| from_generic_json(trimmed))
        .or_else(|| from_embedded_object(trimmed))
}

fn from_json_text(text: &str) -> Option<AgentExplanation> {
    serde_json::from_str(text).ok()
}

/// Accepts JSON that decodes to a string which itself holds the object.
fn from_generic_json(text: &str) -> Option<AgentExplanation> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::String(inner) => from_json_text(inner.trim()),
        value => from_mapping(&value),
    }
}

/// Pulls the outermost `{...}` out of surrounding prose or a fenced block.
fn from_embedded_object(text: &str) -> Option<AgentExplanation> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    text.get(start..=end).and_then(from_json_text)
}

fn stringify(raw: RawOutput) -> String {
    match raw {
        RawOutput::Explanation(explanation) => explanation.explanation,
        RawOutput::Json(Value::String(text)) | RawOutput::Text(text) => text,
        RawOutput::Json(value) => value.to_string(),
        RawOutput::Empty => String::new(),
    }
}

fn fallback(narrative: String) -> AgentExplanation {
    AgentExplanation {
        explanation: narrative,
        recommendations: DEFAULT_RECOMMENDATIONS
            .iter()
            .map(ToString::to_string)
            .collect(),
        telemetry_findings: None,
        source: Default::default(),
    }
}
