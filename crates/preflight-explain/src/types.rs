use std::fmt;
use std::str::FromStr;

use preflight_core::RiskResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExplanationSource {
    #[serde(rename = "You.com")]
    YouCom,
    #[default]
    #[serde(rename = "Gemini")]
    Gemini,
}

impl ExplanationSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::YouCom => "You.com",
            Self::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ExplanationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which provider(s) the caller wants the explanation from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPreference {
    #[default]
    Auto,
    YouCom,
    Gemini,
}

impl ProviderPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::YouCom => "you_com",
            Self::Gemini => "gemini",
        }
    }

    /// Providers to try, in order.
    pub fn plan(self) -> &'static [ExplanationSource] {
        match self {
            Self::Auto => &[ExplanationSource::YouCom, ExplanationSource::Gemini],
            Self::YouCom => &[ExplanationSource::YouCom],
            Self::Gemini => &[ExplanationSource::Gemini],
        }
    }

    pub fn allows_fallback(self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl FromStr for ProviderPreference {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "you_com" | "you.com" | "youcom" => Ok(Self::YouCom),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!(
                "unsupported agent source '{other}'. Use auto, you_com, or gemini."
            )),
        }
    }
}

impl fmt::Display for ProviderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentExplanation {
    pub explanation: String,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub telemetry_findings: Option<Vec<String>>,
    #[serde(default)]
    pub source: ExplanationSource,
}

impl AgentExplanation {
    #[must_use]
    pub fn with_source(mut self, source: ExplanationSource) -> Self {
        self.source = source;
        self
    }
}

/// The unit returned to a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlightEvaluation {
    pub risk: RiskResult,
    pub explanation: AgentExplanation,
}

/// Untrusted provider output before coercion.
#[derive(Debug, Clone)]
pub enum RawOutput {
    Explanation(AgentExplanation),
    Json(Value),
    Text(String),
    Empty,
}

impl From<AgentExplanation> for RawOutput {
    fn from(value: AgentExplanation) -> Self {
        Self::Explanation(value)
    }
}

impl From<Value> for RawOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            other => Self::Json(other),
        }
    }
}

impl From<String> for RawOutput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RawOutput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
