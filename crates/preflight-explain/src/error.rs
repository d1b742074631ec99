use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("provider returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider API error: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry summary unavailable: {0}")]
    Unavailable(String),

    #[error("telemetry summary could not be loaded: {0}")]
    Load(String),
}

/// One failed attempt in a fallback chain.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: &'static str,
    pub error: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

#[derive(Debug, Error)]
pub enum ExplainError {
    /// No credentialed provider can serve the requested preference.
    #[error("explanation provider not configured: {0}")]
    NotConfigured(String),

    /// A forced provider failed.
    #[error("{provider} explanation failed: {source}")]
    Provider {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    /// Every eligible provider in the auto chain failed.
    #[error("all explanation providers failed: {}", join_failures(.failures))]
    Exhausted { failures: Vec<ProviderFailure> },
}

impl ExplainError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
