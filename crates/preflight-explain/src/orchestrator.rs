use std::sync::Arc;
use std::time::Duration;

use preflight_core::{FlightContext, RiskResult};

use crate::coerce::coerce;
use crate::config::DEFAULT_PROVIDER_TIMEOUT;
use crate::error::{ExplainError, ProviderError, ProviderFailure};
use crate::traits::ExplanationProvider;
use crate::types::{AgentExplanation, ExplanationSource, ProviderPreference};

/// Chooses providers for a preference and runs them strictly in sequence.
///
/// Each registered provider occupies the slot for its [`ExplanationSource`];
/// an empty slot means the provider has no credential and is skipped. Every
/// call is bounded by `timeout`, and a timeout counts as a provider failure.
#[derive(Clone)]
pub struct ExplanationOrchestrator {
    you_com: Option<Arc<dyn ExplanationProvider>>,
    gemini: Option<Arc<dyn ExplanationProvider>>,
    timeout: Duration,
}

impl Default for ExplanationOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_TIMEOUT)
    }
}

impl ExplanationOrchestrator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            you_com: None,
            gemini: None,
            timeout,
        }
    }

    /// Registers `provider` in the slot named by its source, replacing any
    /// previous occupant.
    pub fn with_provider(mut self, provider: Arc<dyn ExplanationProvider>) -> Self {
        match provider.source() {
            ExplanationSource::YouCom => self.you_com = Some(provider),
            ExplanationSource::Gemini => self.gemini = Some(provider),
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_configured(&self, source: ExplanationSource) -> bool {
        self.slot(source).is_some()
    }

    fn slot(&self, source: ExplanationSource) -> Option<&Arc<dyn ExplanationProvider>> {
        match source {
            ExplanationSource::YouCom => self.you_com.as_ref(),
            ExplanationSource::Gemini => self.gemini.as_ref(),
        }
    }

    pub async fn generate_explanation(
        &self,
        context: &FlightContext,
        risk: &RiskResult,
        preference: ProviderPreference,
    ) -> Result<AgentExplanation, ExplainError> {
        let eligible: Vec<&Arc<dyn ExplanationProvider>> = preference
            .plan()
            .iter()
            .filter_map(|source| {
                let provider = self.slot(*source);
                if provider.is_none() {
                    tracing::debug!(source = %source, "skipping provider without credentials");
                }
                provider
            })
            .collect();

        if eligible.is_empty() {
            return Err(ExplainError::NotConfigured(not_configured_message(preference)));
        }

        let remaining = eligible.len();
        let mut failures = Vec::new();
        for (idx, provider) in eligible.into_iter().enumerate() {
            match self.attempt(provider.as_ref(), context, risk).await {
                Ok(explanation) => return Ok(explanation),
                Err(source) if !preference.allows_fallback() => {
                    return Err(ExplainError::Provider {
                        provider: provider.name(),
                        source,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %error,
                        remaining = remaining - idx - 1,
                        "explanation provider failed"
                    );
                    failures.push(ProviderFailure {
                        provider: provider.name(),
                        error,
                    });
                }
            }
        }

        Err(ExplainError::Exhausted { failures })
    }

    async fn attempt(
        &self,
        provider: &dyn ExplanationProvider,
        context: &FlightContext,
        risk: &RiskResult,
    ) -> Result<AgentExplanation, ProviderError> {
        tracing::debug!(provider = provider.name(), timeout = ?self.timeout, "requesting explanation");
        match tokio::time::timeout(self.timeout, provider.explain(context, risk)).await {
            Ok(Ok(explanation)) => Ok(coerce(explanation).with_source(provider.source())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }
}

fn not_configured_message(preference: ProviderPreference) -> String {
    match preference {
        ProviderPreference::Auto => {
            "no explanation provider is configured; set YOU_COM_API_KEY or GOOGLE_API_KEY"
                .to_string()
        }
        ProviderPreference::YouCom => "YOU_COM_API_KEY is not set".to_string(),
        ProviderPreference::Gemini => "GOOGLE_API_KEY is not set".to_string(),
    }
}
