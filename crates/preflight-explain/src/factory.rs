use std::sync::Arc;

use crate::config::{ExplainConfig, ExplanationProviderConfig};
use crate::error::ProviderError;
use crate::orchestrator::ExplanationOrchestrator;
use crate::providers::{GeminiExplanationProvider, YouComExplanationProvider};
use crate::telemetry::{SummaryFileTelemetry, TelemetrySource, UnavailableTelemetry};
use crate::traits::ExplanationProvider;

pub fn build_explanation_provider(
    cfg: ExplanationProviderConfig,
    telemetry: Arc<dyn TelemetrySource>,
) -> Result<Arc<dyn ExplanationProvider>, ProviderError> {
    match cfg {
        ExplanationProviderConfig::YouCom(c) => Ok(Arc::new(YouComExplanationProvider::new(c)?)),
        ExplanationProviderConfig::Gemini(c) => {
            Ok(Arc::new(GeminiExplanationProvider::new(c, telemetry)?))
        }
    }
}

/// Telemetry backing the model's tool lookups. A summary file that cannot be
/// loaded is logged and treated as absent.
pub fn build_telemetry_source(cfg: &ExplainConfig) -> Arc<dyn TelemetrySource> {
    let Some(path) = cfg.telemetry_summary_path.as_ref() else {
        return Arc::new(UnavailableTelemetry);
    };
    match SummaryFileTelemetry::load(path) {
        Ok(summaries) => {
            tracing::info!(path = %path.display(), "loaded telemetry summaries");
            Arc::new(summaries)
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "telemetry summaries unavailable");
            Arc::new(UnavailableTelemetry)
        }
    }
}

pub fn build_orchestrator(cfg: &ExplainConfig) -> Result<ExplanationOrchestrator, ProviderError> {
    let telemetry = build_telemetry_source(cfg);
    let mut orchestrator = ExplanationOrchestrator::new(cfg.provider_timeout);
    for provider_cfg in cfg.provider_configs() {
        let provider = build_explanation_provider(provider_cfg, Arc::clone(&telemetry))?;
        tracing::debug!(provider = provider.name(), "explanation provider configured");
        orchestrator = orchestrator.with_provider(provider);
    }
    Ok(orchestrator)
}
