use std::sync::Arc;

use preflight_core::{evaluate_and_record, EvaluationHistory, FlightContext, HistoryEntry};
use preflight_explain::{ExplainError, ExplanationOrchestrator, FlightEvaluation, ProviderPreference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input rejected before any scoring happened.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Explanation(#[from] ExplainError),
}

/// Scores a flight, records the score, then asks the orchestrator for an
/// explanation. An explanation failure fails the whole evaluation, but the
/// score has already been recorded by then.
#[derive(Clone)]
pub struct FlightService {
    orchestrator: ExplanationOrchestrator,
    history: Arc<EvaluationHistory>,
}

impl FlightService {
    pub fn new(orchestrator: ExplanationOrchestrator, history: Arc<EvaluationHistory>) -> Self {
        Self {
            orchestrator,
            history,
        }
    }

    pub fn orchestrator(&self) -> &ExplanationOrchestrator {
        &self.orchestrator
    }

    pub async fn evaluate(
        &self,
        context: &FlightContext,
        preference: ProviderPreference,
    ) -> Result<FlightEvaluation, ServiceError> {
        let risk = evaluate_and_record(context, &self.history);
        tracing::debug!(
            route = %context.route(),
            score = risk.score,
            tier = %risk.tier,
            preference = %preference,
            "flight scored"
        );
        let explanation = self
            .orchestrator
            .generate_explanation(context, &risk, preference)
            .await?;
        Ok(FlightEvaluation { risk, explanation })
    }

    /// Validates a raw request (JSON body plus optional preference string)
    /// and evaluates it. Nothing is recorded for rejected input.
    pub async fn evaluate_json(
        &self,
        body: &[u8],
        agent_source: Option<&str>,
    ) -> Result<FlightEvaluation, ServiceError> {
        let preference = agent_source
            .unwrap_or_default()
            .parse::<ProviderPreference>()
            .map_err(ServiceError::Validation)?;
        let context: FlightContext = serde_json::from_slice(body)
            .map_err(|e| ServiceError::Validation(format!("flight context: {e}")))?;
        self.evaluate(&context, preference).await
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.snapshot()
    }
}
