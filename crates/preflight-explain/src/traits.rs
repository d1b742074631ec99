use async_trait::async_trait;
use preflight_core::{FlightContext, RiskResult};

use crate::error::ProviderError;
use crate::types::{AgentExplanation, ExplanationSource};

#[async_trait]
pub trait ExplanationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn source(&self) -> ExplanationSource;

    async fn explain(
        &self,
        context: &FlightContext,
        risk: &RiskResult,
    ) -> Result<AgentExplanation, ProviderError>;
}
