use preflight_core::{FlightContext, RiskResult};
use reqwest::Client;
use serde::Deserialize;

use crate::config::YouComConfig;
use crate::error::ProviderError;
use crate::prompt::search_query;
use crate::traits::ExplanationProvider;
use crate::types::{AgentExplanation, ExplanationSource};

const SNIPPET_MAX_CHARS: usize = 280;

/// Search-grounded provider: one web search, explanation templated locally.
#[derive(Clone)]
pub struct YouComExplanationProvider {
    config: YouComConfig,
    client: Client,
}

impl YouComExplanationProvider {
    pub fn new(config: YouComConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let res = self
            .client
            .get(&self.config.endpoint)
            .header("X-API-Key", &self.config.api_key)
            .query(&[
                ("query", query.to_string()),
                ("num_web_results", self.config.num_results.to_string()),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: YouComSearchResponse = res.json().await?;
        Ok(parsed.into_hits())
    }
}

#[async_trait::async_trait]
impl ExplanationProvider for YouComExplanationProvider {
    fn name(&self) -> &'static str {
        "you.com"
    }

    fn source(&self) -> ExplanationSource {
        ExplanationSource::YouCom
    }

    async fn explain(
        &self,
        context: &FlightContext,
        risk: &RiskResult,
    ) -> Result<AgentExplanation, ProviderError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "YOU_COM_API_KEY is not set".to_string(),
            ));
        }

        let query = search_query(context, risk);
        tracing::debug!(provider = self.name(), "issuing search request");
        let hits = self.search(&query).await?;
        Ok(synthesize(context, risk, &hits))
    }
}

/// Builds the explanation from the top search results. With no hits the
/// narrative falls back to the risk result alone and carries no citations.
pub fn synthesize(
    context: &FlightContext,
    risk: &RiskResult,
    hits: &[SearchHit],
) -> AgentExplanation {
    let top_hit = hits.first();
    let top_factors = risk.top_factors(3);

    let drivers = if top_factors.is_empty() {
        "No rule-based risk factors fired.".to_string()
    } else {
        format!(
            "Primary drivers: {}.",
            top_factors
                .iter()
                .map(|f| f.label.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        )
    };
    let mut explanation = format!(
        "The {} flight scores {}/100 ({}) on the deterministic risk engine. {}",
        context.route(),
        risk.score,
        risk.tier,
        drivers,
    );
    if let Some(hit) = top_hit {
        explanation.push_str(&format!(
            " Related guidance from \"{}\": {} ({})",
            hit.title,
            hit.snippet(),
            hit.url
        ));
    }

    let mut recommendations: Vec<String> = top_factors
        .iter()
        .map(|f| {
            format!(
                "Mitigate \"{}\" (+{} pts) before committing to launch.",
                f.label, f.impact
            )
        })
        .collect();
    if recommendations.is_empty() {
        recommendations.push("Confirm weather minima and personal limits before departure.".to_string());
    }
    if let Some(hit) = top_hit {
        recommendations.push(format!(
            "Review \"{}\" ({}) for related safety guidance.",
            hit.title, hit.url
        ));
    }

    let citations = hits
        .iter()
        .take(3)
        .map(|hit| format!("{} - {}", hit.title, hit.url))
        .collect();

    AgentExplanation {
        explanation,
        recommendations,
        telemetry_findings: Some(citations),
        source: ExplanationSource::YouCom,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub snippets: Vec<String>,
}

impl SearchHit {
    fn snippet(&self) -> String {
        let raw = self
            .snippets
            .iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| self.description.trim());
        if raw.chars().count() > SNIPPET_MAX_CHARS {
            let cut: String = raw.chars().take(SNIPPET_MAX_CHARS).collect();
            format!("{}...", cut.trim_end())
        } else {
            raw.to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct YouComSearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
    #[serde(default)]
    results: Option<YouComResults>,
}

#[derive(Debug, Deserialize)]
struct YouComResults {
    #[serde(default)]
    web: Vec<SearchHit>,
}

impl YouComSearchResponse {
    fn into_hits(self) -> Vec<SearchHit> {
        if self.hits.is_empty() {
            self.results.map(|r| r.web).unwrap_or_default()
        } else {
            self.hits
        }
    }
}
