use std::sync::Arc;

use anyhow::{Context, Result};
use preflight_core::EvaluationHistory;
use preflight_explain::{build_orchestrator, ExplanationSource};
use preflight_server::{init_tracing, FlightService, HttpServer, ServerConfig};
use tracing::Level;

fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(config.log_json, Level::INFO);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let orchestrator =
        build_orchestrator(&config.explain).context("failed to build explanation providers")?;
    tracing::info!(
        you_com = orchestrator.is_configured(ExplanationSource::YouCom),
        gemini = orchestrator.is_configured(ExplanationSource::Gemini),
        timeout = ?orchestrator.timeout(),
        history_capacity = config.history_capacity,
        "explanation providers configured"
    );

    let history = Arc::new(EvaluationHistory::new(config.history_capacity));
    let service = Arc::new(FlightService::new(orchestrator, history));
    HttpServer::new(service, runtime.handle().clone())
        .serve(&config.http_addr)
        .with_context(|| format!("http server on {} failed", config.http_addr))
}
