use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct YouComConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub num_results: usize,
}

impl YouComConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: "https://api.ydc-index.io/search".to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            num_results: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tool_rounds: usize,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.5-flash-lite".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            max_tool_rounds: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExplanationProviderConfig {
    YouCom(YouComConfig),
    Gemini(GeminiConfig),
}

/// Everything the explanation layer reads from the environment.
///
/// A provider whose credential is absent stays `None` and is skipped by the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct ExplainConfig {
    pub you_com: Option<YouComConfig>,
    pub gemini: Option<GeminiConfig>,
    pub provider_timeout: Duration,
    pub telemetry_summary_path: Option<PathBuf>,
}

impl ExplainConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider_timeout = get("PREFLIGHT_PROVIDER_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(DEFAULT_PROVIDER_TIMEOUT, |secs| {
                Duration::from_secs(secs.clamp(1, 300))
            });

        let you_com = get("YOU_COM_API_KEY").map(|api_key| {
            let mut cfg = YouComConfig::new(api_key);
            if let Some(endpoint) = get("YOU_COM_API_URL") {
                cfg.endpoint = endpoint;
            }
            cfg.timeout = provider_timeout;
            cfg
        });

        let gemini = get("GOOGLE_API_KEY")
            .or_else(|| get("GEMINI_API_KEY"))
            .map(|api_key| {
                let mut cfg = GeminiConfig::new(api_key);
                if let Some(model) = get("GEMINI_MODEL") {
                    cfg.model = model;
                }
                if let Some(base_url) = get("GEMINI_BASE_URL") {
                    cfg.base_url = base_url;
                }
                cfg.timeout = provider_timeout;
                cfg
            });

        Self {
            you_com,
            gemini,
            provider_timeout,
            telemetry_summary_path: get("PREFLIGHT_TELEMETRY_SUMMARY").map(PathBuf::from),
        }
    }

    /// Credentialed providers in fallback order.
    pub fn provider_configs(&self) -> Vec<ExplanationProviderConfig> {
        let mut out = Vec::with_capacity(2);
        if let Some(cfg) = &self.you_com {
            out.push(ExplanationProviderConfig::YouCom(cfg.clone()));
        }
        if let Some(cfg) = &self.gemini {
            out.push(ExplanationProviderConfig::Gemini(cfg.clone()));
        }
        out
    }
}
