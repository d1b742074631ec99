use preflight_core::DEFAULT_HISTORY_CAPACITY;
use preflight_explain::ExplainConfig;

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8000";
const MAX_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: String,
    pub history_capacity: usize,
    pub log_json: bool,
    pub explain: ExplainConfig,
}

impl ServerConfig {
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

        let history_capacity = get("PREFLIGHT_HISTORY_CAPACITY")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_HISTORY_CAPACITY)
            .clamp(1, MAX_HISTORY_CAPACITY);

        let log_json = get("PREFLIGHT_LOG_JSON")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        Self {
            http_addr: get("PREFLIGHTD_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
            history_capacity,
            log_json,
            explain: ExplainConfig::from_lookup(&lookup),
        }
    }
}
