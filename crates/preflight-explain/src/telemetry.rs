//! Read-only telemetry lookups the model-invocation provider exposes as tools.
//!
//! The summaries describe a historical sortie dataset and are advisory
//! colour only; they never describe the flight being evaluated. How they are
//! computed is outside this crate: a [`TelemetrySource`] just hands them out.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::TelemetryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherEnvSummary {
    pub avg_amb_temp_c: f64,
    pub min_press_alt_ft: f64,
    pub max_press_alt_ft: f64,
    pub max_abs_aoss_deg: f64,
    pub max_aoa_deg: f64,
    pub max_airspeed: f64,
    pub risk_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightFuelSummary {
    pub avg_fuel_flow_left: f64,
    pub avg_fuel_flow_right: f64,
    pub avg_imbalance_abs: f64,
    pub max_imbalance_abs: f64,
    pub afterburner_usage_fraction: f64,
    pub risk_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WowSummary {
    pub ground_fraction: f64,
    pub airborne_fraction: f64,
    pub num_takeoff_like_transitions: u64,
    pub num_landing_like_transitions: u64,
    pub risk_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerformanceSummary {
    pub max_mach: f64,
    pub max_airspeed: f64,
    pub max_aoa: f64,
    pub max_abs_aoss: f64,
    pub num_high_aoa_events: u64,
    pub num_high_sideslip_events: u64,
    pub event_values_present: Vec<i64>,
    pub risk_notes: Vec<String>,
}

pub trait TelemetrySource: Send + Sync {
    fn weather_env(&self) -> Result<WeatherEnvSummary, TelemetryError>;
    fn weight_fuel(&self) -> Result<WeightFuelSummary, TelemetryError>;
    fn wow(&self) -> Result<WowSummary, TelemetryError>;
    fn performance(&self) -> Result<PerformanceSummary, TelemetryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryTool {
    WeatherEnv,
    WeightFuel,
    Wow,
    Performance,
}

impl TelemetryTool {
    pub const ALL: [Self; 4] = [
        Self::WeatherEnv,
        Self::WeightFuel,
        Self::Wow,
        Self::Performance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::WeatherEnv => "analyze_weather_env",
            Self::WeightFuel => "analyze_weight_fuel",
            Self::Wow => "analyze_wow",
            Self::Performance => "analyze_performance",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::WeatherEnv => {
                "Summarize ambient temperature, pressure altitude, sideslip, angle of attack and airspeed from historical sorties."
            }
            Self::WeightFuel => {
                "Summarize left/right fuel flow, fuel imbalance and afterburner usage from historical sorties."
            }
            Self::Wow => {
                "Summarize weight-on-wheels ground/airborne fractions and takeoff/landing transitions from historical sorties."
            }
            Self::Performance => {
                "Summarize peak Mach, airspeed, angle of attack, sideslip and event markers from historical sorties."
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Runs the lookup. Failures become an `{"error": ...}` payload for the
    /// model instead of failing the provider call.
    pub fn invoke(self, source: &dyn TelemetrySource) -> Value {
        let result = match self {
            Self::WeatherEnv => source.weather_env().and_then(to_value),
            Self::WeightFuel => source.weight_fuel().and_then(to_value),
            Self::Wow => source.wow().and_then(to_value),
            Self::Performance => source.performance().and_then(to_value),
        };
        result.unwrap_or_else(|err| json!({ "error": err.to_string() }))
    }
}

fn to_value<T: Serialize>(summary: T) -> Result<Value, TelemetryError> {
    serde_json::to_value(summary).map_err(|e| TelemetryError::Load(e.to_string()))
}

/// Dispatches a tool call by name; unknown names get an error payload.
pub fn invoke_tool(name: &str, source: &dyn TelemetrySource) -> Value {
    match TelemetryTool::from_name(name) {
        Some(tool) => tool.invoke(source),
        None => json!({ "error": format!("unknown tool '{name}'") }),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableTelemetry;

impl UnavailableTelemetry {
    fn missing<T>() -> Result<T, TelemetryError> {
        Err(TelemetryError::Unavailable(
            "no telemetry dataset configured".to_string(),
        ))
    }
}

impl TelemetrySource for UnavailableTelemetry {
    fn weather_env(&self) -> Result<WeatherEnvSummary, TelemetryError> {
        Self::missing()
    }

    fn weight_fuel(&self) -> Result<WeightFuelSummary, TelemetryError> {
        Self::missing()
    }

    fn wow(&self) -> Result<WowSummary, TelemetryError> {
        Self::missing()
    }

    fn performance(&self) -> Result<PerformanceSummary, TelemetryError> {
        Self::missing()
    }
}

/// Precomputed summaries loaded once from a JSON document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryFileTelemetry {
    #[serde(default)]
    weather_env: Option<WeatherEnvSummary>,
    #[serde(default)]
    weight_fuel: Option<WeightFuelSummary>,
    #[serde(default)]
    wow: Option<WowSummary>,
    #[serde(default)]
    performance: Option<PerformanceSummary>,
}

impl SummaryFileTelemetry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| TelemetryError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TelemetryError> {
        serde_json::from_str(raw).map_err(|e| TelemetryError::Load(e.to_string()))
    }

    fn section<T: Clone>(value: Option<&T>, name: &str) -> Result<T, TelemetryError> {
        value
            .cloned()
            .ok_or_else(|| TelemetryError::Unavailable(format!("{name} summary not present")))
    }
}

impl TelemetrySource for SummaryFileTelemetry {
    fn weather_env(&self) -> Result<WeatherEnvSummary, TelemetryError> {
        Self::section(self.weather_env.as_ref(), "weather_env")
    }

    fn weight_fuel(&self) -> Result<WeightFuelSummary, TelemetryError> {
        Self::section(self.weight_fuel.as_ref(), "weight_fuel")
    }

    fn wow(&self) -> Result<WowSummary, TelemetryError> {
        Self::section(self.wow.as_ref(), "wow")
    }

    fn performance(&self) -> Result<PerformanceSummary, TelemetryError> {
        Self::section(self.performance.as_ref(), "performance")
    }
}
