use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One planned flight as submitted by the caller.
///
/// Unknown fields are rejected. Numeric fields are taken as-is; the risk
/// rules only compare against thresholds, so out-of-range values still score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlightContext {
    pub departure_icao: String,
    pub destination_icao: String,
    pub departure_time_utc: DateTime<Utc>,

    pub pilot_total_hours: i64,
    pub pilot_hours_last_90_days: i64,
    pub pilot_instrument_rating: bool,
    pub pilot_night_current: bool,

    pub aircraft_type: String,
    pub aircraft_mtow_kg: f64,
    pub planned_takeoff_weight_kg: f64,

    pub conditions_ifr_expected: bool,
    pub conditions_night: bool,
    pub terrain_mountainous: bool,

    pub departure_visibility_sm: f64,
    pub destination_visibility_sm: f64,
    pub departure_ceiling_ft: i64,
    pub destination_ceiling_ft: i64,
    pub max_crosswind_knots: f64,
    pub gusts_knots: f64,
    pub freezing_level_ft: Option<i64>,
    pub icing_risk_0_1: f64,
    pub turbulence_risk_0_1: f64,
}

impl FlightContext {
    pub fn route(&self) -> String {
        format!("{} → {}", self.departure_icao, self.destination_icao)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskFactor {
    pub label: String,
    pub impact: u32,
}

impl RiskFactor {
    pub fn new(label: impl Into<String>, impact: u32) -> Self {
        Self {
            label: label.into(),
            impact,
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (+{})", self.label, self.impact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "CAUTION")]
    Caution,
    #[serde(rename = "NO-GO")]
    NoGo,
}

impl Tier {
    pub fn for_score(score: u32) -> Self {
        if score < 30 {
            Self::Go
        } else if score < 60 {
            Self::Caution
        } else {
            Self::NoGo
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::Caution => "CAUTION",
            Self::NoGo => "NO-GO",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamped score, its tier, and the fired factors in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskResult {
    pub score: u32,
    pub tier: Tier,
    pub factors: Vec<RiskFactor>,
}

impl RiskResult {
    /// The first `n` factors in evaluation order.
    pub fn top_factors(&self, n: usize) -> &[RiskFactor] {
        let end = n.min(self.factors.len());
        self.factors.get(..end).unwrap_or_default()
    }
}
