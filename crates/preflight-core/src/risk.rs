use crate::context::{FlightContext, RiskFactor, RiskResult, Tier};
use crate::history::EvaluationHistory;

pub const MAX_SCORE: u32 = 100;

struct Tally {
    total: u32,
    factors: Vec<RiskFactor>,
}

impl Tally {
    fn new() -> Self {
        Self {
            total: 0,
            factors: Vec::new(),
        }
    }

    fn record(&mut self, condition: bool, label: &str, impact: u32) {
        if condition {
            self.total = self.total.saturating_add(impact);
            self.factors.push(RiskFactor::new(label, impact));
        }
    }
}

/// Deterministic rule-based scoring.
///
/// Rules are evaluated in a fixed order and each fired rule appends its
/// factor with the unclamped impact. Only the total is clamped to
/// `0..=MAX_SCORE` before the tier mapping.
pub fn compute_risk(context: &FlightContext) -> RiskResult {
    let mut tally = Tally::new();

    if context.pilot_total_hours < 50 {
        tally.record(true, "Pilot total hours < 50", 25);
    } else if context.pilot_total_hours < 100 {
        tally.record(true, "Pilot total hours < 100", 15);
    }

    tally.record(
        context.pilot_hours_last_90_days < 10,
        "Pilot flew < 10 hours in last 90 days",
        15,
    );

    let mtow_ratio = context.planned_takeoff_weight_kg / context.aircraft_mtow_kg.max(1.0);
    tally.record(mtow_ratio > 0.9, "Planned takeoff weight > 90% MTOW", 15);

    tally.record(
        context.conditions_ifr_expected && !context.pilot_instrument_rating,
        "IFR expected but pilot not instrument-rated",
        30,
    );
    tally.record(
        context.conditions_night && !context.pilot_night_current,
        "Night flight with lapsed night currency",
        20,
    );

    if context.max_crosswind_knots > 20.0 {
        tally.record(true, "Crosswind component > 20 kt", 30);
    } else if context.max_crosswind_knots > 15.0 {
        tally.record(true, "Crosswind component > 15 kt", 20);
    }

    tally.record(
        context.departure_visibility_sm < 3.0 || context.destination_visibility_sm < 3.0,
        "Visibility under 3 SM",
        20,
    );
    tally.record(
        context.departure_ceiling_ft < 1000 || context.destination_ceiling_ft < 1000,
        "Ceiling under 1000 ft",
        20,
    );

    if context.icing_risk_0_1 > 0.7 {
        tally.record(true, "Severe icing risk (>0.7)", 35);
    } else if context.icing_risk_0_1 > 0.5 {
        tally.record(true, "Moderate icing risk (>0.5)", 25);
    }

    tally.record(
        context.turbulence_risk_0_1 > 0.5,
        "Elevated turbulence risk (>0.5)",
        15,
    );

    tally.record(
        context.gusts_knots - context.max_crosswind_knots > 15.0,
        "Large gust spread (>15 kt)",
        10,
    );

    let score = tally.total.min(MAX_SCORE);
    RiskResult {
        score,
        tier: Tier::for_score(score),
        factors: tally.factors,
    }
}

/// Scores the flight and appends `(now, score)` to the history.
pub fn evaluate_and_record(context: &FlightContext, history: &EvaluationHistory) -> RiskResult {
    let risk = compute_risk(context);
    history.record(risk.score);
    risk
}
