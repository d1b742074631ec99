use preflight_core::{FlightContext, RiskResult};
use serde_json::{json, Value};

pub const SYSTEM_INSTRUCTIONS: &str = "\
You are an aviation safety assistant.
You receive a planned flight context and the output of a deterministic risk
engine (score, tier, and fired risk factors).
You can call telemetry tools that summarize patterns from a historical sortie
dataset. Use telemetry ONLY as illustrative, comparative color, never as the
actual flight data.

Respond strictly with JSON matching:
{
    \"explanation\": \"2-4 sentence narrative\",
    \"recommendations\": [\"actionable recommendation\", \"...\"],
    \"telemetry_findings\": [\"short optional insight\", \"...\"]
}

Make sure to include:
1. A short explanation (2-4 sentences) of why the flight is GO / CAUTION / NO-GO.
2. Three to five concrete safety recommendations using imperative verbs.
3. Optional short telemetry findings if the tools reveal interesting signals.";

/// Factor list rendered as `"<label> (+<impact>)"`.
pub fn factor_lines(risk: &RiskResult) -> Vec<String> {
    risk.factors.iter().map(ToString::to_string).collect()
}

/// Structured summary sent to the model-invocation provider.
pub fn flight_summary(context: &FlightContext, risk: &RiskResult) -> Value {
    json!({
        "flight": {
            "route": context.route(),
            "departure_time": context.departure_time_utc.to_rfc3339(),
            "pilot_hours": {
                "total": context.pilot_total_hours,
                "last_90_days": context.pilot_hours_last_90_days,
            },
            "conditions": {
                "ifr_expected": context.conditions_ifr_expected,
                "night": context.conditions_night,
                "mountainous": context.terrain_mountainous,
            },
            "weather": {
                "vis_depart": context.departure_visibility_sm,
                "vis_dest": context.destination_visibility_sm,
                "ceiling_depart": context.departure_ceiling_ft,
                "ceiling_dest": context.destination_ceiling_ft,
                "max_crosswind": context.max_crosswind_knots,
                "gusts": context.gusts_knots,
                "icing_risk": context.icing_risk_0_1,
                "turbulence_risk": context.turbulence_risk_0_1,
            },
        },
        "risk": {
            "score": risk.score,
            "tier": risk.tier,
            "factors": factor_lines(risk),
        },
    })
}

/// Natural-language query for the search-grounded provider.
pub fn search_query(context: &FlightContext, risk: &RiskResult) -> String {
    let top = risk
        .top_factors(3)
        .iter()
        .map(|f| f.label.as_str())
        .collect::<Vec<_>>();
    let drivers = if top.is_empty() {
        "no rule-based risk factors".to_string()
    } else {
        top.join(", ")
    };
    format!(
        "General aviation flight safety guidance: {} to {} departing {} UTC, \
         risk tier {} (score {}/100), key risk factors: {}. \
         How should a pilot mitigate these risks before departure?",
        context.departure_icao,
        context.destination_icao,
        context.departure_time_utc.format("%Y-%m-%d %H:%M"),
        risk.tier,
        risk.score,
        drivers
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use preflight_core::{RiskFactor, Tier};

    use super::*;

    fn context() -> FlightContext {
        serde_json::from_value(json!({
            "departure_icao": "KBJC",
            "destination_icao": "KASE",
            "departure_time_utc": "2025-02-03T14:00:00Z",
            "pilot_total_hours": 80,
            "pilot_hours_last_90_days": 4,
            "pilot_instrument_rating": false,
            "pilot_night_current": true,
            "aircraft_type": "PA-28-181",
            "aircraft_mtow_kg": 1157.0,
            "planned_takeoff_weight_kg": 1100.0,
            "conditions_ifr_expected": false,
            "conditions_night": false,
            "terrain_mountainous": true,
            "departure_visibility_sm": 10.0,
            "destination_visibility_sm": 6.0,
            "departure_ceiling_ft": 8000,
            "destination_ceiling_ft": 3500,
            "max_crosswind_knots": 12.0,
            "gusts_knots": 30.0,
            "freezing_level_ft": null,
            "icing_risk_0_1": 0.2,
            "turbulence_risk_0_1": 0.7
        }))
        .expect("valid context")
    }

    fn risk() -> RiskResult {
        RiskResult {
            score: 70,
            tier: Tier::NoGo,
            factors: vec![
                RiskFactor::new("Pilot total hours < 100", 15),
                RiskFactor::new("Pilot flew < 10 hours in last 90 days", 15),
                RiskFactor::new("Planned takeoff weight > 90% MTOW", 15),
                RiskFactor::new("Elevated turbulence risk (>0.5)", 15),
                RiskFactor::new("Large gust spread (>15 kt)", 10),
            ],
        }
    }

    #[test]
    fn summary_carries_route_weather_and_rendered_factors() {
        let summary = flight_summary(&context(), &risk());
        assert_eq!(summary["flight"]["route"], "KBJC → KASE");
        assert_eq!(summary["flight"]["departure_time"], "2025-02-03T14:00:00+00:00");
        assert_eq!(summary["flight"]["pilot_hours"]["last_90_days"], 4);
        assert_eq!(summary["flight"]["conditions"]["mountainous"], true);
        assert_eq!(summary["flight"]["weather"]["gusts"], 30.0);
        assert_eq!(summary["risk"]["tier"], "NO-GO");
        assert_eq!(summary["risk"]["factors"][0], "Pilot total hours < 100 (+15)");
        assert_eq!(summary["risk"]["factors"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn query_names_route_tier_and_top_three_factors() {
        let q = search_query(&context(), &risk());
        assert!(q.contains("KBJC to KASE"));
        assert!(q.contains("2025-02-03 14:00 UTC"));
        assert!(q.contains("risk tier NO-GO (score 70/100)"));
        assert!(q.contains("Planned takeoff weight > 90% MTOW"));
        assert!(!q.contains("Elevated turbulence"));
    }

    #[test]
    fn query_without_factors_says_so() {
        let clean = RiskResult {
            score: 0,
            tier: Tier::Go,
            factors: Vec::new(),
        };
        let mut ctx = context();
        ctx.departure_time_utc = Utc
            .with_ymd_and_hms(2025, 7, 1, 9, 5, 0)
            .single()
            .expect("valid timestamp");
        let q = search_query(&ctx, &clean);
        assert!(q.contains("no rule-based risk factors"));
        assert!(q.contains("2025-07-01 09:05 UTC"));
    }
}
