use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use preflight_core::{compute_risk, FlightContext};
use preflight_explain::providers::{GeminiExplanationProvider, YouComExplanationProvider};
use preflight_explain::{
    ExplanationProvider, ExplanationSource, GeminiConfig, ProviderError, SummaryFileTelemetry,
    UnavailableTelemetry, YouComConfig,
};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

/// Serves the canned `(status, body)` replies in order, one per connection.
fn fake_upstream(
    replies: Vec<(u16, String)>,
) -> (String, Arc<Mutex<Vec<Captured>>>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake upstream");
    let addr = listener.local_addr().expect("local addr").to_string();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    let handle = std::thread::spawn(move || {
        for (status, body) in replies {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            let mut headers = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header line");
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    let (k, v) = (k.trim().to_string(), v.trim().to_string());
                    if k.eq_ignore_ascii_case("content-length") {
                        content_length = v.parse().unwrap_or(0);
                    }
                    headers.push((k, v));
                }
            }
            let mut buf = vec![0u8; content_length];
            reader.read_exact(&mut buf).expect("request body");

            sink.lock().expect("capture lock").push(Captured {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8_lossy(&buf).into_owned(),
            });

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).expect("write reply");
            stream.flush().expect("flush reply");
        }
    });

    (format!("http://{addr}"), captured, handle)
}

fn context() -> FlightContext {
    serde_json::from_value(json!({
        "departure_icao": "KRNO",
        "destination_icao": "KTVL",
        "departure_time_utc": "2025-01-09T18:45:00Z",
        "pilot_total_hours": 320,
        "pilot_hours_last_90_days": 22,
        "pilot_instrument_rating": true,
        "pilot_night_current": true,
        "aircraft_type": "SR22",
        "aircraft_mtow_kg": 1633.0,
        "planned_takeoff_weight_kg": 1500.0,
        "conditions_ifr_expected": false,
        "conditions_night": false,
        "terrain_mountainous": true,
        "departure_visibility_sm": 10.0,
        "destination_visibility_sm": 2.5,
        "departure_ceiling_ft": 4500,
        "destination_ceiling_ft": 900,
        "max_crosswind_knots": 12.0,
        "gusts_knots": 20.0,
        "freezing_level_ft": 5500,
        "icing_risk_0_1": 0.6,
        "turbulence_risk_0_1": 0.55
    }))
    .expect("valid flight context")
}

fn tool_call_reply(tool: &str) -> String {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"functionCall": {"name": tool, "args": {}}}]
            },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

fn text_reply(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

const WOW_SUMMARY: &str = r#"{
    "wow": {
        "ground_fraction": 0.4,
        "airborne_fraction": 0.6,
        "num_takeoff_like_transitions": 3,
        "num_landing_like_transitions": 3,
        "risk_notes": []
    }
}"#;

#[tokio::test]
async fn gemini_answers_tool_calls_then_coerces_text() {
    let final_text = "```json\n{\"explanation\":\"Icing and low ceilings at Tahoe.\",\"recommendations\":[\"Delay until the freezing level rises.\",\"File an alternate.\",\"Get a fresh PIREP.\"],\"telemetry_findings\":[\"Historical sorties show frequent pattern work.\"]}\n```";
    let (base, captured, server) = fake_upstream(vec![
        (200, tool_call_reply("analyze_wow")),
        (200, text_reply(final_text)),
    ]);

    let mut cfg = GeminiConfig::new("g-test-key");
    cfg.base_url = base;
    cfg.model = "gemini-test".to_string();
    let telemetry = SummaryFileTelemetry::from_json(WOW_SUMMARY).expect("telemetry");
    let provider = GeminiExplanationProvider::new(cfg, Arc::new(telemetry)).expect("provider");

    let ctx = context();
    let risk = compute_risk(&ctx);
    let out = provider.explain(&ctx, &risk).await.expect("explanation");
    server.join().expect("fake upstream thread");

    assert_eq!(out.source, ExplanationSource::Gemini);
    assert_eq!(out.explanation, "Icing and low ceilings at Tahoe.");
    assert_eq!(out.recommendations.len(), 3);
    assert_eq!(out.telemetry_findings.map(|f| f.len()), Some(1));

    let requests = captured.lock().expect("capture lock").clone();
    assert_eq!(requests.len(), 2);
    assert!(requests[0]
        .request_line
        .starts_with("POST /v1beta/models/gemini-test:generateContent"));
    assert_eq!(requests[0].header("x-goog-api-key"), Some("g-test-key"));

    let first = requests[0].json();
    let summary: Value = serde_json::from_str(
        first["contents"][0]["parts"][0]["text"]
            .as_str()
            .expect("summary text"),
    )
    .expect("summary json");
    assert_eq!(summary["flight"]["route"], "KRNO → KTVL");
    assert_eq!(summary["risk"]["score"], risk.score);

    let second = requests[1].json();
    let contents = second["contents"].as_array().expect("contents");
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["role"], "model");
    let reply = &contents[2]["parts"][0]["functionResponse"];
    assert_eq!(reply["name"], "analyze_wow");
    assert_eq!(reply["response"]["num_takeoff_like_transitions"], 3);
}

#[tokio::test]
async fn gemini_disables_tools_on_final_round() {
    let replies = (0..5).map(|_| (200, tool_call_reply("analyze_performance"))).collect();
    let (base, captured, server) = fake_upstream(replies);

    let mut cfg = GeminiConfig::new("g-test-key");
    cfg.base_url = base;
    let provider =
        GeminiExplanationProvider::new(cfg, Arc::new(UnavailableTelemetry)).expect("provider");

    let ctx = context();
    let risk = compute_risk(&ctx);
    let err = provider.explain(&ctx, &risk).await.expect_err("no final text");
    server.join().expect("fake upstream thread");
    assert!(matches!(err, ProviderError::InvalidResponse(_)));

    let requests = captured.lock().expect("capture lock").clone();
    assert_eq!(requests.len(), 5);
    let modes: Vec<Value> = requests
        .iter()
        .map(|r| r.json()["toolConfig"]["functionCallingConfig"]["mode"].clone())
        .collect();
    assert_eq!(modes[..4], vec![json!("AUTO"); 4][..]);
    assert_eq!(modes[4], json!("NONE"));

    let tool_reply = &requests[1].json()["contents"][2]["parts"][0]["functionResponse"];
    assert!(tool_reply["response"]["error"].as_str().is_some());
}

#[tokio::test]
async fn gemini_non_success_status_is_api_error() {
    let (base, _captured, server) =
        fake_upstream(vec![(403, r#"{"error":{"message":"denied"}}"#.to_string())]);
    let mut cfg = GeminiConfig::new("bad-key");
    cfg.base_url = base;
    let provider =
        GeminiExplanationProvider::new(cfg, Arc::new(UnavailableTelemetry)).expect("provider");

    let ctx = context();
    let risk = compute_risk(&ctx);
    let err = provider.explain(&ctx, &risk).await.expect_err("forbidden");
    server.join().expect("fake upstream thread");
    match err {
        ProviderError::Api { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("denied"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn you_com_searches_and_synthesizes() {
    let body = json!({
        "results": {
            "web": [
                {
                    "title": "Mountain flying in winter",
                    "url": "https://example.org/mountain-winter",
                    "description": "Plan for icing and rapidly lowering ceilings.",
                    "snippets": ["Density altitude and icing dominate winter mountain risk."]
                },
                {
                    "title": "Ceilings and personal minimums",
                    "url": "https://example.org/minimums",
                    "description": "Set your own limits."
                }
            ]
        }
    })
    .to_string();
    let (base, captured, server) = fake_upstream(vec![(200, body)]);

    let mut cfg = YouComConfig::new("yc-test-key");
    cfg.endpoint = format!("{base}/search");
    let provider = YouComExplanationProvider::new(cfg).expect("provider");

    let ctx = context();
    let risk = compute_risk(&ctx);
    let out = provider.explain(&ctx, &risk).await.expect("explanation");
    server.join().expect("fake upstream thread");

    assert_eq!(out.source, ExplanationSource::YouCom);
    assert!(out.explanation.contains("Mountain flying in winter"));
    assert!(out
        .explanation
        .contains("Density altitude and icing dominate winter mountain risk."));
    assert_eq!(out.recommendations.len(), 4);
    assert_eq!(out.telemetry_findings.map(|c| c.len()), Some(2));

    let requests = captured.lock().expect("capture lock").clone();
    let line = &requests[0].request_line;
    assert!(line.starts_with("GET /search?query="));
    assert!(line.contains("num_web_results=5"));
    assert_eq!(requests[0].header("x-api-key"), Some("yc-test-key"));
}

#[tokio::test]
async fn you_com_empty_results_still_explain() {
    let (base, _captured, server) = fake_upstream(vec![(200, r#"{"hits":[]}"#.to_string())]);
    let mut cfg = YouComConfig::new("yc-test-key");
    cfg.endpoint = format!("{base}/search");
    let provider = YouComExplanationProvider::new(cfg).expect("provider");

    let ctx = context();
    let risk = compute_risk(&ctx);
    let out = provider.explain(&ctx, &risk).await.expect("explanation without hits");
    server.join().expect("fake upstream thread");
    assert_eq!(out.source, ExplanationSource::YouCom);
    assert!(out.explanation.contains(&format!("scores {}/100", risk.score)));
    assert!(!out.recommendations.is_empty());
    assert!(out.recommendations.iter().all(|r| !r.starts_with("Review")));
    assert_eq!(out.telemetry_findings, Some(Vec::new()));
}
