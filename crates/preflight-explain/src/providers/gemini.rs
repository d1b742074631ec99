use std::sync::Arc;

use preflight_core::{FlightContext, RiskResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::coerce::coerce;
use crate::config::GeminiConfig;
use crate::error::ProviderError;
use crate::prompt::{flight_summary, SYSTEM_INSTRUCTIONS};
use crate::telemetry::{invoke_tool, TelemetrySource, TelemetryTool};
use crate::traits::ExplanationProvider;
use crate::types::{AgentExplanation, ExplanationSource};

/// Model-invocation provider with telemetry tools.
///
/// Each round posts the conversation so far. Function calls in the reply are
/// answered from the [`TelemetrySource`] and the conversation is re-sent;
/// the last allowed round disables tools so the model has to answer in text.
#[derive(Clone)]
pub struct GeminiExplanationProvider {
    config: GeminiConfig,
    client: Client,
    telemetry: Arc<dyn TelemetrySource>,
}

impl GeminiExplanationProvider {
    pub fn new(
        config: GeminiConfig,
        telemetry: Arc<dyn TelemetrySource>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            telemetry,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, request: &GeminiRequest) -> Result<GeminiResponse, ProviderError> {
        let res = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        Ok(res.json().await?)
    }

    fn answer_calls(&self, calls: &[GeminiFunctionCall]) -> GeminiContent {
        let parts = calls
            .iter()
            .map(|call| {
                tracing::debug!(tool = %call.name, "answering telemetry tool call");
                GeminiPart::function_response(
                    call.name.clone(),
                    invoke_tool(&call.name, self.telemetry.as_ref()),
                )
            })
            .collect();
        GeminiContent {
            role: Some("user".to_string()),
            parts,
        }
    }
}

#[async_trait::async_trait]
impl ExplanationProvider for GeminiExplanationProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn source(&self) -> ExplanationSource {
        ExplanationSource::Gemini
    }

    async fn explain(
        &self,
        context: &FlightContext,
        risk: &RiskResult,
    ) -> Result<AgentExplanation, ProviderError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "GOOGLE_API_KEY is not set. Provide a Gemini key to enable the agent.".to_string(),
            ));
        }

        let summary = flight_summary(context, risk);
        let mut contents = vec![GeminiContent::user_text(summary.to_string())];

        for round in 0..=self.config.max_tool_rounds {
            let tools_enabled = round < self.config.max_tool_rounds;
            let request = build_request(contents.clone(), tools_enabled);
            let response = self.generate(&request).await?;
            let content = response.into_first_content()?;

            let calls = content.function_calls();
            if tools_enabled && !calls.is_empty() {
                tracing::debug!(round, calls = calls.len(), "model requested telemetry tools");
                let replies = self.answer_calls(&calls);
                contents.push(content);
                contents.push(replies);
                continue;
            }

            let text = content.text();
            if text.trim().is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "gemini returned no text content".to_string(),
                ));
            }
            return Ok(coerce(text).with_source(self.source()));
        }

        Err(ProviderError::InvalidResponse(
            "gemini tool rounds exhausted without a final answer".to_string(),
        ))
    }
}

fn build_request(contents: Vec<GeminiContent>, tools_enabled: bool) -> GeminiRequest {
    let declarations = TelemetryTool::ALL
        .iter()
        .map(|tool| GeminiFunctionDeclaration {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(SYSTEM_INSTRUCTIONS)],
        }),
        tools: Some(vec![GeminiTool {
            function_declarations: declarations,
        }]),
        tool_config: Some(GeminiToolConfig {
            function_calling_config: GeminiFunctionCallingConfig {
                mode: if tools_enabled { "AUTO" } else { "NONE" },
            },
        }),
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(0.2),
            candidate_count: Some(1),
        }),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn user_text(text: String) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![GeminiPart::text(text)],
        }
    }

    fn function_calls(&self) -> Vec<GeminiFunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| p.function_call.clone())
            .collect()
    }

    /// Concatenated answer text, skipping thought-summary parts.
    fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| !p.is_thought())
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// One content part. Fields the client does not interpret (for example
/// `thoughtSignature`) are kept in `extra` so they are echoed back verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    fn function_response(name: String, response: Value) -> Self {
        Self {
            function_response: Some(GeminiFunctionResponse { name, response }),
            ..Self::default()
        }
    }

    fn is_thought(&self) -> bool {
        self.extra.get("thought").and_then(Value::as_bool) == Some(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiFunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl GeminiResponse {
    fn into_first_content(self) -> Result<GeminiContent, ProviderError> {
        let feedback = self.prompt_feedback;
        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "gemini returned no candidates (prompt feedback: {})",
                feedback.unwrap_or(Value::Null)
            ))
        })?;
        let finish = candidate.finish_reason;
        candidate.content.ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "gemini candidate had no content (finish reason: {})",
                finish.as_deref().unwrap_or("unknown")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_function_calls_parses() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"functionCall": {"name": "analyze_weather_env", "args": {}}, "thoughtSignature": "c2ln"},
                        {"functionCall": {"name": "analyze_wow"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).expect("parse response");
        let content = parsed.into_first_content().expect("content");
        let calls = content.function_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "analyze_weather_env");
        assert!(content.text().is_empty());

        let echoed = serde_json::to_value(&content).expect("serialize content");
        assert_eq!(echoed["parts"][0]["thoughtSignature"], "c2ln");
        assert_eq!(echoed["role"], "model");
    }

    #[test]
    fn text_skips_thought_parts_and_joins_answer() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Considering crosswind...", "thought": true},
                        {"text": "{\"explanation\":\"Gusty.\","},
                        {"text": "\"recommendations\":[\"Wait.\"]}"}
                    ]
                }
            }]
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).expect("parse response");
        let content = parsed.into_first_content().expect("content");
        let text = content.text();
        assert_eq!(text, r#"{"explanation":"Gusty.","recommendations":["Wait."]}"#);
        let explanation = coerce(text);
        assert_eq!(explanation.recommendations, vec!["Wait.".to_string()]);
    }

    #[test]
    fn missing_candidates_is_invalid_response() {
        let parsed: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
                .expect("parse response");
        let err = parsed.into_first_content().expect_err("no candidates");
        match err {
            ProviderError::InvalidResponse(msg) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn request_declares_tools_and_final_round_disables_them() {
        let contents = vec![GeminiContent::user_text("{}".to_string())];
        let open = serde_json::to_value(build_request(contents.clone(), true)).expect("json");
        let decls = open["tools"][0]["functionDeclarations"]
            .as_array()
            .expect("declarations");
        let names: Vec<&str> = decls.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(
            names,
            vec![
                "analyze_weather_env",
                "analyze_weight_fuel",
                "analyze_wow",
                "analyze_performance"
            ]
        );
        assert_eq!(open["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
        assert!(open["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .is_some_and(|t| t.contains("aviation safety assistant")));
        assert!(open["systemInstruction"].get("role").is_none());

        let last = serde_json::to_value(build_request(contents, false)).expect("json");
        assert_eq!(last["toolConfig"]["functionCallingConfig"]["mode"], "NONE");
    }

    #[test]
    fn function_response_part_serializes_camel_case() {
        let part = GeminiPart::function_response(
            "analyze_wow".to_string(),
            json!({"error": "no telemetry dataset configured"}),
        );
        let value = serde_json::to_value(&part).expect("json");
        assert_eq!(value["functionResponse"]["name"], "analyze_wow");
        assert!(value.get("text").is_none());
    }
}
