//! Google Gemini provider: native `generateContent` REST API with function
//! calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use dashchat_core::error::{DashChatError, Result};
use dashchat_core::message::{Content, ModelReply, Part, ToolCallRequest};
use dashchat_core::provider::{GenerateRequest, LlmProvider, ProviderConfig};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini provider.
///
/// Sends the whole conversation every call; the API keeps no session.
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
    api_url: String,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let api_url = format!(
            "{}/models/{}:generateContent",
            api_base.trim_end_matches('/'),
            config.model
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            config,
            api_url,
        }
    }

    /// Shorthand for the hosted API with default generation settings.
    pub fn gemini(api_key: &str, model: &str) -> Self {
        Self::new(ProviderConfig {
            model: model.to_string(),
            api_key: Some(api_key.to_string()),
            ..Default::default()
        })
    }

    fn build_body(&self, request: &GenerateRequest) -> ApiRequest {
        let contents = request.contents.iter().map(to_api_content).collect();

        let tools = if request.tools.is_empty() {
            vec![]
        } else {
            vec![ApiTool {
                function_declarations: request.tools.iter().map(|t| t.to_declaration()).collect(),
            }]
        };

        let safety_settings = SAFETY_CATEGORIES
            .iter()
            .map(|&category| ApiSafetySetting {
                category,
                threshold: "BLOCK_MEDIUM_AND_ABOVE",
            })
            .collect();

        ApiRequest {
            contents,
            tools,
            generation_config: ApiGenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
            safety_settings,
            system_instruction: request.system_instruction.as_ref().map(|text| {
                json!({ "parts": [{ "text": text }] })
            }),
        }
    }
}

fn to_api_content(content: &Content) -> Value {
    let parts: Vec<Value> = content
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::FunctionCall(call) => json!({
                "functionCall": { "name": call.name, "args": call.args }
            }),
            Part::FunctionResponse { name, response } => json!({
                "functionResponse": { "name": name, "response": response }
            }),
        })
        .collect();

    json!({ "role": content.role.as_str(), "parts": parts })
}

/// Internal request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
    safety_settings: Vec<ApiSafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct ApiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Internal response body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    prompt_feedback: Option<ApiPromptFeedback>,
    usage_metadata: Option<ApiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<ApiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    text: Option<String>,
    function_call: Option<ApiFunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

impl ApiPart {
    fn into_part(self) -> Option<Part> {
        if self.thought {
            return None;
        }
        if let Some(call) = self.function_call {
            let args = if call.args.is_null() { json!({}) } else { call.args };
            return Some(Part::FunctionCall(ToolCallRequest::new(&call.name, args)));
        }
        self.text.map(Part::Text)
    }
}

/// Decode a successful `generateContent` body into a [`ModelReply`].
fn decode_reply(api_resp: ApiResponse) -> Result<ModelReply> {
    if let Some(usage) = &api_resp.usage_metadata {
        debug!(
            "Token usage: prompt={} candidates={} total={}",
            usage.prompt_token_count.unwrap_or(0),
            usage.candidates_token_count.unwrap_or(0),
            usage.total_token_count.unwrap_or(0)
        );
    }

    let Some(candidate) = api_resp.candidates.into_iter().next() else {
        let reason = api_resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "unknown".to_string());
        return Err(DashChatError::Provider(format!(
            "No candidates in response (block reason: {})",
            reason
        )));
    };

    let finish_reason = candidate.finish_reason.unwrap_or_else(|| "STOP".to_string());
    let parts: Vec<Part> = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(ApiPart::into_part).collect())
        .unwrap_or_default();

    if parts.is_empty() {
        return Err(DashChatError::Provider(format!(
            "Candidate has no content (finish reason: {})",
            finish_reason
        )));
    }

    Ok(ModelReply::from_parts(parts))
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
        info!(
            "Calling {} model: {} ({} content(s), {} tool(s))",
            self.config.provider,
            self.config.model,
            request.contents.len(),
            request.tools.len()
        );

        let body = self.build_body(&request);
        let api_key = self.config.api_key.as_deref().unwrap_or("");

        let resp = self
            .client
            .post(&self.api_url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body_text = resp.text().await?;

        debug!("API response status: {}, body length: {}", status, body_text.len());

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiError>(&body_text) {
                return Err(DashChatError::Provider(format!(
                    "{} API error ({}{}): {}",
                    self.config.provider,
                    status,
                    err.error
                        .status
                        .map(|s| format!(" {}", s))
                        .unwrap_or_default(),
                    err.error.message
                )));
            }
            return Err(DashChatError::Provider(format!(
                "{} API error ({}): {}",
                self.config.provider,
                status,
                body_text.chars().take(200).collect::<String>()
            )));
        }

        let api_resp: ApiResponse = serde_json::from_str(&body_text).map_err(|e| {
            DashChatError::Provider(format!(
                "Failed to parse response: {} (body: {})",
                e,
                body_text.chars().take(200).collect::<String>()
            ))
        })?;

        let reply = decode_reply(api_resp)?;
        match &reply {
            ModelReply::FunctionCall(call) => debug!("Model requested function: {}", call.name),
            ModelReply::FinalText(text) => debug!("Model answered ({} chars)", text.len()),
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashchat_core::schema::{ParamType, ToolParameter, ToolSchema};
    use dashchat_core::tool::ToolResult;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(ProviderConfig {
            api_key: Some("test-key".into()),
            api_base: Some(server.uri()),
            ..Default::default()
        })
    }

    fn candidate(parts: Value) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": parts },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "totalTokenCount": 12 }
        })
    }

    fn weather_schema() -> ToolSchema {
        ToolSchema {
            name: "get_current_weather".into(),
            description: "Current weather".into(),
            parameters: vec![ToolParameter::required("location", ParamType::String, "City")],
        }
    }

    #[tokio::test]
    async fn test_decodes_function_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
                { "functionCall": { "name": "get_current_weather", "args": { "location": "Tokyo" } } }
            ]))))
            .mount(&server)
            .await;

        let reply = provider_for(&server)
            .generate(GenerateRequest {
                contents: vec![Content::user("What's the weather in Tokyo?")],
                tools: vec![weather_schema()],
                system_instruction: None,
            })
            .await
            .unwrap();

        assert_eq!(
            reply,
            ModelReply::FunctionCall(ToolCallRequest::new(
                "get_current_weather",
                json!({ "location": "Tokyo" })
            ))
        );
    }

    #[tokio::test]
    async fn test_concatenates_text_parts_and_skips_thoughts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
                { "text": "planning...", "thought": true },
                { "text": "It is 18°C " },
                { "text": "and cloudy." }
            ]))))
            .mount(&server)
            .await;

        let reply = provider_for(&server)
            .generate(GenerateRequest {
                contents: vec![Content::user("hi")],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(reply, ModelReply::FinalText("It is 18°C and cloudy.".into()));
    }

    #[tokio::test]
    async fn test_request_body_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "weather in Tokyo" }] },
                    { "role": "model", "parts": [{ "functionCall": { "name": "get_current_weather" } }] },
                    { "role": "function", "parts": [{ "functionResponse": {
                        "name": "get_current_weather",
                        "response": { "content": { "temperature": "18.0°C" } }
                    } }] }
                ],
                "tools": [{ "functionDeclarations": [{ "name": "get_current_weather" }] }],
                "generationConfig": { "topK": 1, "maxOutputTokens": 2048 },
                "systemInstruction": { "parts": [{ "text": "Be brief." }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([{ "text": "ok" }]))))
            .expect(1)
            .mount(&server)
            .await;

        let call = ToolCallRequest::new("get_current_weather", json!({ "location": "Tokyo" }));
        let result = ToolResult::Ok(json!({ "temperature": "18.0°C" }));
        let reply = provider_for(&server)
            .generate(GenerateRequest {
                contents: vec![
                    Content::user("weather in Tokyo"),
                    Content::model_call(&call),
                    Content::function_response("get_current_weather", &result),
                ],
                tools: vec![weather_schema()],
                system_instruction: Some("Be brief.".into()),
            })
            .await
            .unwrap();
        assert_eq!(reply, ModelReply::FinalText("ok".into()));
    }

    #[tokio::test]
    async fn test_safety_settings_sent() {
        let provider = GeminiProvider::gemini("k", "gemini-2.0-flash");
        let body = serde_json::to_value(provider.build_body(&GenerateRequest::default())).unwrap();
        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DashChatError::Provider(_)));
        assert!(err.to_string().contains("API key not valid"));
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_empty_candidate_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DashChatError::Provider(_)));
        assert!(err.to_string().contains("finish reason: SAFETY"));
    }
}
