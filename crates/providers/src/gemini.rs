//! Google Gemini `generateContent` provider.
//!
//! Differences from Anthropic that this module papers over:
//! - the assistant role is called `model`
//! - the system prompt goes into `systemInstruction`
//! - tool requests carry no id, so one is minted locally; a tool result is
//!   sent back as a `functionResponse` keyed by the tool *name*, which is
//!   recovered from the assistant turn that issued the id

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{Message, MessageToolCall, Role};
use toolrelay_core::provider::*;
use tracing::debug;

use crate::http::{build_client, check_status, send_error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents = Vec::new();
        // tool call id -> tool name, filled as assistant turns go by
        let mut call_names: HashMap<&str, &str> = HashMap::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{"text": msg.content}],
                })),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(serde_json::json!({"text": msg.content}));
                    }
                    for tc in &msg.tool_calls {
                        call_names.insert(tc.id.as_str(), tc.name.as_str());
                        parts.push(serde_json::json!({
                            "functionCall": {"name": tc.name, "args": tc.parsed_arguments()}
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(serde_json::json!({"text": ""}));
                    }
                    contents.push(serde_json::json!({"role": "model", "parts": parts}));
                }
                Role::Tool => {
                    let name = msg
                        .tool_call_id
                        .as_deref()
                        .and_then(|id| call_names.get(id).copied())
                        .unwrap_or("unknown");
                    contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": {"result": msg.content},
                            }
                        }]
                    }));
                }
            }
        }

        let mut generation_config = serde_json::json!({"temperature": request.temperature});
        if let Some(max) = request.max_tokens {
            generation_config["maxOutputTokens"] = max.into();
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if !system_parts.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system_parts.join("\n\n")}]
            });
        }

        if !request.tools.is_empty() {
            let declarations: Vec<serde_json::Value> =
                request.tools.iter().map(function_declaration).collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
        }

        body
    }

    fn response_to_provider_response(
        resp: GeminiResponse,
        requested_model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let candidate = resp.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("No candidates in Gemini response".into())
        })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                let args = fc.args.unwrap_or_else(|| serde_json::json!({}));
                tool_calls.push(MessageToolCall {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: fc.name,
                    arguments: args.to_string(),
                });
            }
        }

        let mut message = Message::assistant(text);
        message.tool_calls = tool_calls;

        Ok(ProviderResponse {
            message,
            usage: resp.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            model: resp.model_version.unwrap_or_else(|| requested_model.to_string()),
            finish_reason: candidate.finish_reason,
        })
    }
}

/// Gemini rejects an OBJECT schema with no properties, so parameterless
/// tools are declared without `parameters`.
fn function_declaration(tool: &ToolDefinition) -> serde_json::Value {
    let has_properties = tool.parameters["properties"]
        .as_object()
        .is_some_and(|p| !p.is_empty());

    let mut decl = serde_json::json!({
        "name": tool.name,
        "description": tool.description,
    });
    if has_properties {
        decl["parameters"] = tool.parameters.clone();
    }
    decl
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        debug!(
            provider = "gemini",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let response = check_status("gemini", response).await?;

        let data: GeminiResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {e}"))
        })?;

        Self::response_to_provider_response(data, &request.model)
    }
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
