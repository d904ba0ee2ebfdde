//! JSON API handlers.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use toolrelay_agent::StopReason;
use toolrelay_core::message::{Conversation, Message};
use toolrelay_core::provider::ToolDefinition;

use crate::SharedState;

/// One chat message as sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub response: String,
    pub model: String,
    pub iterations: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>, details: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            details: details.into(),
        }),
    )
}

/// Turn client messages into a conversation.
///
/// `assistant` stays an assistant turn; every other role is user text.
/// The conversation must end with a user turn.
pub fn conversation_from_wire(messages: &[WireMessage]) -> Result<Conversation, String> {
    let Some(last) = messages.last() else {
        return Err("messages must contain at least one message".into());
    };
    if last.role == "assistant" {
        return Err("the last message must come from the user".into());
    }

    let mut conversation = Conversation::new();
    for m in messages {
        let message = match m.role.as_str() {
            "assistant" => Message::assistant(&m.content),
            _ => Message::user(&m.content),
        };
        conversation.push(message);
    }
    Ok(conversation)
}

pub(crate) async fn agent_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = match &state.agent {
        Ok(agent) => agent,
        Err(body) => return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(body.clone()))),
    };

    let Json(payload) =
        payload.map_err(|rejection| api_error(StatusCode::BAD_REQUEST, "Invalid request", rejection.body_text()))?;

    let mut conversation = conversation_from_wire(&payload.messages)
        .map_err(|details| api_error(StatusCode::BAD_REQUEST, "Invalid request", details))?;
    info!(messages = payload.messages.len(), "Agent request");

    let outcome = agent.process(&mut conversation).await.map_err(|e| {
        error!(error = %e, "Agent processing failed");
        let headline = match &e {
            toolrelay_core::Error::Provider(p) => p.headline(),
            _ => "Failed to process request",
        };
        api_error(StatusCode::INTERNAL_SERVER_ERROR, headline, e.to_string())
    })?;

    Ok(Json(AgentResponse {
        response: outcome.text,
        model: outcome.model,
        iterations: outcome.iterations,
        stop_reason: outcome.stop_reason,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct ToolListResponse {
    pub count: usize,
    pub tools: Vec<ToolDefinition>,
}

pub(crate) async fn tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        count: state.tools.len(),
        tools: state.tools.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use toolrelay_agent::AgentLoop;
    use toolrelay_agent::testing::{ScriptedProvider, text_response, tool_call, tool_call_response};
    use toolrelay_config::AppConfig;
    use toolrelay_core::error::ProviderError;
    use toolrelay_core::event::EventBus;
    use toolrelay_core::message::Role;

    use crate::{GatewayState, build_router};

    fn state_with(provider: ScriptedProvider) -> crate::SharedState {
        let agent = AgentLoop::new(
            Arc::new(provider),
            "scripted-model",
            0.7,
            Arc::new(toolrelay_tools::default_registry()),
            Arc::new(EventBus::default()),
        );
        Arc::new(GatewayState::new(agent))
    }

    async fn post_agent(state: crate::SharedState, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/api/agent")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = build_router(state).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn wire_roles_map_to_conversation() {
        let conv = conversation_from_wire(&[
            WireMessage { role: "user".into(), content: "hi".into() },
            WireMessage { role: "assistant".into(), content: "hello".into() },
            WireMessage { role: "human".into(), content: "what's 2+2?".into() },
        ])
        .unwrap();
        let roles: Vec<Role> = conv.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn wire_rejects_empty_and_assistant_last() {
        assert!(conversation_from_wire(&[]).is_err());
        assert!(
            conversation_from_wire(&[WireMessage { role: "assistant".into(), content: "x".into() }]).is_err()
        );
    }

    #[tokio::test]
    async fn calculator_round_trip() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response(vec![tool_call("calculator", serde_json::json!({"expression": "10 * 4"}))], ""),
            text_response("10 * 4 is 40."),
        ]);
        let (status, json) = post_agent(
            state_with(provider),
            serde_json::json!({"messages": [{"role": "user", "content": "What's 10 * 4?"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], "10 * 4 is 40.");
        assert_eq!(json["iterations"], 1);
        assert_eq!(json["stop_reason"], "completed");
        assert_eq!(json["model"], "scripted-model");
    }

    #[tokio::test]
    async fn empty_messages_is_bad_request() {
        let (status, json) =
            post_agent(state_with(ScriptedProvider::single_text("unused")), serde_json::json!({"messages": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid request");
    }

    #[tokio::test]
    async fn malformed_body_gets_json_error() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/agent")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = build_router(state_with(ScriptedProvider::single_text("unused")))
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Invalid request");
        assert!(!json["details"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_server_error() {
        let state = Arc::new(GatewayState::from_config(&AppConfig::default(), Arc::new(EventBus::default())));
        let (status, json) =
            post_agent(state, serde_json::json!({"messages": [{"role": "user", "content": "hi"}]})).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "ANTHROPIC_API_KEY is not set");
        assert!(json["details"].as_str().unwrap().contains("ANTHROPIC_API_KEY"));
    }

    #[tokio::test]
    async fn provider_failure_is_server_error_with_details() {
        let provider = ScriptedProvider::failing(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        let (status, json) = post_agent(
            state_with(provider),
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to process request");
        assert!(json["details"].as_str().unwrap().contains("Overloaded"));
    }

    #[tokio::test]
    async fn quota_failure_gets_friendly_headline() {
        let provider = ScriptedProvider::failing(ProviderError::RateLimited { retry_after_secs: 10 });
        let (_, json) = post_agent(
            state_with(provider),
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;
        assert_eq!(json["error"], "API quota exceeded");
    }

    #[tokio::test]
    async fn lists_tools_in_order() {
        let req = Request::builder().uri("/api/tools").body(Body::empty()).unwrap();
        let response = build_router(state_with(ScriptedProvider::single_text("x")))
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let list: ToolListResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.count, 5);
        let names: Vec<&str> = list.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["calculator", "web_search", "task_planner", "get_current_time", "knowledge_base"]
        );
    }
}
