//! HTTP request/response transport for ToolRelay.
//!
//! `POST /api/agent` takes a whole conversation, runs one agent invocation
//! and returns the final text. There are no sessions: every request carries
//! its own history. Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::{Router, extract::State};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use toolrelay_agent::AgentLoop;
use toolrelay_config::{AppConfig, ConfigError};
use toolrelay_core::event::EventBus;
use toolrelay_core::provider::ToolDefinition;
use toolrelay_core::tool::ToolRegistry;

pub use api::{AgentRequest, AgentResponse, ErrorBody, WireMessage};

/// Shared application state for the gateway.
pub struct GatewayState {
    /// The agent, or why it could not be built (reported per request)
    agent: Result<AgentLoop, ErrorBody>,
    tools: Vec<ToolDefinition>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(agent: AgentLoop) -> Self {
        let tools = agent.tools().definitions();
        Self {
            agent: Ok(agent),
            tools,
        }
    }

    /// A gateway that answers every agent request with `error`.
    pub fn unavailable(error: &ConfigError, tools: Vec<ToolDefinition>) -> Self {
        Self {
            agent: Err(ErrorBody {
                error: error.headline(),
                details: error.to_string(),
            }),
            tools,
        }
    }

    /// Build the provider and agent from configuration.
    ///
    /// A missing API key does not stop the server; it becomes a 500 on
    /// each `/api/agent` request.
    pub fn from_config(config: &AppConfig, event_bus: Arc<EventBus>) -> Self {
        let tools: Arc<ToolRegistry> = Arc::new(toolrelay_tools::default_registry());
        match toolrelay_providers::build_provider(config) {
            Ok(provider) => Self::new(AgentLoop::from_config(config, provider, tools, event_bus)),
            Err(e) => {
                warn!(error = %e, "Agent unavailable, requests will fail until configured");
                Self::unavailable(&e, tools.definitions())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.agent.is_ok()
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/tools", get(api::tools_handler))
        .route("/api/agent", post(api::agent_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start(config: AppConfig, event_bus: Arc<EventBus>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(GatewayState::from_config(&config, event_bus));
    let app = build_router(state);

    info!(addr = %addr, provider = config.provider.as_str(), model = config.effective_model(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gateway shutting down");
        })
        .await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    agent_ready: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        agent_ready: state.is_ready(),
    })
}
