//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use toolrelay_config::AppConfig;
use toolrelay_core::error::ProviderError;
use toolrelay_core::event::{DomainEvent, EventBus};
use toolrelay_core::message::{Conversation, Message, Role};
use toolrelay_core::provider::{Provider, ProviderRequest};
use toolrelay_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::prompt::TOOL_AGENT_PROMPT;

const DEFAULT_MAX_ITERATIONS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const EMPTY_REPLY_TEXT: &str = "I apologize, but I couldn't generate a response.";

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting a tool
    Completed,
    /// `max_iterations` tools ran; the answer is the latest model text
    IterationCap,
}

/// The result of one invocation.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final text for the user, never empty
    pub text: String,
    /// Tools executed
    pub iterations: u32,
    /// Model calls made
    pub model_calls: u32,
    pub stop_reason: StopReason,
    /// Model name reported by the provider
    pub model: String,
}

/// The bounded loop that alternates model calls and tool execution.
///
/// Holds only shared, immutable collaborators, so one instance can serve
/// many concurrent invocations; each `process` call owns its own state.
#[derive(Clone)]
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: u32,
    request_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: TOOL_AGENT_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            event_bus,
        }
    }

    /// Create a loop with every knob taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let agent = Self::new(provider, config.effective_model(), config.temperature, tools, event_bus)
            .with_max_tokens(config.max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_request_timeout(Duration::from_secs(config.agent.request_timeout_secs));
        match &config.agent.system_prompt {
            Some(prompt) => agent.with_system_prompt(prompt.clone()),
            None => agent,
        }
    }

    /// Set the maximum number of tool iterations (at least 1).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Replace the system instruction.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Bound each individual model call.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer a single question in a fresh conversation.
    pub async fn ask(&self, question: &str) -> Result<AgentOutcome, toolrelay_core::Error> {
        let mut conversation = Conversation::from_user(question);
        self.process(&mut conversation).await
    }

    /// Run the loop over `conversation` until the model stops requesting
    /// tools or the iteration cap is hit.
    ///
    /// The system instruction is inserted as the first message, and every
    /// assistant turn and tool result is appended, so on return the
    /// conversation holds the full exchange. Only the first tool request of
    /// a turn is honoured; the stored assistant turn is trimmed to match.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
    ) -> Result<AgentOutcome, toolrelay_core::Error> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            provider = self.provider.name(),
            "Processing conversation"
        );

        match conversation.messages.first() {
            Some(first) if first.role == Role::System => {
                conversation.messages[0] = Message::system(&self.system_prompt);
            }
            _ => conversation.messages.insert(0, Message::system(&self.system_prompt)),
        }

        let tool_definitions = self.tools.definitions();
        let mut iterations: u32 = 0;
        let mut model_calls: u32 = 0;
        let mut tokens_used: u32 = 0;
        let mut latest_text: Option<String> = None;

        loop {
            debug!(conversation_id = %conversation.id, iteration = iterations, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            model_calls += 1;
            let response = match self.call_model(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(conversation_id = %conversation.id, error = %e, "Model call failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "agent_loop".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e.into());
                }
            };

            if let Some(usage) = &response.usage {
                tokens_used += usage.total_tokens;
            }
            let model = response.model;
            let mut message = response.message;

            if !message.content.trim().is_empty() {
                latest_text = Some(message.content.clone());
            }

            let Some(call) = message.tool_calls.first().cloned() else {
                let text = if message.content.trim().is_empty() {
                    EMPTY_REPLY_TEXT.to_string()
                } else {
                    message.content.clone()
                };
                conversation.push(message);

                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation.id.to_string(),
                    model: model.clone(),
                    iterations,
                    tokens_used,
                    timestamp: Utc::now(),
                });
                info!(conversation_id = %conversation.id, iterations, model_calls, "Conversation completed");

                return Ok(AgentOutcome {
                    text,
                    iterations,
                    model_calls,
                    stop_reason: StopReason::Completed,
                    model,
                });
            };

            if message.tool_calls.len() > 1 {
                debug!(
                    requested = message.tool_calls.len(),
                    tool = %call.name,
                    "Model requested several tools, running the first only"
                );
                message.tool_calls.truncate(1);
            }
            conversation.push(message);

            let start = Instant::now();
            let output = self.tools.invoke(&call.name, call.parsed_arguments()).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            iterations += 1;

            debug!(tool = %call.name, duration_ms, iteration = iterations, "Tool executed");
            self.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                iteration: iterations,
                duration_ms,
                timestamp: Utc::now(),
            });

            conversation.push(Message::tool_result(&call.id, output));

            if iterations >= self.max_iterations {
                warn!(
                    conversation_id = %conversation.id,
                    max_iterations = self.max_iterations,
                    "Iteration cap reached, returning latest model text"
                );
                self.event_bus.publish(DomainEvent::IterationCapReached {
                    conversation_id: conversation.id.to_string(),
                    max_iterations: self.max_iterations,
                    timestamp: Utc::now(),
                });

                let text = latest_text.unwrap_or_else(|| {
                    format!(
                        "I could not complete this within {} steps. Please try a simpler request.",
                        self.max_iterations
                    )
                });
                return Ok(AgentOutcome {
                    text,
                    iterations,
                    model_calls,
                    stop_reason: StopReason::IterationCap,
                    model,
                });
            }
        }
    }

    async fn call_model(
        &self,
        request: ProviderRequest,
    ) -> Result<toolrelay_core::provider::ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.request_timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "no response from {} within {}s",
                self.provider.name(),
                self.request_timeout.as_secs()
            ))),
        }
    }
}
