//! Scripted providers for tests.
//!
//! `ScriptedProvider` replays queued responses in order and records every
//! request it saw, so tests can assert on call counts and on exactly what
//! the loop sent to the model.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{Message, MessageToolCall};
use toolrelay_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// One scripted step: a response or an error.
pub type ScriptStep = Result<ProviderResponse, ProviderError>;

pub struct ScriptedProvider {
    steps: Mutex<VecDeque<ScriptStep>>,
    /// Returned forever once `steps` runs dry, if set
    repeat: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_steps(responses.into_iter().map(Ok).collect())
    }

    pub fn from_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same response.
    pub fn always(response: ProviderResponse) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers with plain text once.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    /// A provider whose every call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::from_steps(vec![Err(error)])
    }

    /// Number of `complete()` calls so far.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        lock(&self.requests).push(request);

        let mut steps = lock(&self.steps);
        if let Some(step) = steps.pop_front() {
            // A lone failure keeps failing
            if steps.is_empty() && self.repeat.is_none() {
                if let Err(e) = &step {
                    steps.push_back(Err(e.clone()));
                }
            }
            return step;
        }
        match &self.repeat {
            Some(response) => Ok(response.clone()),
            None => Err(ProviderError::InvalidResponse("scripted provider has no more responses".into())),
        }
    }
}

/// A plain text response with no tool requests.
pub fn text_response(text: &str) -> ProviderResponse {
    response(Message::assistant(text))
}

/// A response that requests the given tool calls, with optional text.
pub fn tool_call_response(tool_calls: Vec<MessageToolCall>, text: &str) -> ProviderResponse {
    let mut msg = Message::assistant(text);
    msg.tool_calls = tool_calls;
    response(msg)
}

/// A tool request with a deterministic id.
pub fn tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
        finish_reason: None,
    }
}
