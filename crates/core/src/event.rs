//! Domain events: decoupled notifications between bounded contexts.
//!
//! The agent loop and the bot publish here; the CLI and logs subscribe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A tool ran on behalf of the model
    ToolExecuted {
        tool_name: String,
        iteration: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The agent produced its final answer
    ResponseGenerated {
        conversation_id: String,
        model: String,
        iterations: u32,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// The loop stopped because it ran out of iterations
    IterationCapReached {
        conversation_id: String,
        max_iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// The bot published a scheduled post
    PostPublished {
        channel_id: String,
        topic: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast`, so every subscriber sees every event.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
