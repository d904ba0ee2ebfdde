//! # ToolRelay Core
//!
//! Domain types, traits, and error definitions for the ToolRelay agent.
//! This crate has **no framework dependencies**. It defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here, with implementations in their own crates:
//! - `Provider`: the external LLM (Anthropic, Gemini, test doubles)
//! - `Tool`: a locally executed capability the model may request
//! - `Channel`: a chat surface (terminal, Discord)
//!
//! The agent loop only ever sees these traits, which keeps it testable with
//! scripted providers and in-memory channels.

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
