//! Chat channel implementations for ToolRelay.
//!
//! Each channel connects to a chat surface and relays messages to/from
//! the agent. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI**: interactive terminal chat (stdin/stdout)
//! - **Discord**: REST delivery plus the gateway websocket for incoming messages

pub mod cli;
pub mod discord;

pub use cli::CliChannel;
pub use discord::{DiscordChannel, DiscordConfig, Presence};
