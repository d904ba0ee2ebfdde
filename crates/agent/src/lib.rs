//! The bounded tool-calling loop at the centre of ToolRelay.
//!
//! 1. **Send** the conversation, the tool descriptors and a system
//!    instruction to the model
//! 2. **If the reply requests a tool**: run the first request, append the
//!    request and its result, loop back to step 1
//! 3. **Otherwise** the reply text is the answer
//!
//! The loop also stops once it has run `max_iterations` tools, so an
//! invocation never makes more than `max_iterations` model calls.

pub mod loop_runner;
pub mod prompt;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use loop_runner::{AgentLoop, AgentOutcome, StopReason};
