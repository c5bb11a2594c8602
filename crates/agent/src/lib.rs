//! Reusable LLM agent infrastructure.
//!
//! The pieces compose left to right:
//!
//! - [`LlmClient`]: one OpenAI-compatible chat-completions call,
//!   normalized into [`LlmResponse`].
//! - [`ToolRegistry`] / [`AgentTool`]: a named set of read-only tools
//!   the model may call; outputs are truncated before they re-enter the
//!   conversation.
//! - [`AgentSpec`]: what a concrete agent provides: prompts, knobs,
//!   tools, and a parser over the final assistant text.
//! - [`AgentRunner`]: the turn-bounded loop: dispatch tool calls,
//!   inject an urgency nudge near the budget, stop early on a parseable
//!   answer, compress context when it nears the model window, and
//!   account tokens and cost into an [`AgentOutcome`].
//!
//! Persistence of runs and tool calls lives in the store crate; engines
//! convert an [`AgentOutcome`] into audit rows after every run.

pub mod client;
pub mod context;
pub mod cost;
pub mod error;
pub mod github_tools;
pub mod runner;
pub mod tools;

pub use client::{ChatMessage, LlmClient, LlmResponse, ToolCall};
pub use context::{AgentOutcome, RunStatus, ToolCallRecord};
pub use error::{AgentError, AgentResult};
pub use runner::{AgentRunner, AgentSpec, Compression};
pub use tools::{AgentTool, ToolRegistry, MAX_TOOL_OUTPUT_CHARS};
