//! Error types for the agent loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport-level failure talking to the provider
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider response body could not be parsed
    #[error("failed to parse LLM response: {0}")]
    Parse(#[from] serde_json::Error),

    /// No API key configured
    #[error("LLM API key not set")]
    MissingApiKey,
}

pub type AgentResult<T> = Result<T, AgentError>;
