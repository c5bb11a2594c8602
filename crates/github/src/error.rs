//! Error types for the GitHub client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status that is not retried
    #[error("GitHub API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// 403 without rate-limit indicators, or 401
    #[error("authentication failed ({status}): {body}")]
    Auth {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Retries exhausted on a transient condition
    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),

    /// Repository URL could not be parsed into (owner, repo)
    #[error("cannot parse GitHub repo URL: {0:?}")]
    InvalidRepoUrl(String),
}

pub type GitHubResult<T> = Result<T, GitHubError>;
