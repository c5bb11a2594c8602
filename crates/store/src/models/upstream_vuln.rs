//! `upstream_vulns` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{Severity, VulnStatus};

/// One vulnerability extracted from an [`Event`](super::Event).
///
/// A single commit may fix several issues, so multiple rows may point at
/// one event; each row has exactly one event. Rows are created as
/// placeholders in `analyzing` before the LLM runs, so a failed analysis
/// never causes the source event to be re-polled.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UpstreamVuln {
    pub id: Uuid,
    pub event_id: Uuid,
    pub library_id: Uuid,
    pub commit_sha: String,
    pub vuln_type: Option<String>,
    pub severity: Option<Severity>,
    /// Affected-version range expression, e.g. `>= 7.0.0, < 8.10.0`.
    pub affected_versions: Option<String>,
    pub summary: Option<String>,
    pub reasoning: Option<String>,
    pub status: VulnStatus,
    pub error_message: Option<String>,
    pub upstream_poc: Option<Value>,
    /// JSON array of function names named by the analysis.
    pub affected_functions: Option<Value>,
    pub detected_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UpstreamVuln {
    /// Affected function names as strings, tolerating shape drift in the
    /// JSON column (the producer is an LLM).
    #[must_use]
    pub fn affected_function_names(&self) -> Vec<String> {
        match &self.affected_functions {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}
