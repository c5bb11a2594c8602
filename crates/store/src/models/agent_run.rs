//! `agent_runs` and `agent_tool_calls` tables: the LLM audit log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{AgentRunStatus, AgentType};

/// One invocation of the LLM-tool loop.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentRun {
    pub id: Uuid,
    pub agent_type: AgentType,
    pub status: AgentRunStatus,
    pub engine_name: Option<String>,
    pub model: Option<String>,
    pub target_id: Option<Uuid>,
    pub target_type: Option<String>,
    pub total_turns: i32,
    pub total_tool_calls: i32,
    pub input_tokens: i32,
    pub output_tokens: i32,
    /// Estimated USD cost for the whole run.
    pub estimated_cost: Option<f64>,
    pub duration_ms: Option<i32>,
    pub result_summary: Option<Value>,
    pub error: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One tool invocation within an agent run.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentToolCall {
    pub id: Uuid,
    pub run_id: Uuid,
    pub turn: i32,
    pub seq: i32,
    pub tool_name: String,
    pub tool_input: Option<Value>,
    pub output_chars: i32,
    pub duration_ms: Option<i32>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
