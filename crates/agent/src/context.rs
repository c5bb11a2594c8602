//! Per-run accumulator and the outcome snapshot engines persist.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Instant;
use uuid::Uuid;

use crate::client::LlmResponse;
use crate::cost::estimate_cost;

/// Final status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

/// One tool invocation: maps onto an `agent_tool_calls` row.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub turn: u32,
    pub seq: u32,
    pub tool_name: String,
    pub tool_input: Value,
    pub output_chars: usize,
    pub duration_ms: u64,
    pub is_error: bool,
}

/// Mutable accumulator for a single agent run.
pub(crate) struct AgentContext {
    pub run_id: Uuid,
    pub model: String,
    input_tokens: u32,
    output_tokens: u32,
    turn: u32,
    tool_calls: Vec<ToolCallRecord>,
    cost: f64,
    status: RunStatus,
    error: Option<String>,
    started: Instant,
    ended_at: Option<DateTime<Utc>>,
}

impl AgentContext {
    pub fn new(model: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            model: model.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            turn: 0,
            tool_calls: Vec::new(),
            cost: 0.0,
            status: RunStatus::Running,
            error: None,
            started: Instant::now(),
            ended_at: None,
        }
    }

    /// Accumulate token counts and estimated cost from one response.
    pub fn add_usage(&mut self, response: &LlmResponse) {
        self.input_tokens += response.input_tokens;
        self.output_tokens += response.output_tokens;
        self.cost += estimate_cost(&self.model, response.input_tokens, response.output_tokens);
    }

    /// Advance and return the current turn number (1-based).
    pub fn increment_turn(&mut self) -> u32 {
        self.turn += 1;
        self.turn
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn record_tool_call(&mut self, record: ToolCallRecord) {
        self.tool_calls.push(record);
    }

    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.ended_at = Some(Utc::now());
    }

    pub fn into_outcome<T>(self, content: String, parsed: Option<T>) -> AgentOutcome<T> {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        AgentOutcome {
            run_id: self.run_id,
            model: self.model,
            content,
            parsed,
            status: self.status,
            error: self.error,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_turns: self.turn,
            tool_calls: self.tool_calls,
            estimated_cost: self.cost,
            duration_ms,
            ended_at: self.ended_at,
        }
    }
}

/// Immutable snapshot of a finished run.
#[derive(Debug)]
pub struct AgentOutcome<T> {
    pub run_id: Uuid,
    pub model: String,
    /// Final assistant text, whatever its shape.
    pub content: String,
    /// Parser output, when the content was well-formed.
    pub parsed: Option<T>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_turns: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    pub estimated_cost: f64,
    pub duration_ms: u64,
    pub ended_at: Option<DateTime<Utc>>,
}

impl<T> AgentOutcome<T> {
    /// True when the run produced a usable result.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != RunStatus::Failed && self.parsed.is_some()
    }
}
