//! Conversion from agent outcomes to audit rows.

use agent::{AgentOutcome, RunStatus};
use store::dao::{AgentRunDao, NewAgentRun, NewAgentToolCall};
use store::models::{AgentRunStatus, AgentType};
use store::StoreResult;
use uuid::Uuid;

fn map_status(status: RunStatus) -> AgentRunStatus {
    match status {
        RunStatus::Running => AgentRunStatus::Running,
        RunStatus::Completed => AgentRunStatus::Completed,
        RunStatus::Failed => AgentRunStatus::Failed,
        RunStatus::Timeout => AgentRunStatus::Timeout,
    }
}

/// Persist one agent run plus its tool calls in the caller's
/// transaction.
pub async fn record_run<T>(
    conn: &mut sqlx::PgConnection,
    outcome: &AgentOutcome<T>,
    agent_type: AgentType,
    engine_name: &str,
    target_id: Option<Uuid>,
    target_type: Option<&str>,
) -> StoreResult<()> {
    let run = NewAgentRun {
        id: outcome.run_id,
        agent_type,
        status: map_status(outcome.status),
        engine_name: Some(engine_name.to_string()),
        model: Some(outcome.model.clone()),
        target_id,
        target_type: target_type.map(String::from),
        total_turns: outcome.total_turns as i32,
        total_tool_calls: outcome.tool_calls.len() as i32,
        input_tokens: outcome.input_tokens as i32,
        output_tokens: outcome.output_tokens as i32,
        estimated_cost: Some(outcome.estimated_cost),
        duration_ms: Some(outcome.duration_ms as i32),
        result_summary: None,
        error: outcome.error.clone(),
        ended_at: outcome.ended_at,
    };

    let tool_calls: Vec<NewAgentToolCall> = outcome
        .tool_calls
        .iter()
        .map(|tc| NewAgentToolCall {
            turn: tc.turn as i32,
            seq: tc.seq as i32,
            tool_name: tc.tool_name.clone(),
            tool_input: Some(tc.tool_input.clone()),
            output_chars: tc.output_chars as i32,
            duration_ms: Some(tc.duration_ms as i32),
            is_error: tc.is_error,
        })
        .collect();

    AgentRunDao::record(conn, &run, &tool_calls).await
}
