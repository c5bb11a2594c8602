//! `agent_runs` / `agent_tool_calls` operations: the LLM audit log.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{AgentRunStatus, AgentType};

/// One finished agent run to persist.
#[derive(Debug, Clone)]
pub struct NewAgentRun {
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
    pub estimated_cost: Option<f64>,
    pub duration_ms: Option<i32>,
    pub result_summary: Option<Value>,
    pub error: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One tool call within the run.
#[derive(Debug, Clone)]
pub struct NewAgentToolCall {
    pub turn: i32,
    pub seq: i32,
    pub tool_name: String,
    pub tool_input: Option<Value>,
    pub output_chars: i32,
    pub duration_ms: Option<i32>,
    pub is_error: bool,
}

pub struct AgentRunDao;

impl AgentRunDao {
    /// Write one run row plus its tool-call rows. Callers wrap this in a
    /// transaction so the audit record lands atomically.
    pub async fn record(
        conn: &mut PgConnection,
        run: &NewAgentRun,
        tool_calls: &[NewAgentToolCall],
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO agent_runs \
                (id, agent_type, status, engine_name, model, target_id, target_type, \
                 total_turns, total_tool_calls, input_tokens, output_tokens, \
                 estimated_cost, duration_ms, result_summary, error, ended_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(run.id)
        .bind(run.agent_type)
        .bind(run.status)
        .bind(&run.engine_name)
        .bind(&run.model)
        .bind(run.target_id)
        .bind(&run.target_type)
        .bind(run.total_turns)
        .bind(run.total_tool_calls)
        .bind(run.input_tokens)
        .bind(run.output_tokens)
        .bind(run.estimated_cost)
        .bind(run.duration_ms)
        .bind(&run.result_summary)
        .bind(&run.error)
        .bind(run.ended_at)
        .execute(&mut *conn)
        .await?;

        if tool_calls.is_empty() {
            return Ok(());
        }

        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO agent_tool_calls \
                (run_id, turn, seq, tool_name, tool_input, output_chars, duration_ms, is_error) ",
        );
        qb.push_values(tool_calls, |mut row, tc| {
            row.push_bind(run.id)
                .push_bind(tc.turn)
                .push_bind(tc.seq)
                .push_bind(&tc.tool_name)
                .push_bind(&tc.tool_input)
                .push_bind(tc.output_chars)
                .push_bind(tc.duration_ms)
                .push_bind(tc.is_error);
        });
        qb.build().execute(conn).await?;

        tracing::debug!(
            run_id = %run.id,
            agent_type = ?run.agent_type,
            status = ?run.status,
            turns = run.total_turns,
            tool_calls = tool_calls.len(),
            "agent run persisted"
        );
        Ok(())
    }
}
