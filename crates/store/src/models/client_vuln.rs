//! `client_vulns` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{ClientStatus, PipelineStatus};

/// The intersection of an [`UpstreamVuln`](super::UpstreamVuln) and an
/// affected [`Project`](super::Project).
///
/// Carries two orthogonal state machines: the automated analysis
/// pipeline (`pipeline_status`) and the customer-facing lifecycle
/// (`status`). Unique on (upstream_vuln_id, project_id). Rows are never
/// deleted: they are the audit trail.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClientVuln {
    pub id: Uuid,
    pub upstream_vuln_id: Uuid,
    pub project_id: Uuid,

    // analysis pipeline
    pub pipeline_status: PipelineStatus,
    pub is_affected: Option<bool>,
    pub error_message: Option<String>,
    pub analysis_started_at: Option<DateTime<Utc>>,
    pub analysis_completed_at: Option<DateTime<Utc>>,

    // customer-facing lifecycle
    pub status: Option<ClientStatus>,

    // status timeline: system-managed
    pub recorded_at: Option<DateTime<Utc>>,
    pub reported_at: Option<DateTime<Utc>>,
    pub not_affect_at: Option<DateTime<Utc>>,

    // status timeline: maintainer feedback
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_msg: Option<String>,
    pub fixed_at: Option<DateTime<Utc>>,
    pub fixed_msg: Option<String>,

    // denormalized from the owning ProjectDependency
    pub constraint_expr: Option<String>,
    pub constraint_source: Option<String>,
    pub resolved_version: Option<String>,
    pub fix_version: Option<String>,
    pub verdict: Option<String>,

    // analysis results
    pub reachable_path: Option<Value>,
    pub poc_results: Option<Value>,
    pub report: Option<Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
