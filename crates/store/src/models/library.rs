//! `libraries` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A tracked upstream repository.
///
/// `name` is unique; registering the same name with a different
/// `repo_url` is rejected (fork protection).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub repo_url: String,
    pub platform: String,
    pub ecosystem: String,
    pub default_branch: String,
    pub latest_tag_version: Option<String>,
    pub latest_commit_sha: Option<String>,
    pub monitoring_since: DateTime<Utc>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    /// `healthy` | `unhealthy`
    pub collect_status: String,
    pub collect_error: Option<String>,
    /// Per-source status map: `{commits|prs|tags|issues|ghsa} → status`.
    pub collect_detail: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
