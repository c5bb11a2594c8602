//! `projects` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A tracked client repository.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub organization: Option<String>,
    pub repo_url: String,
    pub platform: String,
    pub default_branch: String,
    pub contact: Option<String>,
    pub current_version: Option<String>,
    /// When set, dependency scanning is frozen at this ref.
    pub pinned_ref: Option<String>,
    pub auto_sync_deps: bool,
    pub scan_status: Option<String>,
    pub scan_error: Option<String>,
    pub monitoring_since: DateTime<Utc>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
