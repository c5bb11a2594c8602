//! `project_dependencies` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Constraint source recorded for manually-entered dependencies.
///
/// Rows with this source are preserved across scans: they represent
/// human input, not scanner output.
pub const MANUAL_SOURCE: &str = "manual";

/// A link from a [`Project`](super::Project) to a
/// [`Library`](super::Library).
///
/// Unique on (project_id, library_id, constraint_source): the same pair
/// may be declared by several manifests plus a manual entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectDependency {
    pub id: Uuid,
    pub project_id: Uuid,
    pub library_id: Uuid,
    /// Version-range expression as written in the manifest.
    pub constraint_expr: Option<String>,
    pub resolved_version: Option<String>,
    /// `manual`, `conanfile.txt`, `CMakeLists.txt`, `scan`, …
    pub constraint_source: String,
    pub notify_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
