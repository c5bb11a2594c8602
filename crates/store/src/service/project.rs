//! Project onboarding and scan scheduling.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{CursorSigner, Page};
use crate::dao::{NewProject, ProjectDao};
use crate::error::{StoreError, StoreResult};
use crate::models::Project;

pub struct ProjectService;

impl ProjectService {
    pub async fn get(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Project>> {
        ProjectDao::get_by_id(conn, id).await
    }

    /// Onboard a client project. The repository URL is unique; a
    /// duplicate registration is a conflict.
    pub async fn create(conn: &mut PgConnection, project: &NewProject) -> StoreResult<Project> {
        if ProjectDao::get_by_repo_url(conn, &project.repo_url)
            .await?
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "project with repo_url '{}' already exists",
                project.repo_url
            )));
        }
        ProjectDao::create(conn, project).await
    }

    pub async fn list(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<(Page<Project>, i64)> {
        let page = ProjectDao::list_paginated(conn, signer, cursor, page_size).await?;
        let total = ProjectDao::count(conn).await?;
        Ok((page, total))
    }

    pub async fn list_due_for_scan(
        conn: &mut PgConnection,
        threshold: DateTime<Utc>,
    ) -> StoreResult<Vec<Project>> {
        ProjectDao::list_due_for_scan(conn, threshold).await
    }

    pub async fn update_scan_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: &str,
        error: Option<&str>,
        scanned_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        ProjectDao::update_scan_status(conn, id, status, error, scanned_at).await
    }
}
