//! `projects` table operations.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{clamp_page_size, CursorSigner, Page};
use crate::error::StoreResult;
use crate::models::Project;

/// Onboarding input for a new client project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub organization: Option<String>,
    pub repo_url: String,
    pub default_branch: String,
    pub contact: Option<String>,
    pub current_version: Option<String>,
}

pub struct ProjectDao;

impl ProjectDao {
    pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_repo_url(
        conn: &mut PgConnection,
        repo_url: &str,
    ) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE repo_url = $1")
            .bind(repo_url)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn create(conn: &mut PgConnection, project: &NewProject) -> StoreResult<Project> {
        let row = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (name, organization, repo_url, default_branch, contact, current_version) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(&project.name)
        .bind(&project.organization)
        .bind(&project.repo_url)
        .bind(&project.default_branch)
        .bind(&project.contact)
        .bind(&project.current_version)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_paginated(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<Page<Project>> {
        let page_size = clamp_page_size(page_size);
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM projects WHERE TRUE");
        if let Some(token) = cursor {
            let cur = signer.decode(token)?;
            qb.push(" AND (created_at, id) < (");
            qb.push_bind(cur.created_at);
            qb.push(", ");
            qb.push_bind(cur.id);
            qb.push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(page_size + 1);

        let rows = qb.build_query_as::<Project>().fetch_all(conn).await?;
        Ok(signer.build_page(rows, page_size))
    }

    pub async fn count(conn: &mut PgConnection) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT count(*) FROM projects")
            .fetch_one(conn)
            .await?;
        Ok(n)
    }

    /// Projects due for a dependency scan: auto-sync enabled, not pinned,
    /// never scanned or last scanned before `threshold`.
    pub async fn list_due_for_scan(
        conn: &mut PgConnection,
        threshold: DateTime<Utc>,
    ) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects \
             WHERE auto_sync_deps AND pinned_ref IS NULL \
               AND (last_scanned_at IS NULL OR last_scanned_at < $1) \
             ORDER BY last_scanned_at ASC NULLS FIRST",
        )
        .bind(threshold)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Mirror the latest scan outcome onto the project row.
    pub async fn update_scan_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: &str,
        error: Option<&str>,
        scanned_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE projects SET \
                scan_status = $2, \
                scan_error = $3, \
                last_scanned_at = COALESCE($4, last_scanned_at), \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .bind(scanned_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
