//! `libraries` table operations.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{clamp_page_size, CursorSigner, Page};
use crate::error::{StoreError, StoreResult};
use crate::models::Library;

/// Partial pointer update applied after each collect cycle.
///
/// `None` fields are skipped via COALESCE; `collect_error` distinguishes
/// "leave as-is" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Default)]
pub struct PointerUpdate {
    pub latest_commit_sha: Option<String>,
    pub latest_tag_version: Option<String>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub collect_status: Option<String>,
    pub collect_error: Option<Option<String>>,
    pub collect_detail: Option<Value>,
}

pub struct LibraryDao;

impl LibraryDao {
    pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Library>> {
        let row = sqlx::query_as::<_, Library>("SELECT * FROM libraries WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_name(conn: &mut PgConnection, name: &str) -> StoreResult<Option<Library>> {
        let row = sqlx::query_as::<_, Library>("SELECT * FROM libraries WHERE name = $1")
            .bind(name)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn list_paginated(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<Page<Library>> {
        let page_size = clamp_page_size(page_size);
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM libraries WHERE TRUE");
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

        let rows = qb.build_query_as::<Library>().fetch_all(conn).await?;
        Ok(signer.build_page(rows, page_size))
    }

    pub async fn count(conn: &mut PgConnection) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT count(*) FROM libraries")
            .fetch_one(conn)
            .await?;
        Ok(n)
    }

    /// All libraries ordered by name (operator listing, full scans).
    pub async fn get_all_monitored(conn: &mut PgConnection) -> StoreResult<Vec<Library>> {
        let rows = sqlx::query_as::<_, Library>("SELECT * FROM libraries ORDER BY name")
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Libraries never collected or last collected before `threshold`.
    pub async fn list_due_for_collect(
        conn: &mut PgConnection,
        threshold: DateTime<Utc>,
    ) -> StoreResult<Vec<Library>> {
        let rows = sqlx::query_as::<_, Library>(
            "SELECT * FROM libraries \
             WHERE last_scanned_at IS NULL OR last_scanned_at < $1 \
             ORDER BY last_scanned_at ASC NULLS FIRST",
        )
        .bind(threshold)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Insert a library or return the existing row when the name is
    /// already registered.
    ///
    /// Returns [`StoreError::Conflict`] when the existing row points at a
    /// different repository URL (fork protection).
    pub async fn upsert_by_name(
        conn: &mut PgConnection,
        name: &str,
        repo_url: &str,
        platform: &str,
        default_branch: &str,
    ) -> StoreResult<Library> {
        let inserted = sqlx::query_as::<_, Library>(
            "INSERT INTO libraries (name, repo_url, platform, default_branch) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING *",
        )
        .bind(name)
        .bind(repo_url)
        .bind(platform)
        .bind(default_branch)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = inserted {
            return Ok(row);
        }

        // Conflict path: the library already existed.
        let existing = Self::get_by_name(conn, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("library '{name}'")))?;
        if existing.repo_url != repo_url {
            return Err(StoreError::Conflict(format!(
                "library '{name}' already exists with repo_url '{}', cannot register with '{repo_url}'",
                existing.repo_url
            )));
        }
        Ok(existing)
    }

    /// Apply a [`PointerUpdate`] after a collect cycle.
    pub async fn update_pointers(
        conn: &mut PgConnection,
        id: Uuid,
        update: PointerUpdate,
    ) -> StoreResult<()> {
        let set_error = update.collect_error.is_some();
        let error_value = update.collect_error.flatten();

        sqlx::query(
            "UPDATE libraries SET \
                latest_commit_sha = COALESCE($2, latest_commit_sha), \
                latest_tag_version = COALESCE($3, latest_tag_version), \
                last_scanned_at = COALESCE($4, last_scanned_at), \
                collect_status = COALESCE($5, collect_status), \
                collect_error = CASE WHEN $6 THEN $7 ELSE collect_error END, \
                collect_detail = COALESCE($8, collect_detail), \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.latest_commit_sha)
        .bind(update.latest_tag_version)
        .bind(update.last_scanned_at)
        .bind(update.collect_status)
        .bind(set_error)
        .bind(error_value)
        .bind(update.collect_detail)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
