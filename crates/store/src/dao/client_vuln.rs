//! `client_vulns` table operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{clamp_page_size, CursorSigner, Page};
use crate::error::StoreResult;
use crate::models::{ClientStatus, ClientVuln, PipelineStatus, Severity};

/// Optional filters for client-vuln list queries.
#[derive(Debug, Clone, Default)]
pub struct ClientVulnFilters {
    pub status: Option<ClientStatus>,
    /// Joins `upstream_vulns`.
    pub severity: Option<Severity>,
    /// Joins `upstream_vulns`.
    pub library_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl ClientVulnFilters {
    fn needs_join(&self) -> bool {
        self.severity.is_some() || self.library_id.is_some()
    }

    fn apply(&self, qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>) {
        if let Some(status) = self.status {
            qb.push(" AND cv.status = ");
            qb.push_bind(status);
        }
        if let Some(severity) = self.severity {
            qb.push(" AND uv.severity = ");
            qb.push_bind(severity);
        }
        if let Some(library_id) = self.library_id {
            qb.push(" AND uv.library_id = ");
            qb.push_bind(library_id);
        }
        if let Some(project_id) = self.project_id {
            qb.push(" AND cv.project_id = ");
            qb.push_bind(project_id);
        }
        if let Some(from) = self.date_from {
            qb.push(" AND cv.created_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = self.date_to {
            qb.push(" AND cv.created_at <= ");
            qb.push_bind(to);
        }
    }

    fn base_query(&self, select: &str) -> sqlx::QueryBuilder<'_, sqlx::Postgres> {
        let mut qb = sqlx::QueryBuilder::new(format!("SELECT {select} FROM client_vulns cv"));
        if self.needs_join() {
            qb.push(" JOIN upstream_vulns uv ON uv.id = cv.upstream_vuln_id");
        }
        qb.push(" WHERE TRUE");
        qb
    }
}

/// Insert payload created by the impact matcher.
#[derive(Debug, Clone)]
pub struct NewClientVuln {
    pub upstream_vuln_id: Uuid,
    pub project_id: Uuid,
    pub constraint_expr: Option<String>,
    pub constraint_source: Option<String>,
    pub resolved_version: Option<String>,
}

/// Pipeline-status advance written by the reachability engine.
///
/// `error_message` distinguishes "leave as-is" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Default)]
pub struct PipelineUpdate {
    pub pipeline_status: Option<PipelineStatus>,
    pub is_affected: Option<bool>,
    pub reachable_path: Option<Value>,
    pub poc_results: Option<Value>,
    pub error_message: Option<Option<String>>,
}

/// Forward-inclusive status counts: each bucket includes every later
/// state, so `total_recorded ⊇ total_reported ⊇ total_confirmed ⊇
/// total_fixed`.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct StatusCounts {
    pub total_recorded: i64,
    pub total_reported: i64,
    pub total_confirmed: i64,
    pub total_fixed: i64,
}

pub struct ClientVulnDao;

impl ClientVulnDao {
    pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<ClientVuln>> {
        let row = sqlx::query_as::<_, ClientVuln>("SELECT * FROM client_vulns WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Insert one client vuln.
    ///
    /// Returns `None` on a duplicate (upstream_vuln_id, project_id) -
    /// the impact matcher silently skips those (two dependency rows for
    /// the same project, e.g. manual + scanner).
    pub async fn create(
        conn: &mut PgConnection,
        new: &NewClientVuln,
    ) -> StoreResult<Option<ClientVuln>> {
        let row = sqlx::query_as::<_, ClientVuln>(
            "INSERT INTO client_vulns \
                (upstream_vuln_id, project_id, constraint_expr, constraint_source, resolved_version) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (upstream_vuln_id, project_id) DO NOTHING \
             RETURNING *",
        )
        .bind(new.upstream_vuln_id)
        .bind(new.project_id)
        .bind(&new.constraint_expr)
        .bind(&new.constraint_source)
        .bind(&new.resolved_version)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_paginated(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
        filters: &ClientVulnFilters,
    ) -> StoreResult<Page<ClientVuln>> {
        let page_size = clamp_page_size(page_size);
        let mut qb = filters.base_query("cv.*");
        filters.apply(&mut qb);
        if let Some(token) = cursor {
            let cur = signer.decode(token)?;
            qb.push(" AND (cv.created_at, cv.id) < (");
            qb.push_bind(cur.created_at);
            qb.push(", ");
            qb.push_bind(cur.id);
            qb.push(")");
        }
        qb.push(" ORDER BY cv.created_at DESC, cv.id DESC LIMIT ");
        qb.push_bind(page_size + 1);

        let rows = qb.build_query_as::<ClientVuln>().fetch_all(conn).await?;
        Ok(signer.build_page(rows, page_size))
    }

    pub async fn count(
        conn: &mut PgConnection,
        filters: &ClientVulnFilters,
    ) -> StoreResult<i64> {
        let mut qb = filters.base_query("count(*)");
        filters.apply(&mut qb);
        let n: i64 = qb.build_query_scalar().fetch_one(conn).await?;
        Ok(n)
    }

    pub async fn count_by_status(
        conn: &mut PgConnection,
        project_id: Option<Uuid>,
    ) -> StoreResult<StatusCounts> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT \
                count(*) FILTER (WHERE status IN ('recorded','reported','confirmed','fixed')) AS total_recorded, \
                count(*) FILTER (WHERE status IN ('reported','confirmed','fixed')) AS total_reported, \
                count(*) FILTER (WHERE status IN ('confirmed','fixed')) AS total_confirmed, \
                count(*) FILTER (WHERE status = 'fixed') AS total_fixed \
             FROM client_vulns WHERE TRUE",
        );
        if let Some(project_id) = project_id {
            qb.push(" AND project_id = ");
            qb.push_bind(project_id);
        }
        let counts = qb.build_query_as::<StatusCounts>().fetch_one(conn).await?;
        Ok(counts)
    }

    pub async fn list_by_upstream_vuln(
        conn: &mut PgConnection,
        upstream_vuln_id: Uuid,
    ) -> StoreResult<Vec<ClientVuln>> {
        let rows = sqlx::query_as::<_, ClientVuln>(
            "SELECT * FROM client_vulns WHERE upstream_vuln_id = $1",
        )
        .bind(upstream_vuln_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_project(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        project_id: Uuid,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<Page<ClientVuln>> {
        let filters = ClientVulnFilters {
            project_id: Some(project_id),
            ..ClientVulnFilters::default()
        };
        Self::list_paginated(conn, signer, cursor, page_size, &filters).await
    }

    /// Active vulns for a project: everything not yet fixed or ruled out
    /// (a null status counts as active).
    pub async fn active_count_by_project(
        conn: &mut PgConnection,
        project_id: Uuid,
    ) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM client_vulns \
             WHERE project_id = $1 \
               AND (status IS NULL OR status NOT IN ('fixed', 'not_affect'))",
        )
        .bind(project_id)
        .fetch_one(conn)
        .await?;
        Ok(n)
    }

    /// Vulns with pending pipeline work: the reachability engine's poll
    /// query, oldest first.
    pub async fn list_pending_pipeline(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<ClientVuln>> {
        let rows = sqlx::query_as::<_, ClientVuln>(
            "SELECT * FROM client_vulns \
             WHERE pipeline_status IN ('pending', 'path_searching', 'poc_generating') \
             ORDER BY created_at ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Verified-but-unnotified vulns: the notification engine's poll
    /// query.
    pub async fn list_verified_unnotified(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<ClientVuln>> {
        let rows = sqlx::query_as::<_, ClientVuln>(
            "SELECT * FROM client_vulns \
             WHERE status = 'recorded' AND reported_at IS NULL \
             ORDER BY created_at ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn update_pipeline(
        conn: &mut PgConnection,
        id: Uuid,
        update: PipelineUpdate,
    ) -> StoreResult<()> {
        let set_error = update.error_message.is_some();
        let error_value = update.error_message.flatten();

        sqlx::query(
            "UPDATE client_vulns SET \
                pipeline_status = COALESCE($2, pipeline_status), \
                is_affected = COALESCE($3, is_affected), \
                reachable_path = COALESCE($4, reachable_path), \
                poc_results = COALESCE($5, poc_results), \
                error_message = CASE WHEN $6 THEN $7 ELSE error_message END, \
                analysis_started_at = COALESCE(analysis_started_at, now()), \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.pipeline_status)
        .bind(update.is_affected)
        .bind(&update.reachable_path)
        .bind(&update.poc_results)
        .bind(set_error)
        .bind(error_value)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Terminal pipeline write: stamps `analysis_completed_at` plus
    /// `recorded_at` or `not_affect_at` depending on the target status.
    pub async fn finalize(
        conn: &mut PgConnection,
        id: Uuid,
        pipeline_status: PipelineStatus,
        status: ClientStatus,
        is_affected: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE client_vulns SET \
                pipeline_status = $2, \
                status = $3, \
                is_affected = $4, \
                analysis_completed_at = now(), \
                recorded_at = CASE WHEN $3 = 'recorded'::client_vuln_status THEN now() ELSE recorded_at END, \
                not_affect_at = CASE WHEN $3 = 'not_affect'::client_vuln_status THEN now() ELSE not_affect_at END, \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(pipeline_status)
        .bind(status)
        .bind(is_affected)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Customer-facing status write; stamps the matching timestamp and
    /// stores the optional maintainer message.
    pub async fn update_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: ClientStatus,
        msg: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE client_vulns SET \
                status = $2, \
                reported_at = CASE WHEN $2 = 'reported'::client_vuln_status THEN now() ELSE reported_at END, \
                confirmed_at = CASE WHEN $2 = 'confirmed'::client_vuln_status THEN now() ELSE confirmed_at END, \
                confirmed_msg = CASE WHEN $2 = 'confirmed'::client_vuln_status THEN COALESCE($3, confirmed_msg) ELSE confirmed_msg END, \
                fixed_at = CASE WHEN $2 = 'fixed'::client_vuln_status THEN now() ELSE fixed_at END, \
                fixed_msg = CASE WHEN $2 = 'fixed'::client_vuln_status THEN COALESCE($3, fixed_msg) ELSE fixed_msg END, \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(msg)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Store the rendered notification record.
    pub async fn set_report(conn: &mut PgConnection, id: Uuid, report: Value) -> StoreResult<()> {
        sqlx::query("UPDATE client_vulns SET report = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(report)
            .execute(conn)
            .await?;
        Ok(())
    }
}
