//! `upstream_vulns` table operations.

use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{clamp_page_size, CursorSigner, Page};
use crate::error::StoreResult;
use crate::models::{Severity, UpstreamVuln};

/// Analysis results written by the analyzer engine.
#[derive(Debug, Clone)]
pub struct AnalysisUpdate {
    pub vuln_type: String,
    pub severity: Severity,
    pub affected_versions: String,
    pub summary: String,
    pub reasoning: String,
    pub upstream_poc: Option<Value>,
    pub affected_functions: Option<Value>,
}

pub struct UpstreamVulnDao;

impl UpstreamVulnDao {
    pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<UpstreamVuln>> {
        let row = sqlx::query_as::<_, UpstreamVuln>("SELECT * FROM upstream_vulns WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Placeholder insert: status defaults to `analyzing`.
    pub async fn create(
        conn: &mut PgConnection,
        event_id: Uuid,
        library_id: Uuid,
        commit_sha: &str,
    ) -> StoreResult<UpstreamVuln> {
        let row = sqlx::query_as::<_, UpstreamVuln>(
            "INSERT INTO upstream_vulns (event_id, library_id, commit_sha) \
             VALUES ($1, $2, $3) \
             RETURNING *",
        )
        .bind(event_id)
        .bind(library_id)
        .bind(commit_sha)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_paginated(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
        library_id: Option<Uuid>,
    ) -> StoreResult<Page<UpstreamVuln>> {
        let page_size = clamp_page_size(page_size);
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM upstream_vulns WHERE TRUE");
        if let Some(lib) = library_id {
            qb.push(" AND library_id = ");
            qb.push_bind(lib);
        }
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

        let rows = qb.build_query_as::<UpstreamVuln>().fetch_all(conn).await?;
        Ok(signer.build_page(rows, page_size))
    }

    pub async fn count(conn: &mut PgConnection, library_id: Option<Uuid>) -> StoreResult<i64> {
        let n: i64 = match library_id {
            Some(lib) => {
                sqlx::query_scalar("SELECT count(*) FROM upstream_vulns WHERE library_id = $1")
                    .bind(lib)
                    .fetch_one(conn)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT count(*) FROM upstream_vulns")
                    .fetch_one(conn)
                    .await?
            }
        };
        Ok(n)
    }

    pub async fn list_by_event(
        conn: &mut PgConnection,
        event_id: Uuid,
    ) -> StoreResult<Vec<UpstreamVuln>> {
        let rows =
            sqlx::query_as::<_, UpstreamVuln>("SELECT * FROM upstream_vulns WHERE event_id = $1")
                .bind(event_id)
                .fetch_all(conn)
                .await?;
        Ok(rows)
    }

    /// Published vulns with no client vulns yet whose library has at
    /// least one dependent project: the impact matcher's poll query.
    ///
    /// The dependents predicate keeps vulns in unused libraries out of
    /// the queue entirely.
    pub async fn list_published_without_impact(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<UpstreamVuln>> {
        let rows = sqlx::query_as::<_, UpstreamVuln>(
            "SELECT * FROM upstream_vulns v \
             WHERE v.status = 'published' \
               AND NOT EXISTS (SELECT 1 FROM client_vulns cv WHERE cv.upstream_vuln_id = v.id) \
               AND EXISTS (SELECT 1 FROM project_dependencies d WHERE d.library_id = v.library_id) \
             ORDER BY v.published_at ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn update_analysis(
        conn: &mut PgConnection,
        id: Uuid,
        update: &AnalysisUpdate,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE upstream_vulns SET \
                vuln_type = $2, severity = $3, affected_versions = $4, \
                summary = $5, reasoning = $6, \
                upstream_poc = COALESCE($7, upstream_poc), \
                affected_functions = COALESCE($8, affected_functions), \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.vuln_type)
        .bind(update.severity)
        .bind(&update.affected_versions)
        .bind(&update.summary)
        .bind(&update.reasoning)
        .bind(&update.upstream_poc)
        .bind(&update.affected_functions)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// `analyzing` → `published`, stamping `published_at`.
    pub async fn publish(conn: &mut PgConnection, id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "UPDATE upstream_vulns SET \
                status = 'published', published_at = now(), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record an analysis error; status is left unchanged so the engine
    /// decides whether to retry.
    pub async fn set_error(
        conn: &mut PgConnection,
        id: Uuid,
        error_message: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE upstream_vulns SET error_message = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .execute(conn)
        .await?;
        Ok(())
    }
}
