//! `project_dependencies` table operations.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{clamp_page_size, CursorSigner, Page};
use crate::error::StoreResult;
use crate::models::ProjectDependency;

/// One dependency row to upsert from a scan or manual entry.
#[derive(Debug, Clone)]
pub struct DependencyUpsert {
    pub project_id: Uuid,
    pub library_id: Uuid,
    pub constraint_expr: Option<String>,
    pub resolved_version: Option<String>,
    pub constraint_source: String,
}

pub struct ProjectDependencyDao;

impl ProjectDependencyDao {
    pub async fn list_by_project(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        project_id: Uuid,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<Page<ProjectDependency>> {
        let page_size = clamp_page_size(page_size);
        let mut qb =
            sqlx::QueryBuilder::new("SELECT * FROM project_dependencies WHERE project_id = ");
        qb.push_bind(project_id);
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

        let rows = qb
            .build_query_as::<ProjectDependency>()
            .fetch_all(conn)
            .await?;
        Ok(signer.build_page(rows, page_size))
    }

    /// Every dependency row referencing a library. Volume per library is
    /// small, so no pagination.
    pub async fn list_by_library(
        conn: &mut PgConnection,
        library_id: Uuid,
    ) -> StoreResult<Vec<ProjectDependency>> {
        let rows = sqlx::query_as::<_, ProjectDependency>(
            "SELECT * FROM project_dependencies WHERE library_id = $1",
        )
        .bind(library_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn count_by_project(conn: &mut PgConnection, project_id: Uuid) -> StoreResult<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT count(*) FROM project_dependencies WHERE project_id = $1")
                .bind(project_id)
                .fetch_one(conn)
                .await?;
        Ok(n)
    }

    /// Upsert one dependency row.
    ///
    /// ON CONFLICT (project_id, library_id, constraint_source) updates
    /// the constraint expression and resolved version: a re-scan
    /// refreshes rather than duplicates.
    pub async fn upsert(
        conn: &mut PgConnection,
        dep: &DependencyUpsert,
    ) -> StoreResult<ProjectDependency> {
        let row = sqlx::query_as::<_, ProjectDependency>(
            "INSERT INTO project_dependencies \
                (project_id, library_id, constraint_expr, resolved_version, constraint_source) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (project_id, library_id, constraint_source) DO UPDATE SET \
                constraint_expr = EXCLUDED.constraint_expr, \
                resolved_version = EXCLUDED.resolved_version, \
                updated_at = now() \
             RETURNING *",
        )
        .bind(dep.project_id)
        .bind(dep.library_id)
        .bind(&dep.constraint_expr)
        .bind(&dep.resolved_version)
        .bind(&dep.constraint_source)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    /// Remove scanner-sourced rows that a fresh scan no longer reports.
    ///
    /// `manual` rows are never touched: they represent human input.
    pub async fn delete_stale_scanned(
        conn: &mut PgConnection,
        project_id: Uuid,
        keep_ids: &[Uuid],
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM project_dependencies \
             WHERE project_id = $1 \
               AND constraint_source <> 'manual' \
               AND id <> ALL($2)",
        )
        .bind(project_id)
        .bind(keep_ids)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
