//! Library management and idempotent registration.

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{CursorSigner, Page};
use crate::dao::{EventDao, LibraryDao, PointerUpdate, ProjectDao, ProjectDependencyDao};
use crate::error::{StoreError, StoreResult};
use crate::models::Library;

/// One dependent project of a library.
#[derive(Debug, Serialize)]
pub struct LibraryUsedBy {
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub constraint_expr: Option<String>,
    pub resolved_version: Option<String>,
    pub constraint_source: String,
}

/// Library detail for the operator façade.
#[derive(Debug, Serialize)]
pub struct LibraryDetail {
    pub library: Library,
    pub used_by: Vec<LibraryUsedBy>,
    pub events_tracked: i64,
}

pub struct LibraryService;

impl LibraryService {
    pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Library>> {
        LibraryDao::get_by_id(conn, id).await
    }

    /// Library detail with dependent-project list and event count.
    pub async fn get(conn: &mut PgConnection, id: Uuid) -> StoreResult<LibraryDetail> {
        let library = LibraryDao::get_by_id(conn, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("library not found".into()))?;

        let deps = ProjectDependencyDao::list_by_library(conn, library.id).await?;
        let events_tracked = EventDao::count(conn, Some(library.id)).await?;

        let mut used_by = Vec::with_capacity(deps.len());
        for dep in deps {
            let project = ProjectDao::get_by_id(conn, dep.project_id).await?;
            used_by.push(LibraryUsedBy {
                project_id: dep.project_id,
                project_name: project.map(|p| p.name),
                constraint_expr: dep.constraint_expr,
                resolved_version: dep.resolved_version,
                constraint_source: dep.constraint_source,
            });
        }

        Ok(LibraryDetail {
            library,
            used_by,
            events_tracked,
        })
    }

    pub async fn list(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<(Page<Library>, i64)> {
        let page = LibraryDao::list_paginated(conn, signer, cursor, page_size).await?;
        let total = LibraryDao::count(conn).await?;
        Ok((page, total))
    }

    /// Idempotent registration used during client onboarding. A second
    /// library with the same name but a different URL is a conflict.
    pub async fn upsert(
        conn: &mut PgConnection,
        name: &str,
        repo_url: &str,
        platform: &str,
        default_branch: &str,
    ) -> StoreResult<Library> {
        LibraryDao::upsert_by_name(conn, name, repo_url, platform, default_branch).await
    }

    pub async fn update_pointers(
        conn: &mut PgConnection,
        id: Uuid,
        update: PointerUpdate,
    ) -> StoreResult<()> {
        LibraryDao::update_pointers(conn, id, update).await
    }

    pub async fn list_due_for_collect(
        conn: &mut PgConnection,
        threshold: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<Vec<Library>> {
        LibraryDao::list_due_for_collect(conn, threshold).await
    }
}
