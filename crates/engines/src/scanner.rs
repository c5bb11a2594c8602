//! Dependency scanner stage.
//!
//! The per-ecosystem manifest scanners are external collaborators; this
//! stage owns the scheduling and the store writes around them: poll
//! projects due for a scan, run the scanner per project in its own
//! transaction, upsert libraries and dependency rows, and mirror the
//! scan outcome onto the project.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;
use tracing::{error, info, warn};

use store::dao::{DependencyUpsert, ProjectDependencyDao};
use store::models::Project;
use store::service::{LibraryService, ProjectService};
use store::{PgPool, StoreError};

/// One dependency a manifest scan discovered.
#[derive(Debug, Clone)]
pub struct DiscoveredDependency {
    pub library_name: String,
    pub library_repo_url: String,
    pub constraint_expr: Option<String>,
    pub resolved_version: Option<String>,
    /// Which manifest declared it (`conanfile.txt`, `CMakeLists.txt`,
    /// `scan`, …). Never `manual`: that source is reserved for human
    /// input.
    pub constraint_source: String,
}

/// Contract of a per-ecosystem dependency scanner.
#[async_trait]
pub trait ManifestScanner: Send + Sync {
    /// Scan the project's manifests at its current version. The error
    /// string lands in the project's `scan_error` mirror.
    async fn scan(&self, project: &Project) -> Result<Vec<DiscoveredDependency>, String>;
}

pub struct DependencyScannerRunner {
    pool: PgPool,
    scanner: Arc<dyn ManifestScanner>,
    cutoff: std::time::Duration,
}

impl DependencyScannerRunner {
    #[must_use]
    pub fn new(pool: PgPool, scanner: Arc<dyn ManifestScanner>, cutoff: std::time::Duration) -> Self {
        Self {
            pool,
            scanner,
            cutoff,
        }
    }

    /// Scan one project and sync its dependency rows. Returns whether
    /// the scan itself succeeded: a scanner error is recorded on the
    /// project and committed, not bubbled, so the mirror survives.
    ///
    /// Discovered libraries are registered idempotently (a name clash
    /// with a different URL is skipped with a warning: fork
    /// protection); dependency rows are upserted on (project, library,
    /// source). `manual` rows are untouched.
    pub async fn scan_one(&self, conn: &mut PgConnection, project: &Project) -> Result<bool> {
        let deps = match self.scanner.scan(project).await {
            Ok(deps) => deps,
            Err(reason) => {
                warn!(project_id = %project.id, %reason, "manifest scan failed");
                ProjectService::update_scan_status(
                    conn,
                    project.id,
                    "error",
                    Some(&reason),
                    Some(Utc::now()),
                )
                .await?;
                return Ok(false);
            }
        };

        let mut kept_ids = Vec::with_capacity(deps.len());
        for dep in &deps {
            let library = match LibraryService::upsert(
                conn,
                &dep.library_name,
                &dep.library_repo_url,
                "github",
                "main",
            )
            .await
            {
                Ok(library) => library,
                Err(StoreError::Conflict(msg)) => {
                    warn!(project_id = %project.id, library = %dep.library_name, %msg, "library conflict");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let row = ProjectDependencyDao::upsert(
                conn,
                &DependencyUpsert {
                    project_id: project.id,
                    library_id: library.id,
                    constraint_expr: dep.constraint_expr.clone(),
                    resolved_version: dep.resolved_version.clone(),
                    constraint_source: dep.constraint_source.clone(),
                },
            )
            .await?;
            kept_ids.push(row.id);
        }

        // Scanner-sourced rows the scan no longer reports are gone from
        // the manifests; manual rows survive.
        let pruned =
            ProjectDependencyDao::delete_stale_scanned(conn, project.id, &kept_ids).await?;

        ProjectService::update_scan_status(conn, project.id, "ok", None, Some(Utc::now())).await?;
        info!(
            project_id = %project.id,
            discovered = deps.len(),
            synced = kept_ids.len(),
            pruned,
            "dependencies scanned"
        );
        Ok(true)
    }

    /// Scan every due project, one transaction each. Returns the number
    /// of projects scanned successfully.
    pub async fn run_batch(&self) -> Result<usize> {
        let threshold = Utc::now()
            - chrono::Duration::from_std(self.cutoff).unwrap_or_else(|_| chrono::Duration::zero());
        let projects = {
            let mut conn = self.pool.acquire().await?;
            ProjectService::list_due_for_scan(&mut conn, threshold).await?
        };
        if projects.is_empty() {
            return Ok(0);
        }

        let mut scanned = 0;
        for project in projects {
            let result: Result<bool> = async {
                let mut tx = self.pool.begin().await?;
                let ok = self.scan_one(&mut tx, &project).await?;
                tx.commit().await?;
                Ok(ok)
            }
            .await;

            match result {
                Ok(true) => scanned += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(project_id = %project.id, error = %err, "project scan failed");
                }
            }
        }
        Ok(scanned)
    }
}
