//! Impact matcher: fans a published vuln out to every project that
//! depends on the affected library.
//!
//! Version-range checking is deliberately deferred to the reachability
//! stage; every dependent project becomes a candidate here.

use anyhow::Result;
use sqlx::PgConnection;
use tracing::{debug, error, info};

use store::dao::{NewClientVuln, ProjectDependencyDao};
use store::models::UpstreamVuln;
use store::service::ClientVulnService;
use store::PgPool;

/// Per-cycle batch size.
const BATCH_LIMIT: i64 = 20;

pub struct ImpactRunner {
    pool: PgPool,
}

impl ImpactRunner {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create one client vuln per dependent project. Returns the number
    /// created; duplicates (the same project declaring the dependency
    /// through several sources) are skipped silently.
    pub async fn process_one(
        &self,
        conn: &mut PgConnection,
        vuln: &UpstreamVuln,
    ) -> Result<usize> {
        let deps = ProjectDependencyDao::list_by_library(conn, vuln.library_id).await?;
        if deps.is_empty() {
            info!(
                upstream_vuln_id = %vuln.id,
                library_id = %vuln.library_id,
                "no dependents"
            );
            return Ok(0);
        }

        let mut created = 0;
        for dep in &deps {
            let inserted = ClientVulnService::create(
                conn,
                &NewClientVuln {
                    upstream_vuln_id: vuln.id,
                    project_id: dep.project_id,
                    constraint_expr: dep.constraint_expr.clone(),
                    constraint_source: Some(dep.constraint_source.clone()),
                    resolved_version: dep.resolved_version.clone(),
                },
            )
            .await?;

            if inserted.is_some() {
                created += 1;
            } else {
                debug!(
                    upstream_vuln_id = %vuln.id,
                    project_id = %dep.project_id,
                    "duplicate skipped"
                );
            }
        }

        info!(
            upstream_vuln_id = %vuln.id,
            dependents = deps.len(),
            created,
            "impact assessed"
        );
        Ok(created)
    }

    /// Poll published vulns without impact and process each in its own
    /// transaction. Returns the total number of client vulns created.
    pub async fn run_batch(&self) -> Result<usize> {
        let vulns = {
            let mut conn = self.pool.acquire().await?;
            store::service::UpstreamVulnService::list_published_without_impact(
                &mut conn,
                BATCH_LIMIT,
            )
            .await?
        };
        if vulns.is_empty() {
            return Ok(0);
        }

        let mut total_created = 0;
        for vuln in vulns {
            let result: Result<usize> = async {
                let mut tx = self.pool.begin().await?;
                let created = self.process_one(&mut tx, &vuln).await?;
                tx.commit().await?;
                Ok(created)
            }
            .await;

            match result {
                Ok(created) => total_created += created,
                Err(err) => {
                    error!(upstream_vuln_id = %vuln.id, error = %err, "impact failed");
                }
            }
        }
        Ok(total_created)
    }
}
