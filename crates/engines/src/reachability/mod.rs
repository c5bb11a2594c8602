//! Reachability engine: verifies whether client code can reach the
//! vulnerable library functions, then finalizes the client vuln.

pub mod diff;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgConnection;
use tracing::{error, info, warn};

use callgraph::{ReachabilityChecker, ReachabilityOutcome, VulnImpactRequest};
use github::{parse_repo_url, GitHubClient};
use store::dao::PipelineUpdate;
use store::models::{ClientVuln, PipelineStatus};
use store::service::{ClientVulnService, LibraryService, ProjectService, UpstreamVulnService};
use store::PgPool;

pub use diff::extract_functions_from_diff;

/// Per-cycle batch size.
const BATCH_LIMIT: i64 = 20;

pub struct ReachabilityRunner {
    pool: PgPool,
    checker: ReachabilityChecker,
    github: Arc<GitHubClient>,
}

impl ReachabilityRunner {
    #[must_use]
    pub fn new(pool: PgPool, checker: ReachabilityChecker, github: Arc<GitHubClient>) -> Self {
        Self {
            pool,
            checker,
            github,
        }
    }

    /// Run reachability analysis for one client vuln and finalize it.
    ///
    /// Errors from the snapshot store finalize `not_affect` with the
    /// reason recorded, rather than re-queuing forever.
    pub async fn analyze_one(
        &self,
        conn: &mut PgConnection,
        client_vuln: &ClientVuln,
    ) -> Result<()> {
        ClientVulnService::update_pipeline(
            conn,
            client_vuln.id,
            PipelineUpdate {
                pipeline_status: Some(PipelineStatus::PathSearching),
                error_message: Some(None),
                ..PipelineUpdate::default()
            },
        )
        .await?;

        let upstream = UpstreamVulnService::get(conn, client_vuln.upstream_vuln_id)
            .await
            .context("upstream vuln missing")?
            .vuln;
        let library = LibraryService::get_by_id(conn, upstream.library_id).await?;

        // Diff fallback: when the analysis named no functions, mine the
        // fix commit's hunk headers.
        let mut affected_functions = upstream.affected_function_names();
        if affected_functions.is_empty() && !upstream.commit_sha.is_empty() {
            if let Some(library) = &library {
                match parse_repo_url(&library.repo_url) {
                    Ok((owner, repo)) => {
                        affected_functions = extract_functions_from_diff(
                            &self.github,
                            &owner,
                            &repo,
                            &upstream.commit_sha,
                        )
                        .await;
                    }
                    Err(err) => {
                        warn!(client_vuln_id = %client_vuln.id, error = %err, "diff fallback skipped");
                    }
                }
            }
        }

        let Some(project) = ProjectService::get(conn, client_vuln.project_id).await? else {
            // Unrecoverable: finalize as not_affect to avoid an
            // infinite retry loop.
            error!(
                client_vuln_id = %client_vuln.id,
                project_id = %client_vuln.project_id,
                "project not found"
            );
            ClientVulnService::update_pipeline(
                conn,
                client_vuln.id,
                PipelineUpdate {
                    pipeline_status: Some(PipelineStatus::PathSearching),
                    error_message: Some(Some("project not found".to_string())),
                    ..PipelineUpdate::default()
                },
            )
            .await?;
            ClientVulnService::finalize(conn, client_vuln.id, false).await?;
            return Ok(());
        };

        let request = VulnImpactRequest {
            client_repo_url: project.repo_url.clone(),
            client_version: project
                .current_version
                .clone()
                .unwrap_or_else(|| "main".to_string()),
            library_repo_url: library.as_ref().map(|l| l.repo_url.clone()).unwrap_or_default(),
            library_version: client_vuln
                .resolved_version
                .clone()
                .unwrap_or_else(|| upstream.commit_sha.clone()),
            affected_functions,
            commit_sha: Some(upstream.commit_sha.clone()),
        };
        let outcome = self.checker.investigate(&request).await;

        if let Some(reason) = &outcome.error {
            info!(client_vuln_id = %client_vuln.id, error = %reason, "reachability check errored");
            ClientVulnService::update_pipeline(
                conn,
                client_vuln.id,
                PipelineUpdate {
                    pipeline_status: Some(PipelineStatus::PathSearching),
                    error_message: Some(Some(format!("reachability: {reason}"))),
                    ..PipelineUpdate::default()
                },
            )
            .await?;
            ClientVulnService::finalize(conn, client_vuln.id, false).await?;
            return Ok(());
        }

        let reachable_path = render_reachable_path(&outcome);
        ClientVulnService::update_pipeline(
            conn,
            client_vuln.id,
            PipelineUpdate {
                pipeline_status: Some(PipelineStatus::PathSearching),
                is_affected: Some(outcome.is_reachable),
                reachable_path: Some(reachable_path),
                ..PipelineUpdate::default()
            },
        )
        .await?;
        ClientVulnService::finalize(conn, client_vuln.id, outcome.is_reachable).await?;

        info!(
            client_vuln_id = %client_vuln.id,
            is_reachable = outcome.is_reachable,
            strategy = outcome.strategy.map(|s| s.as_str()).unwrap_or(""),
            "reachability finalized"
        );
        Ok(())
    }

    /// Poll pending client vulns and analyze each in its own
    /// transaction. Returns the number processed.
    pub async fn run_batch(&self) -> Result<usize> {
        let pending = {
            let mut conn = self.pool.acquire().await?;
            ClientVulnService::list_pending_pipeline(&mut conn, BATCH_LIMIT).await?
        };
        if pending.is_empty() {
            return Ok(0);
        }

        let mut processed = 0;
        for client_vuln in pending {
            let result: Result<()> = async {
                let mut tx = self.pool.begin().await?;
                self.analyze_one(&mut tx, &client_vuln).await?;
                tx.commit().await?;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => processed += 1,
                Err(err) => {
                    error!(client_vuln_id = %client_vuln.id, error = %err, "reachability failed");
                }
            }
        }
        Ok(processed)
    }
}

fn render_reachable_path(outcome: &ReachabilityOutcome) -> serde_json::Value {
    let mut path = json!({
        "found": outcome.is_reachable,
        "strategy": outcome.strategy.map(|s| s.as_str()),
        "searched_functions": outcome.searched_functions,
        "client_snapshot_id": outcome.client_snapshot_id,
        "library_snapshot_id": outcome.library_snapshot_id,
    });
    if let Some(depth) = outcome.depth {
        path["depth"] = json!(depth);
    }
    if let Some(paths) = &outcome.paths {
        path["call_chain"] = json!(paths);
    }
    path
}
