//! Analyzer runner: placeholder-before-call, multi-vuln fan-out,
//! publish.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info};

use agent::{github_tools::github_tool_registry, AgentRunner, RunStatus};
use github::{parse_repo_url, GitHubClient};
use store::dao::AnalysisUpdate;
use store::models::{AgentType, Event};
use store::service::{EventService, LibraryService, UpstreamVulnService};
use store::PgPool;

use super::{AnalyzerAgent, VulnFinding};
use crate::audit::record_run;

/// Per-cycle batch size.
const BATCH_LIMIT: i64 = 10;
/// Concurrent analyses within one cycle.
const CONCURRENCY: usize = 3;

pub struct VulnAnalyzerRunner {
    pool: PgPool,
    github: Arc<GitHubClient>,
    llm: AgentRunner,
    model: String,
}

impl VulnAnalyzerRunner {
    #[must_use]
    pub fn new(pool: PgPool, github: Arc<GitHubClient>, llm: AgentRunner, model: String) -> Self {
        Self {
            pool,
            github,
            llm,
            model,
        }
    }

    /// Analyze one confirmed-bugfix event.
    ///
    /// A placeholder vuln is inserted before the LLM call so the event
    /// is never re-polled, even when analysis fails. The first finding
    /// updates the placeholder; additional findings insert new rows.
    /// Every row ends `published`.
    pub async fn analyze_one(&self, event: &Event) -> Result<Vec<VulnFinding>> {
        let mut tx = self.pool.begin().await?;

        let library = LibraryService::get_by_id(&mut tx, event.library_id)
            .await?
            .with_context(|| {
                format!("library {} not found for event {}", event.library_id, event.id)
            })?;
        let (owner, repo) = parse_repo_url(&library.repo_url)?;

        let placeholder =
            UpstreamVulnService::create(&mut tx, event.id, library.id, &event.r#ref).await?;

        let tools = github_tool_registry(self.github.clone(), &owner, &repo);
        let spec = AnalyzerAgent::new(self.model.clone(), tools, event);
        let mut outcome = self.llm.run(&spec).await;

        record_run(
            &mut tx,
            &outcome,
            AgentType::VulnAnalyzer,
            "vuln_analyzer",
            Some(event.id),
            Some("event"),
        )
        .await?;

        let findings = match outcome.parsed.take() {
            Some(findings) if outcome.status != RunStatus::Failed => findings,
            _ => {
                // Keep the placeholder with the error so the event does
                // not loop back into the poll query.
                let reason = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "LLM output could not be parsed".to_string());
                UpstreamVulnService::set_error(&mut tx, placeholder.id, &reason).await?;
                tx.commit().await?;
                bail!("analysis failed for event {}: {reason}", event.id);
            }
        };

        for (i, finding) in findings.iter().enumerate() {
            let vuln = if i == 0 {
                placeholder.clone()
            } else {
                UpstreamVulnService::create(&mut tx, event.id, library.id, &event.r#ref).await?
            };

            UpstreamVulnService::update_analysis(
                &mut tx,
                vuln.id,
                &AnalysisUpdate {
                    vuln_type: finding.vuln_type.clone(),
                    severity: finding.severity,
                    affected_versions: finding.affected_versions.clone(),
                    summary: finding.summary.clone(),
                    reasoning: finding.reasoning.clone(),
                    upstream_poc: finding.upstream_poc.clone(),
                    affected_functions: finding.affected_functions.clone(),
                },
            )
            .await?;
            UpstreamVulnService::publish(&mut tx, vuln.id).await?;
        }

        tx.commit().await?;
        info!(
            event_id = %event.id,
            vulns = findings.len(),
            "bugfix analyzed and published"
        );
        Ok(findings)
    }

    /// Analyze up to [`BATCH_LIMIT`] bugfix events with bounded
    /// concurrency; each event gets its own transaction.
    pub async fn analyze_batch(&self) -> Result<usize> {
        let events = {
            let mut conn = self.pool.acquire().await?;
            EventService::list_bugfix_without_vuln(&mut conn, BATCH_LIMIT).await?
        };
        if events.is_empty() {
            return Ok(0);
        }

        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
        let tasks = events.into_iter().map(|event| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await;
                match self.analyze_one(&event).await {
                    Ok(_) => 1,
                    Err(err) => {
                        error!(event_id = %event.id, error = %err, "analysis failed");
                        0
                    }
                }
            }
        });

        let processed: usize = futures::future::join_all(tasks).await.into_iter().sum();
        Ok(processed)
    }
}
