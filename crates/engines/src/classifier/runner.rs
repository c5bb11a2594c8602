//! Classifier runner: pre-filter or agent, then store writes.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgConnection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use agent::{github_tools::github_tool_registry, AgentRunner};
use github::{parse_repo_url, GitHubClient};
use store::models::{AgentType, Classification, Event};
use store::service::{EventService, LibraryService};
use store::PgPool;

use super::{pre_filter, ClassificationVerdict, ClassifierAgent};
use crate::audit::record_run;

/// Per-cycle batch size.
const BATCH_LIMIT: i64 = 10;
/// Concurrent classifications within one cycle.
const CONCURRENCY: usize = 3;

pub struct EventClassifierRunner {
    pool: PgPool,
    github: Arc<GitHubClient>,
    llm: AgentRunner,
    model: String,
}

impl EventClassifierRunner {
    #[must_use]
    pub fn new(pool: PgPool, github: Arc<GitHubClient>, llm: AgentRunner, model: String) -> Self {
        Self {
            pool,
            github,
            llm,
            model,
        }
    }

    /// Classify one event and persist the result.
    ///
    /// The pre-filter handles the obviously-safe labels at zero LLM
    /// cost; a miss (including every event carrying security signals)
    /// goes to the agent with the GitHub tool surface. An unparseable
    /// agent answer falls back to `other` at 0.3 confidence.
    pub async fn classify_one(
        &self,
        conn: &mut PgConnection,
        event: &Event,
    ) -> Result<ClassificationVerdict> {
        let verdict = match pre_filter(event) {
            Some(hit) => {
                info!(
                    event_id = %event.id,
                    classification = hit.classification.as_str(),
                    reason = %hit.reasoning,
                    "pre-filter hit"
                );
                ClassificationVerdict {
                    classification: hit.classification,
                    confidence: hit.confidence,
                    reasoning: hit.reasoning,
                }
            }
            None => self.classify_with_agent(conn, event).await?,
        };

        EventService::update_classification(
            conn,
            event.id,
            verdict.classification,
            verdict.confidence,
        )
        .await?;

        Ok(verdict)
    }

    async fn classify_with_agent(
        &self,
        conn: &mut PgConnection,
        event: &Event,
    ) -> Result<ClassificationVerdict> {
        let library = LibraryService::get_by_id(conn, event.library_id)
            .await?
            .with_context(|| format!("library {} not found for event {}", event.library_id, event.id))?;
        let (owner, repo) = parse_repo_url(&library.repo_url)?;

        let tools = github_tool_registry(self.github.clone(), &owner, &repo);
        let spec = ClassifierAgent::new(self.model.clone(), tools, event);
        let mut outcome = self.llm.run(&spec).await;

        record_run(
            conn,
            &outcome,
            AgentType::EventClassifier,
            "event_classifier",
            Some(event.id),
            Some("event"),
        )
        .await?;

        if let Some(verdict) = outcome.parsed.take() {
            return Ok(verdict);
        }

        warn!(
            event_id = %event.id,
            status = ?outcome.status,
            "agent returned unusable result, defaulting to other"
        );
        Ok(ClassificationVerdict {
            classification: Classification::Other,
            confidence: 0.3,
            reasoning: "LLM output could not be parsed".to_string(),
        })
    }

    /// Classify up to [`BATCH_LIMIT`] unclassified events with bounded
    /// concurrency. Each event runs in its own transaction.
    pub async fn classify_batch(&self) -> Result<usize> {
        let events = {
            let mut conn = self.pool.acquire().await?;
            EventService::list_unclassified(&mut conn, BATCH_LIMIT).await?
        };
        if events.is_empty() {
            return Ok(0);
        }

        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
        let tasks = events.into_iter().map(|event| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await;
                let result: Result<()> = async {
                    let mut tx = self.pool.begin().await?;
                    self.classify_one(&mut tx, &event).await?;
                    tx.commit().await?;
                    Ok(())
                }
                .await;
                match result {
                    Ok(()) => 1,
                    Err(err) => {
                        warn!(event_id = %event.id, error = %err, "classification failed");
                        0
                    }
                }
            }
        });

        let processed: usize = futures::future::join_all(tasks).await.into_iter().sum();
        Ok(processed)
    }
}
