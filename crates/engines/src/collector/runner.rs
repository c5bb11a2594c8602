//! Collector runner: orchestrates the pure collect engine and the
//! store writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use sqlx::PgConnection;
use tokio::sync::Semaphore;
use tracing::{error, warn};
use uuid::Uuid;

use github::{parse_repo_url, GitHubClient};
use store::dao::PointerUpdate;
use store::models::{EventType, Library};
use store::service::{EventService, LibraryService};
use store::PgPool;

use super::{collect, count_by_type, CollectOutput};

/// Concurrent library collections.
const MAX_CONCURRENCY: usize = 5;

/// Summary of one library's collect run.
#[derive(Debug)]
pub struct CollectResult {
    pub library_id: Uuid,
    pub fetched: usize,
    pub inserted: u64,
    pub by_type: BTreeMap<&'static str, usize>,
    pub errors: Vec<String>,
}

impl CollectResult {
    fn empty(library_id: Uuid) -> Self {
        Self {
            library_id,
            fetched: 0,
            inserted: 0,
            by_type: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

pub struct EventCollectorRunner {
    pool: PgPool,
    client: Arc<GitHubClient>,
    /// Libraries collected more recently than this are not due yet.
    min_scan_age: Duration,
}

impl EventCollectorRunner {
    #[must_use]
    pub fn new(pool: PgPool, client: Arc<GitHubClient>, min_scan_age: Duration) -> Self {
        Self {
            pool,
            client,
            min_scan_age,
        }
    }

    /// Collect events for a single library and persist them.
    ///
    /// Watermark rule: errors mark the library unhealthy with the
    /// concatenated message, but `last_scanned_at` still advances
    /// whenever at least one source returned data; an all-success
    /// zero-row run just advances the watermark.
    pub async fn run(
        &self,
        conn: &mut PgConnection,
        library: &Library,
    ) -> Result<CollectResult> {
        let mut result = CollectResult::empty(library.id);

        if library.platform != "github" {
            let err = format!("unsupported platform: {}", library.platform);
            result.errors.push(err.clone());
            LibraryService::update_pointers(
                conn,
                library.id,
                PointerUpdate {
                    collect_status: Some("unhealthy".into()),
                    collect_error: Some(Some(err)),
                    ..PointerUpdate::default()
                },
            )
            .await?;
            return Ok(result);
        }

        let (owner, repo) = match parse_repo_url(&library.repo_url) {
            Ok(parsed) => parsed,
            Err(err) => {
                let err = err.to_string();
                result.errors.push(err.clone());
                LibraryService::update_pointers(
                    conn,
                    library.id,
                    PointerUpdate {
                        collect_status: Some("unhealthy".into()),
                        collect_error: Some(Some(err)),
                        ..PointerUpdate::default()
                    },
                )
                .await?;
                return Ok(result);
            }
        };

        let CollectOutput {
            events,
            errors,
            detail,
        } = collect(
            &self.client,
            &owner,
            &repo,
            &library.default_branch,
            library.last_scanned_at,
            library.latest_commit_sha.as_deref(),
            library.latest_tag_version.as_deref(),
        )
        .await;

        result.fetched = events.len();
        result.by_type = count_by_type(&events);
        result.errors.extend(errors.iter().cloned());
        let detail_json = json!(detail);

        if events.is_empty() {
            let update = if errors.is_empty() {
                PointerUpdate {
                    last_scanned_at: Some(Utc::now()),
                    collect_status: Some("healthy".into()),
                    collect_error: Some(None),
                    collect_detail: Some(detail_json),
                    ..PointerUpdate::default()
                }
            } else {
                PointerUpdate {
                    collect_status: Some("unhealthy".into()),
                    collect_error: Some(Some(errors.join("; "))),
                    collect_detail: Some(detail_json),
                    ..PointerUpdate::default()
                }
            };
            LibraryService::update_pointers(conn, library.id, update).await?;
            return Ok(result);
        }

        result.inserted = EventService::batch_create(conn, library.id, &events).await?;

        // Newest collected commit and tag become the new pointers.
        let new_sha = events
            .iter()
            .find(|e| e.event_type == EventType::Commit)
            .map(|e| e.r#ref.clone());
        let new_tag = events
            .iter()
            .find(|e| e.event_type == EventType::Tag)
            .map(|e| e.r#ref.clone());

        LibraryService::update_pointers(
            conn,
            library.id,
            PointerUpdate {
                latest_commit_sha: new_sha,
                latest_tag_version: new_tag,
                last_scanned_at: Some(Utc::now()),
                collect_status: Some(if errors.is_empty() {
                    "healthy".into()
                } else {
                    "unhealthy".into()
                }),
                collect_error: Some(if errors.is_empty() {
                    None
                } else {
                    Some(errors.join("; "))
                }),
                collect_detail: Some(detail_json),
            },
        )
        .await?;

        Ok(result)
    }

    /// Collect all due libraries with bounded concurrency. Each library
    /// runs in its own transaction; one failure cannot poison the
    /// batch.
    pub async fn run_all(&self) -> Result<Vec<CollectResult>> {
        let threshold = Utc::now()
            - chrono::Duration::from_std(self.min_scan_age)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let libraries = {
            let mut conn = self.pool.acquire().await?;
            LibraryService::list_due_for_collect(&mut conn, threshold).await?
        };
        if libraries.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENCY));
        let tasks = libraries.into_iter().map(|library| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await;
                self.run_one(library).await
            }
        });

        Ok(futures::future::join_all(tasks).await)
    }

    async fn run_one(&self, library: Library) -> CollectResult {
        let library_id = library.id;
        let attempt: Result<CollectResult> = async {
            let mut tx = self.pool.begin().await?;
            let result = self.run(&mut tx, &library).await?;
            tx.commit().await?;
            Ok(result)
        }
        .await;

        match attempt {
            Ok(result) => result,
            Err(err) => {
                error!(library_id = %library_id, error = %err, "collector failed");
                if let Err(status_err) = self.mark_unhealthy(library_id, &err.to_string()).await {
                    warn!(library_id = %library_id, error = %status_err, "status update failed");
                }
                let mut result = CollectResult::empty(library_id);
                result.errors.push(err.to_string());
                result
            }
        }
    }

    async fn mark_unhealthy(&self, library_id: Uuid, error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        LibraryService::update_pointers(
            &mut tx,
            library_id,
            PointerUpdate {
                collect_status: Some("unhealthy".into()),
                collect_error: Some(Some(error.to_string())),
                ..PointerUpdate::default()
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
