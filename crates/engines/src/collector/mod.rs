//! Event collector: pure API collection, no store access.
//!
//! Five read-only sources run concurrently with exception isolation;
//! one failing source costs its own rows only. The GHSA source is a
//! health probe and produces no events.

pub mod refs;
pub mod runner;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::error;

use github::{GitHubClient, GitHubResult, DEFAULT_MAX_PAGES, FIRST_COLLECT_MAX_PAGES};
use store::models::{EventType, NewEvent};

pub use runner::{CollectResult, EventCollectorRunner};

/// Lookback window when a library has never been collected.
const FIRST_COLLECT_DAYS: i64 = 30;

/// Output of one [`collect`] run.
#[derive(Debug, Default)]
pub struct CollectOutput {
    pub events: Vec<NewEvent>,
    /// One message per failed source.
    pub errors: Vec<String>,
    /// Per-source status: `ok (<n>)` or `error: …`.
    pub detail: BTreeMap<String, String>,
}

/// Collect events from the GitHub API for a single repository.
///
/// When `since` is `None` this is a first-ever collection: the window
/// shrinks to the last 30 days and the page cap drops, bounding the
/// catch-up cost on newly-onboarded libraries.
pub async fn collect(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    branch: &str,
    since: Option<DateTime<Utc>>,
    last_sha: Option<&str>,
    latest_tag: Option<&str>,
) -> CollectOutput {
    let first_time = since.is_none();
    let since = since.unwrap_or_else(|| Utc::now() - Duration::days(FIRST_COLLECT_DAYS));
    let max_pages = if first_time {
        FIRST_COLLECT_MAX_PAGES
    } else {
        DEFAULT_MAX_PAGES
    };

    let (commits, prs, tags, issues, ghsa) = tokio::join!(
        collect_commits(client, owner, repo, branch, since, last_sha, max_pages),
        collect_prs(client, owner, repo, since, max_pages),
        collect_tags(client, owner, repo, latest_tag, max_pages),
        collect_issues(client, owner, repo, since, max_pages),
        probe_ghsa(client, owner, repo),
    );

    let mut output = CollectOutput::default();
    for (name, result) in [
        ("commits", commits),
        ("prs", prs),
        ("tags", tags),
        ("issues", issues),
    ] {
        match result {
            Ok(events) => {
                output
                    .detail
                    .insert(name.to_string(), format!("ok ({})", events.len()));
                output.events.extend(events);
            }
            Err(err) => {
                let msg = format!("collect_{name} failed for {owner}/{repo}: {err}");
                error!(source = name, owner, repo, error = %err, "source collection failed");
                output.detail.insert(name.to_string(), format!("error: {err}"));
                output.errors.push(msg);
            }
        }
    }
    output.detail.insert(
        "ghsa".to_string(),
        match ghsa {
            Ok(()) => "ok".to_string(),
            Err(err) => format!("error: {err}"),
        },
    );

    // Enrich with cross-references extracted from titles and messages.
    for event in &mut output.events {
        refs::parse_refs(event, owner, repo);
    }

    output
}

/// Count collected events grouped by type.
#[must_use]
pub fn count_by_type(events: &[NewEvent]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.event_type.as_str()).or_insert(0) += 1;
    }
    counts
}

// ── sub-collectors ───────────────────────────────────────────────────────

/// `GET /repos/{o}/{r}/commits`: stop at the last-seen SHA, skip merge
/// commits (two or more parents).
async fn collect_commits(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    branch: &str,
    since: DateTime<Utc>,
    last_sha: Option<&str>,
    max_pages: usize,
) -> GitHubResult<Vec<NewEvent>> {
    let params = [
        ("sha", branch.to_string()),
        ("since", since.to_rfc3339()),
    ];
    let mut pages = client.paginate(&format!("/repos/{owner}/{repo}/commits"), &params, max_pages);

    let mut events = Vec::new();
    while let Some(item) = pages.next_item().await? {
        let sha = item["sha"].as_str().unwrap_or_default().to_string();
        if sha.is_empty() {
            continue;
        }
        if last_sha == Some(sha.as_str()) {
            break;
        }

        if item["parents"].as_array().map_or(0, Vec::len) > 1 {
            continue;
        }

        let commit = &item["commit"];
        let message = commit["message"].as_str().unwrap_or_default().to_string();
        let title = message.lines().next().unwrap_or_default().to_string();

        let mut event = NewEvent::new(EventType::Commit, sha, title.clone());
        event.source_url = item["html_url"].as_str().map(String::from);
        event.author = item["author"]["login"].as_str().map(String::from);
        event.event_at = parse_datetime(&commit["author"]["date"]);
        if message != title {
            event.message = Some(message);
        }
        events.push(event);
    }
    Ok(events)
}

/// `GET /repos/{o}/{r}/pulls?state=closed&sort=updated`: merged PRs
/// only.
///
/// The pulls API has no `since` parameter and `updated_at` is
/// independent of `merged_at`: a stale PR with a fresh comment sorts
/// first, so out-of-window rows are skipped, never used to break: the
/// page cap bounds the walk instead.
async fn collect_prs(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    since: DateTime<Utc>,
    max_pages: usize,
) -> GitHubResult<Vec<NewEvent>> {
    let params = [
        ("state", "closed".to_string()),
        ("sort", "updated".to_string()),
        ("direction", "desc".to_string()),
    ];
    let mut pages = client.paginate(&format!("/repos/{owner}/{repo}/pulls"), &params, max_pages);

    let mut events = Vec::new();
    while let Some(item) = pages.next_item().await? {
        let Some(merged_at) = parse_datetime(&item["merged_at"]) else {
            continue; // closed without merging
        };
        if merged_at < since {
            continue;
        }

        let Some(number) = item["number"].as_i64() else {
            continue;
        };

        let mut event = NewEvent::new(
            EventType::PrMerge,
            number.to_string(),
            item["title"].as_str().unwrap_or_default(),
        );
        event.source_url = item["html_url"].as_str().map(String::from);
        event.author = item["user"]["login"].as_str().map(String::from);
        event.event_at = Some(merged_at);
        event.message = item["body"].as_str().map(String::from);
        event.related_commit_sha = item["merge_commit_sha"].as_str().map(String::from);
        events.push(event);
    }
    Ok(events)
}

/// `GET /repos/{o}/{r}/tags`: stop at the last-seen tag name.
async fn collect_tags(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    latest_tag: Option<&str>,
    max_pages: usize,
) -> GitHubResult<Vec<NewEvent>> {
    let mut pages = client.paginate(&format!("/repos/{owner}/{repo}/tags"), &[], max_pages);

    let mut events = Vec::new();
    while let Some(item) = pages.next_item().await? {
        let name = item["name"].as_str().unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }
        if latest_tag == Some(name.as_str()) {
            break;
        }

        let mut event = NewEvent::new(EventType::Tag, name.clone(), name.clone());
        event.source_url = Some(format!(
            "https://github.com/{owner}/{repo}/releases/tag/{name}"
        ));
        event.related_commit_sha = item["commit"]["sha"].as_str().map(String::from);
        events.push(event);
    }
    Ok(events)
}

/// `GET /repos/{o}/{r}/issues?labels=bug`: the issues API includes
/// PRs; rows carrying a `pull_request` field are skipped.
async fn collect_issues(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    since: DateTime<Utc>,
    max_pages: usize,
) -> GitHubResult<Vec<NewEvent>> {
    let params = [
        ("labels", "bug".to_string()),
        ("state", "all".to_string()),
        ("sort", "updated".to_string()),
        ("direction", "desc".to_string()),
        ("since", since.to_rfc3339()),
    ];
    let mut pages = client.paginate(&format!("/repos/{owner}/{repo}/issues"), &params, max_pages);

    let mut events = Vec::new();
    while let Some(item) = pages.next_item().await? {
        if item.get("pull_request").is_some() {
            continue;
        }
        let Some(number) = item["number"].as_i64() else {
            continue;
        };

        let mut event = NewEvent::new(
            EventType::BugIssue,
            number.to_string(),
            item["title"].as_str().unwrap_or_default(),
        );
        event.source_url = item["html_url"].as_str().map(String::from);
        event.author = item["user"]["login"].as_str().map(String::from);
        event.event_at = parse_datetime(&item["created_at"]);
        event.message = item["body"].as_str().map(String::from);
        events.push(event);
    }
    Ok(events)
}

/// Health probe against `/security-advisories`. Advisories are not
/// ingested as events; a reachable endpoint is all this checks.
async fn probe_ghsa(client: &GitHubClient, owner: &str, repo: &str) -> GitHubResult<()> {
    let mut pages = client.paginate(
        &format!("/repos/{owner}/{repo}/security-advisories"),
        &[("per_page", "1".to_string())],
        1,
    );
    pages.next_item().await?;
    Ok(())
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
