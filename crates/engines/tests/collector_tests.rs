//! Collector integration tests against a mock GitHub API.

use chrono::{Duration, Utc};
use engines::collector::collect;
use github::GitHubClient;
use serde_json::{json, Value};
use store::models::EventType;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GitHubClient {
    GitHubClient::new(Some("test-token"))
        .unwrap()
        .with_base_url(server.uri())
}

/// Mount empty responses for every source a test does not override.
async fn mount_empty_sources_except(server: &MockServer, overridden: &[&str]) {
    for endpoint in ["commits", "pulls", "tags", "issues", "security-advisories"] {
        if overridden.contains(&endpoint) {
            continue;
        }
        Mock::given(method("GET"))
            .and(path(format!("/repos/o/r/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }
}

fn commit(sha: &str, message: &str, parents: usize) -> Value {
    json!({
        "sha": sha,
        "html_url": format!("https://github.com/o/r/commit/{sha}"),
        "parents": (0..parents).map(|i| json!({"sha": format!("p{i}")})).collect::<Vec<_>>(),
        "author": {"login": "alice"},
        "commit": {
            "message": message,
            "author": {"date": "2026-07-20T10:00:00Z"}
        }
    })
}

#[tokio::test]
async fn commits_stop_at_last_seen_sha_and_skip_merges() {
    let server = MockServer::start().await;
    mount_empty_sources_except(&server, &["commits"]).await;

    Mock::given(method("GET"))
        .and(path("/repos/o/r/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            commit("new-2", "fix: new fix\n\nlonger body", 1),
            commit("merge-1", "Merge pull request #9", 2),
            commit("new-1", "improve docs", 1),
            commit("seen-0", "previously collected", 1),
            commit("old-1", "must never be reached", 1),
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let output = collect(
        &client,
        "o",
        "r",
        "main",
        Some(Utc::now() - Duration::days(7)),
        Some("seen-0"),
        None,
    )
    .await;

    assert!(output.errors.is_empty());
    let commits: Vec<_> = output
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Commit)
        .collect();
    let refs: Vec<&str> = commits.iter().map(|e| e.r#ref.as_str()).collect();
    // The merge commit is excluded; the walk stops at the watermark.
    assert_eq!(refs, vec!["new-2", "new-1"]);

    // Title is the first message line; the body is kept separately.
    assert_eq!(commits[0].title, "fix: new fix");
    assert_eq!(
        commits[0].message.as_deref(),
        Some("fix: new fix\n\nlonger body")
    );
    // Single-line messages don't duplicate the title.
    assert!(commits[1].message.is_none());
}

#[tokio::test]
async fn stale_but_recently_updated_pr_does_not_hide_fresh_merges() {
    let server = MockServer::start().await;
    mount_empty_sources_except(&server, &["pulls"]).await;

    let since = Utc::now() - Duration::days(30);
    let stale_merge = (Utc::now() - Duration::days(90)).to_rfc3339();
    let fresh_merge = (Utc::now() - Duration::days(1)).to_rfc3339();

    // sort=updated puts the stale-but-recently-commented PR first; a
    // `break` on its out-of-window merged_at would lose the fresh one.
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "number": 100,
                "title": "old PR with a new comment",
                "merged_at": stale_merge,
                "user": {"login": "bob"},
                "html_url": "https://github.com/o/r/pull/100"
            },
            {
                "number": 90,
                "title": "closed without merging",
                "merged_at": null,
                "user": {"login": "bob"},
                "html_url": "https://github.com/o/r/pull/90"
            },
            {
                "number": 101,
                "title": "fresh security fix",
                "merged_at": fresh_merge,
                "merge_commit_sha": "abc999",
                "user": {"login": "carol"},
                "html_url": "https://github.com/o/r/pull/101"
            }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let output = collect(&client, "o", "r", "main", Some(since), None, None).await;

    let prs: Vec<_> = output
        .events
        .iter()
        .filter(|e| e.event_type == EventType::PrMerge)
        .collect();
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].r#ref, "101");
    assert_eq!(prs[0].related_commit_sha.as_deref(), Some("abc999"));
}

#[tokio::test]
async fn tags_stop_at_latest_known_and_issues_skip_prs() {
    let server = MockServer::start().await;
    mount_empty_sources_except(&server, &["tags", "issues"]).await;

    Mock::given(method("GET"))
        .and(path("/repos/o/r/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "v2.1.0", "commit": {"sha": "ccc"}},
            {"name": "v2.0.0", "commit": {"sha": "bbb"}},
            {"name": "v1.9.0", "commit": {"sha": "aaa"}}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/o/r/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "number": 7,
                "title": "crash on malformed input",
                "user": {"login": "dave"},
                "created_at": "2026-07-25T08:00:00Z",
                "body": "segfault when ...",
                "html_url": "https://github.com/o/r/issues/7"
            },
            {
                "number": 8,
                "title": "a PR wearing an issue costume",
                "pull_request": {"url": "https://api.github.com/repos/o/r/pulls/8"},
                "user": {"login": "dave"},
                "html_url": "https://github.com/o/r/pull/8"
            }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let output = collect(
        &client,
        "o",
        "r",
        "main",
        Some(Utc::now() - Duration::days(7)),
        None,
        Some("v2.0.0"),
    )
    .await;

    let tags: Vec<&str> = output
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Tag)
        .map(|e| e.r#ref.as_str())
        .collect();
    assert_eq!(tags, vec!["v2.1.0"]);

    let issues: Vec<&str> = output
        .events
        .iter()
        .filter(|e| e.event_type == EventType::BugIssue)
        .map(|e| e.r#ref.as_str())
        .collect();
    assert_eq!(issues, vec!["7"]);
}

#[tokio::test]
async fn one_failing_source_does_not_poison_the_others() {
    let server = MockServer::start().await;

    for endpoint in ["commits", "pulls", "issues", "security-advisories"] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/o/r/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }
    // 404 is non-transient: the tags source fails immediately.
    Mock::given(method("GET"))
        .and(path("/repos/o/r/tags"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let output = collect(
        &client,
        "o",
        "r",
        "main",
        Some(Utc::now() - Duration::days(7)),
        None,
        None,
    )
    .await;

    assert_eq!(output.errors.len(), 1);
    assert!(output.errors[0].contains("collect_tags"));
    assert!(output.detail["tags"].starts_with("error:"));
    // Healthy sources still report ok.
    assert_eq!(output.detail["commits"], "ok (0)");
    assert_eq!(output.detail["ghsa"], "ok");
}

#[tokio::test]
async fn cross_references_are_extracted_after_collection() {
    let server = MockServer::start().await;
    mount_empty_sources_except(&server, &["commits"]).await;

    Mock::given(method("GET"))
        .and(path("/repos/o/r/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            commit("ref-1", "fix overflow (#55)\n\nFixes #44", 1),
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let output = collect(
        &client,
        "o",
        "r",
        "main",
        Some(Utc::now() - Duration::days(7)),
        None,
        None,
    )
    .await;

    let event = output
        .events
        .iter()
        .find(|e| e.r#ref == "ref-1")
        .unwrap();
    assert_eq!(event.related_issue_ref.as_deref(), Some("#44"));
    assert_eq!(
        event.related_issue_url.as_deref(),
        Some("https://github.com/o/r/issues/44")
    );
    assert_eq!(event.related_pr_ref.as_deref(), Some("#55"));
}

#[tokio::test]
async fn first_collection_uses_a_bounded_window() {
    let server = MockServer::start().await;
    mount_empty_sources_except(&server, &[]).await;

    let client = client_for(&server);
    // since=None: the collector must substitute a 30-day window rather
    // than walking unbounded history, and still complete cleanly.
    let output = collect(&client, "o", "r", "main", None, None, None).await;

    assert!(output.errors.is_empty());
    assert!(output.events.is_empty());
    assert_eq!(output.detail.len(), 5);
}
