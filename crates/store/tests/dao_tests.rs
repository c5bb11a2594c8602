//! DAO integration tests against a live Postgres.
//!
//! Ignored by default; run with a dedicated database:
//!
//! ```sh
//! VULNSENTINEL_TEST_DATABASE_URL=postgres://localhost/vulnsentinel_test \
//!     cargo test -p store -- --ignored
//! ```

use std::collections::HashSet;

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use store::cursor::CursorSigner;
use store::dao::{
    ClientVulnFilters, EventDao, LibraryDao, NewClientVuln, ProjectDao, ProjectDependencyDao,
    UpstreamVulnDao,
};
use store::dao::{DependencyUpsert, NewProject};
use store::models::{Classification, ClientStatus, EventType, NewEvent, PipelineStatus};
use store::service::{ClientVulnService, EventService, UpstreamVulnService};
use store::{PgPool, StoreError};

async fn test_pool() -> PgPool {
    let url = std::env::var("VULNSENTINEL_TEST_DATABASE_URL")
        .expect("VULNSENTINEL_TEST_DATABASE_URL must point at a test database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::raw_sql(include_str!("schema.sql"))
        .execute(&pool)
        .await
        .expect("apply test schema");
    pool
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

async fn make_library(pool: &PgPool) -> store::models::Library {
    let mut conn = pool.acquire().await.unwrap();
    let name = unique("lib");
    LibraryDao::upsert_by_name(
        &mut conn,
        &name,
        &format!("https://github.com/test/{name}"),
        "github",
        "main",
    )
    .await
    .unwrap()
}

async fn make_project(pool: &PgPool) -> store::models::Project {
    let mut conn = pool.acquire().await.unwrap();
    let name = unique("proj");
    ProjectDao::create(
        &mut conn,
        &NewProject {
            name: name.clone(),
            organization: None,
            repo_url: format!("https://github.com/test/{name}"),
            default_branch: "main".into(),
            contact: None,
            current_version: Some("v1.0".into()),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn upsert_by_name_is_idempotent_and_fork_protected() {
    let pool = test_pool().await;
    let mut conn = pool.acquire().await.unwrap();

    let name = unique("curl");
    let url = format!("https://github.com/test/{name}");

    let first = LibraryDao::upsert_by_name(&mut conn, &name, &url, "github", "master")
        .await
        .unwrap();
    let second = LibraryDao::upsert_by_name(&mut conn, &name, &url, "github", "master")
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    // Same name, different URL: fork protection.
    let err = LibraryDao::upsert_by_name(
        &mut conn,
        &name,
        "https://github.com/evil/fork",
        "github",
        "master",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
#[ignore]
async fn event_batch_create_skips_duplicates() {
    let pool = test_pool().await;
    let library = make_library(&pool).await;
    let mut conn = pool.acquire().await.unwrap();

    let events = vec![
        NewEvent::new(EventType::Commit, "sha-1", "first"),
        NewEvent::new(EventType::Commit, "sha-2", "second"),
    ];
    let inserted = EventDao::batch_create(&mut conn, library.id, &events)
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    // Second identical batch inserts nothing and changes no counts.
    let before = EventDao::count(&mut conn, Some(library.id)).await.unwrap();
    let inserted = EventDao::batch_create(&mut conn, library.id, &events)
        .await
        .unwrap();
    assert_eq!(inserted, 0);
    let after = EventDao::count(&mut conn, Some(library.id)).await.unwrap();
    assert_eq!(before, after);

    // Same ref under a different type is a distinct event.
    let tagged = vec![NewEvent::new(EventType::Tag, "sha-1", "sha-1")];
    let inserted = EventDao::batch_create(&mut conn, library.id, &tagged)
        .await
        .unwrap();
    assert_eq!(inserted, 1);
}

#[tokio::test]
#[ignore]
async fn classification_derives_is_bugfix_and_overwrites() {
    let pool = test_pool().await;
    let library = make_library(&pool).await;
    let mut conn = pool.acquire().await.unwrap();

    let events = vec![NewEvent::new(EventType::Commit, "sha-cls", "fix bounds")];
    EventDao::batch_create(&mut conn, library.id, &events)
        .await
        .unwrap();
    let event = EventService::list_unclassified(&mut conn, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.library_id == library.id)
        .unwrap();

    EventService::update_classification(&mut conn, event.id, Classification::SecurityBugfix, 0.9)
        .await
        .unwrap();
    let row = EventDao::get_by_id(&mut conn, event.id).await.unwrap().unwrap();
    assert_eq!(row.classification, Some(Classification::SecurityBugfix));
    assert!(row.is_bugfix);

    // Re-running classification overwrites deterministically.
    EventService::update_classification(&mut conn, event.id, Classification::NormalBugfix, 0.7)
        .await
        .unwrap();
    let row = EventDao::get_by_id(&mut conn, event.id).await.unwrap().unwrap();
    assert_eq!(row.classification, Some(Classification::NormalBugfix));
    assert!(!row.is_bugfix);
    assert_eq!(row.confidence, Some(0.7));
}

#[tokio::test]
#[ignore]
async fn published_vuln_flows_through_impact_queue() {
    let pool = test_pool().await;
    let library = make_library(&pool).await;
    let project = make_project(&pool).await;
    let mut conn = pool.acquire().await.unwrap();

    let events = vec![NewEvent::new(EventType::Commit, "sha-vuln", "fix UAF")];
    EventDao::batch_create(&mut conn, library.id, &events)
        .await
        .unwrap();
    let event = EventDao::list_paginated(
        &mut conn,
        &CursorSigner::new(b"test".to_vec()),
        None,
        100,
        Some(library.id),
    )
    .await
    .unwrap()
    .data
    .into_iter()
    .next()
    .unwrap();

    let vuln = UpstreamVulnDao::create(&mut conn, event.id, library.id, "sha-vuln")
        .await
        .unwrap();

    // Analyzing vulns are not in the queue; neither are published ones
    // without dependents.
    UpstreamVulnService::publish(&mut conn, vuln.id).await.unwrap();
    let queue = UpstreamVulnService::list_published_without_impact(&mut conn, 100)
        .await
        .unwrap();
    assert!(!queue.iter().any(|v| v.id == vuln.id));

    // A dependency puts it in the queue exactly once.
    ProjectDependencyDao::upsert(
        &mut conn,
        &DependencyUpsert {
            project_id: project.id,
            library_id: library.id,
            constraint_expr: Some(">= 1.0".into()),
            resolved_version: Some("1.2.0".into()),
            constraint_source: "conanfile.txt".into(),
        },
    )
    .await
    .unwrap();
    let queue = UpstreamVulnService::list_published_without_impact(&mut conn, 100)
        .await
        .unwrap();
    assert_eq!(queue.iter().filter(|v| v.id == vuln.id).count(), 1);

    // After the impact matcher creates the client vuln it disappears.
    let created = ClientVulnService::create(
        &mut conn,
        &NewClientVuln {
            upstream_vuln_id: vuln.id,
            project_id: project.id,
            constraint_expr: Some(">= 1.0".into()),
            constraint_source: Some("conanfile.txt".into()),
            resolved_version: Some("1.2.0".into()),
        },
    )
    .await
    .unwrap();
    assert!(created.is_some());
    let queue = UpstreamVulnService::list_published_without_impact(&mut conn, 100)
        .await
        .unwrap();
    assert!(!queue.iter().any(|v| v.id == vuln.id));

    // A duplicate insert is silently skipped.
    let duplicate = ClientVulnService::create(
        &mut conn,
        &NewClientVuln {
            upstream_vuln_id: vuln.id,
            project_id: project.id,
            constraint_expr: None,
            constraint_source: Some("manual".into()),
            resolved_version: None,
        },
    )
    .await
    .unwrap();
    assert!(duplicate.is_none());
}

#[tokio::test]
#[ignore]
async fn client_vuln_status_transitions_follow_the_dag() {
    let pool = test_pool().await;
    let library = make_library(&pool).await;
    let project = make_project(&pool).await;
    let mut conn = pool.acquire().await.unwrap();

    let events = vec![NewEvent::new(EventType::Commit, "sha-dag", "fix")];
    EventDao::batch_create(&mut conn, library.id, &events)
        .await
        .unwrap();
    let event = EventDao::list_paginated(
        &mut conn,
        &CursorSigner::new(b"test".to_vec()),
        None,
        100,
        Some(library.id),
    )
    .await
    .unwrap()
    .data
    .into_iter()
    .next()
    .unwrap();
    let vuln = UpstreamVulnDao::create(&mut conn, event.id, library.id, "sha-dag")
        .await
        .unwrap();
    let cv = ClientVulnService::create(
        &mut conn,
        &NewClientVuln {
            upstream_vuln_id: vuln.id,
            project_id: project.id,
            constraint_expr: None,
            constraint_source: None,
            resolved_version: None,
        },
    )
    .await
    .unwrap()
    .unwrap();

    // No status yet: feedback transitions are rejected.
    let err = ClientVulnService::update_status(&mut conn, cv.id, ClientStatus::Reported, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // Finalize affected: pipeline verified, status recorded, stamps set.
    ClientVulnService::finalize(&mut conn, cv.id, true).await.unwrap();
    let row = ClientVulnService::get(&mut conn, cv.id).await.unwrap().client_vuln;
    assert_eq!(row.pipeline_status, PipelineStatus::Verified);
    assert_eq!(row.status, Some(ClientStatus::Recorded));
    assert!(row.recorded_at.is_some());
    assert!(row.analysis_completed_at.is_some());

    // Skipping ahead is rejected.
    let err = ClientVulnService::update_status(&mut conn, cv.id, ClientStatus::Fixed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // The forward walk succeeds and stamps each step.
    ClientVulnService::update_status(&mut conn, cv.id, ClientStatus::Reported, None)
        .await
        .unwrap();
    let row = ClientVulnService::get(&mut conn, cv.id).await.unwrap().client_vuln;
    assert!(row.reported_at.is_some());

    ClientVulnService::update_status(&mut conn, cv.id, ClientStatus::Confirmed, Some("on it"))
        .await
        .unwrap();
    ClientVulnService::update_status(&mut conn, cv.id, ClientStatus::Fixed, Some("patched"))
        .await
        .unwrap();
    let row = ClientVulnService::get(&mut conn, cv.id).await.unwrap().client_vuln;
    assert_eq!(row.confirmed_msg.as_deref(), Some("on it"));
    assert_eq!(row.fixed_msg.as_deref(), Some("patched"));

    // Terminal: nothing moves out of fixed.
    let err = ClientVulnService::update_status(&mut conn, cv.id, ClientStatus::Reported, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
#[ignore]
async fn cursor_pagination_is_total_and_duplicate_free() {
    let pool = test_pool().await;
    let signer = CursorSigner::new(b"pagination-test".to_vec());

    let mut created = HashSet::new();
    for _ in 0..25 {
        created.insert(make_library(&pool).await.id);
    }

    let mut conn = pool.acquire().await.unwrap();
    let mut seen: Vec<Uuid> = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = LibraryDao::list_paginated(&mut conn, &signer, cursor.as_deref(), 10)
            .await
            .unwrap();
        seen.extend(page.data.iter().map(|l| l.id));
        match page.next_cursor {
            Some(next) if page.has_more => cursor = Some(next),
            _ => break,
        }
    }

    let distinct: HashSet<Uuid> = seen.iter().copied().collect();
    assert_eq!(distinct.len(), seen.len(), "no duplicates across pages");
    for id in &created {
        assert!(distinct.contains(id), "page union covers every row");
    }
}

#[tokio::test]
#[ignore]
async fn filtered_client_vuln_queries_join_upstream() {
    let pool = test_pool().await;
    let library = make_library(&pool).await;
    let project = make_project(&pool).await;
    let mut conn = pool.acquire().await.unwrap();

    let events = vec![NewEvent::new(EventType::Commit, "sha-filter", "fix")];
    EventDao::batch_create(&mut conn, library.id, &events)
        .await
        .unwrap();
    let event = EventDao::list_paginated(
        &mut conn,
        &CursorSigner::new(b"test".to_vec()),
        None,
        100,
        Some(library.id),
    )
    .await
    .unwrap()
    .data
    .into_iter()
    .next()
    .unwrap();
    let vuln = UpstreamVulnDao::create(&mut conn, event.id, library.id, "sha-filter")
        .await
        .unwrap();
    ClientVulnService::create(
        &mut conn,
        &NewClientVuln {
            upstream_vuln_id: vuln.id,
            project_id: project.id,
            constraint_expr: None,
            constraint_source: None,
            resolved_version: None,
        },
    )
    .await
    .unwrap();

    let filters = ClientVulnFilters {
        library_id: Some(library.id),
        project_id: Some(project.id),
        ..ClientVulnFilters::default()
    };
    let signer = CursorSigner::new(b"test".to_vec());
    let (page, total, _stats) =
        ClientVulnService::list(&mut conn, &signer, None, 20, &filters).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].project_id, project.id);
}
