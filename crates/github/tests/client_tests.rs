//! Integration tests for the GitHub client against a mock server.

use github::{GitHubClient, GitHubError, DEFAULT_MAX_PAGES};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn client_for(server: &MockServer) -> GitHubClient {
    GitHubClient::new(Some("test-token"))
        .unwrap()
        .with_base_url(server.uri())
}

#[tokio::test]
async fn paginates_across_link_headers() {
    let server = MockServer::start().await;

    let next = format!("<{}/repos/a/b/commits?page=2>; rel=\"next\"", server.uri());
    Mock::given(method("GET"))
        .and(path("/repos/a/b/commits"))
        .and(query_param("per_page", "100"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next.as_str())
                .set_body_json(json!([{"sha": "one"}, {"sha": "two"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/a/b/commits"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sha": "three"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let items = client
        .paginate("/repos/a/b/commits", &[], DEFAULT_MAX_PAGES)
        .collect_all()
        .await
        .unwrap();

    let shas: Vec<&str> = items.iter().map(|i| i["sha"].as_str().unwrap()).collect();
    assert_eq!(shas, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn stops_at_page_cap() {
    let server = MockServer::start().await;

    // Every page advertises a next page; only the cap stops us.
    struct Endless;
    impl Respond for Endless {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let next = format!(
                "<http://{}/loop?page=2>; rel=\"next\"",
                request.url.authority()
            );
            ResponseTemplate::new(200)
                .insert_header("Link", next.as_str())
                .set_body_json(json!([{"n": 1}]))
        }
    }

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(Endless)
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let items = client.paginate("/loop", &[], 2).collect_all().await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get("/flaky", &[]).await.unwrap();
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get("/missing", &[]).await.unwrap_err();
    assert!(matches!(err, GitHubError::Status { status, .. } if status.as_u16() == 404));
}

#[tokio::test]
async fn forbidden_without_rate_headers_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get("/private", &[]).await.unwrap_err();
    assert!(matches!(err, GitHubError::Auth { .. }));
}

#[tokio::test]
async fn rate_limited_forbidden_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("Retry-After", "1"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get("/limited", &[]).await.unwrap();
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn single_object_responses_yield_one_item() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/single"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "v1.0"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let items = client
        .paginate("/single", &[], DEFAULT_MAX_PAGES)
        .collect_all()
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], json!("v1.0"));
}
