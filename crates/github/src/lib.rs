//! GitHub REST client for the collector and the agent tools.
//!
//! Wraps [`reqwest`] with the behavior every caller needs and none wants
//! to reimplement:
//!
//! - bearer authentication from an explicit token or `GITHUB_TOKEN`
//! - `Link: <…>; rel="next"` pagination behind a pull-based iterator
//!   ([`PageIter`]) with a configurable page cap
//! - rate-limit handling: a 403 carrying rate-limit indicators sleeps
//!   until reset and retries; `X-RateLimit-Remaining: 0` on any response
//!   sleeps before the next request goes out
//! - three attempts with exponential backoff (1, 2, 4 s) on timeouts and
//!   5xx; other 4xx propagate immediately

pub mod error;

use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::warn;

pub use error::{GitHubError, GitHubResult};

const GITHUB_API_URL: &str = "https://api.github.com";
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default page cap for paginated endpoints.
pub const DEFAULT_MAX_PAGES: usize = 10;
/// Reduced page cap for a library's first-ever collection.
pub const FIRST_COLLECT_MAX_PAGES: usize = 3;

fn next_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([^>]+)>;\s*rel="next""#)
            .unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

/// Thin async wrapper around the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Create a client. When `token` is `None`, `GITHUB_TOKEN` is read
    /// from the environment; unauthenticated clients work against public
    /// repos at a much lower rate limit.
    pub fn new(token: Option<&str>) -> GitHubResult<Self> {
        let resolved = token
            .map(String::from)
            .or_else(|| std::env::var("GITHUB_TOKEN").ok());

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("vulnsentinel/1.0"));
        if let Some(token) = resolved {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GitHubError::InvalidRepoUrl("invalid GITHUB_TOKEN".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: GITHUB_API_URL.to_string(),
        })
    }

    /// Point the client at a different base URL (tests, GHE).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Iterate items from a paginated endpoint.
    ///
    /// Query parameters are only sent with the first request: the
    /// `next` URL from the `Link` header already encodes them. A
    /// `per_page=100` default is applied unless the caller overrides it.
    #[must_use]
    pub fn paginate(
        &self,
        path: &str,
        params: &[(&str, String)],
        max_pages: usize,
    ) -> PageIter<'_> {
        let mut params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        if !params.iter().any(|(k, _)| k == "per_page") {
            params.push(("per_page".to_string(), "100".to_string()));
        }

        PageIter {
            client: self,
            next_url: Some(self.absolute(path)),
            first_params: Some(params),
            buffer: VecDeque::new(),
            pages_fetched: 0,
            max_pages,
        }
    }

    /// Single-resource GET returning the parsed JSON body.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> GitHubResult<Value> {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        let response = self
            .request_with_retry(&self.absolute(path), Some(&params), None)
            .await?;
        self.check_rate_limit(&response).await;
        Ok(response.json().await?)
    }

    /// Single-resource GET with a custom `Accept` header (diff and patch
    /// media types), returning the raw body.
    pub async fn get_with_accept(&self, path: &str, accept: &str) -> GitHubResult<String> {
        let response = self
            .request_with_retry(&self.absolute(path), None, Some(accept))
            .await?;
        self.check_rate_limit(&response).await;
        Ok(response.text().await?)
    }

    fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    /// GET with exponential backoff on 5xx, rate-limited 403, and
    /// timeouts. Non-transient 4xx propagates immediately.
    async fn request_with_retry(
        &self,
        url: &str,
        params: Option<&[(String, String)]>,
        accept: Option<&str>,
    ) -> GitHubResult<Response> {
        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            let mut request = self.client.get(url);
            if let Some(params) = params {
                request = request.query(params);
            }
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::FORBIDDEN && is_rate_limited(&resp) {
                        let wait = rate_limit_wait(&resp);
                        warn!(
                            url,
                            wait_seconds = wait.as_secs(),
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            "GitHub rate limit hit"
                        );
                        tokio::time::sleep(wait).await;
                        last_error = format!("rate limited, waited {}s", wait.as_secs());
                        continue;
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(GitHubError::Auth { status, body });
                    }

                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(GitHubError::Status { status, body });
                    }

                    if status.is_server_error() {
                        warn!(
                            url,
                            status = status.as_u16(),
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            "GitHub server error"
                        );
                        last_error = format!("server error {status}");
                    } else {
                        return Ok(resp);
                    }
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %err,
                        "GitHub request timed out"
                    );
                    last_error = err.to_string();
                }
                Err(err) => return Err(GitHubError::Transport(err)),
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt)).await;
            }
        }

        Err(GitHubError::RetriesExhausted(last_error))
    }

    /// Sleep until the rate limit resets when the quota is exhausted.
    async fn check_rate_limit(&self, response: &Response) {
        let remaining = header_int(response, "X-RateLimit-Remaining");
        if remaining == Some(0) {
            let wait = rate_limit_wait(response);
            warn!(wait_seconds = wait.as_secs(), "GitHub rate limit exhausted");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Pull-based iterator over a paginated endpoint. Fetching stops as soon
/// as the caller stops pulling, so an early `break` never costs extra
/// pages.
pub struct PageIter<'a> {
    client: &'a GitHubClient,
    next_url: Option<String>,
    first_params: Option<Vec<(String, String)>>,
    buffer: VecDeque<Value>,
    pages_fetched: usize,
    max_pages: usize,
}

impl PageIter<'_> {
    /// The next item, fetching the next page when the buffer drains.
    /// `Ok(None)` means the endpoint (or the page cap) is exhausted.
    pub async fn next_item(&mut self) -> GitHubResult<Option<Value>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }

            if self.pages_fetched >= self.max_pages {
                return Ok(None);
            }
            let Some(url) = self.next_url.take() else {
                return Ok(None);
            };

            let params = self.first_params.take();
            let response = self
                .client
                .request_with_retry(&url, params.as_deref(), None)
                .await?;
            self.client.check_rate_limit(&response).await;

            self.next_url = parse_next_link(&response);
            self.pages_fetched += 1;

            let body: Value = response.json().await?;
            match body {
                Value::Array(items) => self.buffer.extend(items),
                other => self.buffer.push_back(other),
            }
        }
    }

    /// Drain the iterator into a vector (convenience for sources that
    /// always consume every page).
    pub async fn collect_all(mut self) -> GitHubResult<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }
}

fn parse_next_link(response: &Response) -> Option<String> {
    let link = response.headers().get("Link")?.to_str().ok()?;
    next_link_re()
        .captures(link)
        .map(|caps| caps[1].to_string())
}

fn header_int(response: &Response, name: &str) -> Option<i64> {
    response
        .headers()
        .get(name)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn is_rate_limited(response: &Response) -> bool {
    if let Some(remaining) = header_int(response, "X-RateLimit-Remaining") {
        return remaining == 0;
    }
    // Secondary/abuse rate limits signal via Retry-After only.
    response.headers().contains_key("Retry-After")
}

fn rate_limit_wait(response: &Response) -> Duration {
    // Prefer Retry-After (secondary rate limits).
    if let Some(retry_after) = header_int(response, "Retry-After") {
        return Duration::from_secs(retry_after.max(1) as u64);
    }
    // Fall back to the X-RateLimit-Reset epoch timestamp.
    if let Some(reset) = header_int(response, "X-RateLimit-Reset") {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        return Duration::from_secs((reset - now).max(1) as u64);
    }
    Duration::from_secs(60)
}

/// Extract `(owner, repo)` from a GitHub repository URL.
///
/// Handles `https://github.com/owner/repo`, a trailing `/` or `.git`,
/// and the SSH form `git@github.com:owner/repo.git`.
pub fn parse_repo_url(repo_url: &str) -> GitHubResult<(String, String)> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    if let Some(rest) = trimmed.strip_prefix("git@") {
        let (_, path) = rest
            .split_once(':')
            .ok_or_else(|| GitHubError::InvalidRepoUrl(repo_url.to_string()))?;
        let mut parts = path.split('/');
        if let (Some(owner), Some(repo), None) = (parts.next(), parts.next(), parts.next()) {
            if !owner.is_empty() && !repo.is_empty() {
                return Ok((owner.to_string(), repo.to_string()));
            }
        }
        return Err(GitHubError::InvalidRepoUrl(repo_url.to_string()));
    }

    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() >= 2 {
        let owner = parts[parts.len() - 2];
        let repo = parts[parts.len() - 1];
        if !owner.is_empty() && !repo.is_empty() && !owner.contains(':') {
            return Ok((owner.to_string(), repo.to_string()));
        }
    }
    Err(GitHubError::InvalidRepoUrl(repo_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_urls() {
        assert_eq!(
            parse_repo_url("https://github.com/curl/curl").unwrap(),
            ("curl".to_string(), "curl".to_string())
        );
        assert_eq!(
            parse_repo_url("https://github.com/curl/curl.git").unwrap(),
            ("curl".to_string(), "curl".to_string())
        );
        assert_eq!(
            parse_repo_url("https://github.com/curl/curl/ ").unwrap(),
            ("curl".to_string(), "curl".to_string())
        );
    }

    #[test]
    fn parses_ssh_urls() {
        assert_eq!(
            parse_repo_url("git@github.com:madler/zlib.git").unwrap(),
            ("madler".to_string(), "zlib".to_string())
        );
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(parse_repo_url("").is_err());
        assert!(parse_repo_url("git@github.com").is_err());
        assert!(parse_repo_url("git@github.com:too/many/parts").is_err());
    }

    #[test]
    fn extracts_next_link() {
        let link = "<https://api.github.com/repos/a/b/commits?page=2>; rel=\"next\", \
                    <https://api.github.com/repos/a/b/commits?page=9>; rel=\"last\"";
        let caps = next_link_re().captures(link).unwrap();
        assert_eq!(&caps[1], "https://api.github.com/repos/a/b/commits?page=2");
    }

    #[test]
    fn no_next_link_when_absent() {
        let link = "<https://api.github.com/x?page=1>; rel=\"prev\"";
        assert!(next_link_re().captures(link).is_none());
    }
}
