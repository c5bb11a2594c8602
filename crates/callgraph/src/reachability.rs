//! Reachability checker: joins the client and library snapshots and
//! runs the fuzzer-reach and shortest-path strategies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{CallPath, SnapshotStore};

/// Entry function the shortest-path fallback starts from.
const PATH_SEARCH_ROOT: &str = "main";

/// Which strategy produced (or failed to produce) a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    FuzzerReaches,
    ShortestPath,
    Exhausted,
}

impl Strategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FuzzerReaches => "fuzzer_reaches",
            Self::ShortestPath => "shortest_path",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Input for one vulnerability-impact investigation.
#[derive(Debug, Clone)]
pub struct VulnImpactRequest {
    pub client_repo_url: String,
    pub client_version: String,
    pub library_repo_url: String,
    pub library_version: String,
    pub affected_functions: Vec<String>,
    pub commit_sha: Option<String>,
}

/// Outcome of an investigation.
#[derive(Debug, Clone)]
pub struct ReachabilityOutcome {
    pub is_reachable: bool,
    pub searched_functions: Vec<String>,
    pub client_snapshot_id: Option<String>,
    pub library_snapshot_id: Option<String>,
    pub depth: Option<u32>,
    pub paths: Option<Vec<CallPath>>,
    pub strategy: Option<Strategy>,
    pub error: Option<String>,
}

impl ReachabilityOutcome {
    fn error(message: impl Into<String>, searched: Vec<String>) -> Self {
        Self {
            is_reachable: false,
            searched_functions: searched,
            client_snapshot_id: None,
            library_snapshot_id: None,
            depth: None,
            paths: None,
            strategy: None,
            error: Some(message.into()),
        }
    }
}

/// Facade over the snapshot store: ensures both snapshots exist, then
/// tries fuzzer-reach, then shortest-path from `main`, then gives up.
pub struct ReachabilityChecker {
    store: Arc<dyn SnapshotStore>,
}

impl ReachabilityChecker {
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Run one investigation.
    ///
    /// Errors never propagate: they are folded into the outcome's
    /// `error` field so the engine can record them and finalize.
    pub async fn investigate(&self, request: &VulnImpactRequest) -> ReachabilityOutcome {
        let targets: Vec<String> = request
            .affected_functions
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if targets.is_empty() {
            return ReachabilityOutcome::error("no_affected_functions", Vec::new());
        }

        // 1. Client snapshot: this is the graph we search.
        let client_sid = match self
            .ensure_snapshot(&request.client_repo_url, &request.client_version)
            .await
        {
            Ok(sid) => sid,
            Err(reason) => {
                return ReachabilityOutcome::error(
                    format!("client_snapshot_build_failed: {reason}"),
                    targets,
                );
            }
        };

        // 2. Library snapshot: built for the resolved version so future
        //    queries against library internals have a graph to hit.
        let library_sid = match self
            .ensure_snapshot(&request.library_repo_url, &request.library_version)
            .await
        {
            Ok(sid) => sid,
            Err(reason) => {
                let mut outcome = ReachabilityOutcome::error(
                    format!("library_snapshot_build_failed: {reason}"),
                    targets,
                );
                outcome.client_snapshot_id = Some(client_sid);
                return outcome;
            }
        };

        // 3. Fuzzer-reach strategy: first fuzzer whose reachable set
        //    contains any target wins.
        if let Some(mut outcome) = self.check_fuzzer_reaches(&client_sid, &targets).await {
            outcome.library_snapshot_id = Some(library_sid);
            return outcome;
        }

        // 4. Shortest-path fallback from `main` to each target.
        if let Some(mut outcome) = self.check_shortest_path(&client_sid, &targets).await {
            outcome.library_snapshot_id = Some(library_sid);
            return outcome;
        }

        // 5. Both strategies exhausted.
        info!(
            client_snapshot = %client_sid,
            targets = targets.len(),
            "no reachable path found"
        );
        ReachabilityOutcome {
            is_reachable: false,
            searched_functions: targets,
            client_snapshot_id: Some(client_sid),
            library_snapshot_id: Some(library_sid),
            depth: None,
            paths: None,
            strategy: Some(Strategy::Exhausted),
            error: None,
        }
    }

    /// Find an existing snapshot or build one; `Err` carries the build
    /// failure reason.
    async fn ensure_snapshot(&self, repo_url: &str, version: &str) -> Result<String, String> {
        match self.store.find_snapshot(repo_url, version).await {
            Ok(Some(sid)) => {
                debug!(repo_url, version, snapshot = %sid, "snapshot cache hit");
                return Ok(sid);
            }
            Ok(None) => {}
            Err(err) => return Err(err.to_string()),
        }

        info!(repo_url, version, "snapshot cache miss, building");
        self.store
            .build_snapshot(repo_url, version)
            .await
            .map_err(|e| e.to_string())
    }

    async fn check_fuzzer_reaches(
        &self,
        snapshot_id: &str,
        targets: &[String],
    ) -> Option<ReachabilityOutcome> {
        let fuzzers = match self.store.list_fuzzer_info(snapshot_id).await {
            Ok(fuzzers) => fuzzers,
            Err(err) => {
                debug!(snapshot = snapshot_id, error = %err, "fuzzer listing failed");
                return None;
            }
        };

        for fuzzer in fuzzers {
            if fuzzer.name.is_empty() {
                continue;
            }
            let reachable = match self
                .store
                .reachable_functions_by_one_fuzzer(snapshot_id, &fuzzer.name, None)
                .await
            {
                Ok(reachable) => reachable,
                Err(err) => {
                    debug!(fuzzer = %fuzzer.name, error = %err, "fuzzer reach query failed");
                    continue;
                }
            };

            for target in targets {
                if let Some(hit) = reachable.iter().find(|r| &r.name == target) {
                    info!(
                        fuzzer = %fuzzer.name,
                        target = %target,
                        depth = ?hit.depth,
                        "target reachable from fuzzer"
                    );
                    return Some(ReachabilityOutcome {
                        is_reachable: true,
                        searched_functions: targets.to_vec(),
                        client_snapshot_id: Some(snapshot_id.to_string()),
                        library_snapshot_id: None,
                        depth: hit.depth,
                        paths: None,
                        strategy: Some(Strategy::FuzzerReaches),
                        error: None,
                    });
                }
            }
        }

        None
    }

    async fn check_shortest_path(
        &self,
        snapshot_id: &str,
        targets: &[String],
    ) -> Option<ReachabilityOutcome> {
        for target in targets {
            let result = match self
                .store
                .shortest_path(snapshot_id, PATH_SEARCH_ROOT, target)
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    debug!(target = %target, error = %err, "shortest path query failed");
                    continue;
                }
            };

            if let Some(sp) = result {
                if sp.paths_found > 0 {
                    info!(
                        target = %target,
                        length = sp.length,
                        "target reachable via shortest path"
                    );
                    return Some(ReachabilityOutcome {
                        is_reachable: true,
                        searched_functions: targets.to_vec(),
                        client_snapshot_id: Some(snapshot_id.to_string()),
                        library_snapshot_id: None,
                        depth: Some(sp.length),
                        paths: Some(sp.paths),
                        strategy: Some(Strategy::ShortestPath),
                        error: None,
                    });
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FuzzerInfo, ReachableFunction, ShortestPath, SnapshotError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store: snapshots keyed by "repo@version", plus canned
    /// fuzzer and path data for the client snapshot.
    #[derive(Default)]
    struct FakeStore {
        snapshots: Mutex<HashMap<String, String>>,
        build_fails_for: Option<String>,
        fuzzers: Vec<FuzzerInfo>,
        reachable: HashMap<String, Vec<ReachableFunction>>,
        shortest: HashMap<String, ShortestPath>,
        builds: Mutex<Vec<String>>,
    }

    fn key(repo: &str, version: &str) -> String {
        format!("{repo}@{version}")
    }

    #[async_trait]
    impl SnapshotStore for FakeStore {
        async fn find_snapshot(
            &self,
            repo_url: &str,
            version: &str,
        ) -> Result<Option<String>, SnapshotError> {
            Ok(self.snapshots.lock().unwrap().get(&key(repo_url, version)).cloned())
        }

        async fn build_snapshot(
            &self,
            repo_url: &str,
            version: &str,
        ) -> Result<String, SnapshotError> {
            if self.build_fails_for.as_deref() == Some(repo_url) {
                return Err(SnapshotError::BuildFailed("clone failed".into()));
            }
            let sid = format!("snap-{}", key(repo_url, version));
            self.builds.lock().unwrap().push(sid.clone());
            self.snapshots
                .lock()
                .unwrap()
                .insert(key(repo_url, version), sid.clone());
            Ok(sid)
        }

        async fn list_fuzzer_info(
            &self,
            _snapshot_id: &str,
        ) -> Result<Vec<FuzzerInfo>, SnapshotError> {
            Ok(self.fuzzers.clone())
        }

        async fn reachable_functions_by_one_fuzzer(
            &self,
            _snapshot_id: &str,
            fuzzer_name: &str,
            _max_depth: Option<u32>,
        ) -> Result<Vec<ReachableFunction>, SnapshotError> {
            Ok(self.reachable.get(fuzzer_name).cloned().unwrap_or_default())
        }

        async fn shortest_path(
            &self,
            _snapshot_id: &str,
            _from_name: &str,
            to_name: &str,
        ) -> Result<Option<ShortestPath>, SnapshotError> {
            Ok(self.shortest.get(to_name).cloned())
        }
    }

    fn request(functions: &[&str]) -> VulnImpactRequest {
        VulnImpactRequest {
            client_repo_url: "https://github.com/acme/app".into(),
            client_version: "v2.0".into(),
            library_repo_url: "https://github.com/curl/curl".into(),
            library_version: "8.5.0".into(),
            affected_functions: functions.iter().map(|s| s.to_string()).collect(),
            commit_sha: Some("abc123".into()),
        }
    }

    #[tokio::test]
    async fn fuzzer_reach_wins_first() {
        let mut store = FakeStore::default();
        store.fuzzers = vec![FuzzerInfo {
            name: "url_fuzzer".into(),
            entry_function: Some("LLVMFuzzerTestOneInput".into()),
            files: vec![],
        }];
        store.reachable.insert(
            "url_fuzzer".into(),
            vec![ReachableFunction {
                name: "parse_url".into(),
                file_path: Some("lib/url.c".into()),
                depth: Some(3),
                is_external: true,
            }],
        );

        let checker = ReachabilityChecker::new(Arc::new(store));
        let outcome = checker.investigate(&request(&["parse_url"])).await;

        assert!(outcome.is_reachable);
        assert_eq!(outcome.strategy, Some(Strategy::FuzzerReaches));
        assert_eq!(outcome.depth, Some(3));
        assert!(outcome.client_snapshot_id.is_some());
        assert!(outcome.library_snapshot_id.is_some());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_shortest_path() {
        let mut store = FakeStore::default();
        store.shortest.insert(
            "parse_url".into(),
            ShortestPath {
                length: 5,
                paths_found: 1,
                paths: vec![CallPath {
                    path: vec![
                        "main".into(),
                        "run".into(),
                        "fetch".into(),
                        "request".into(),
                        "resolve".into(),
                        "parse_url".into(),
                    ],
                }],
            },
        );

        let checker = ReachabilityChecker::new(Arc::new(store));
        let outcome = checker.investigate(&request(&["parse_url"])).await;

        assert!(outcome.is_reachable);
        assert_eq!(outcome.strategy, Some(Strategy::ShortestPath));
        assert_eq!(outcome.depth, Some(5));
        assert_eq!(outcome.paths.unwrap()[0].path.len(), 6);
    }

    #[tokio::test]
    async fn exhausted_when_nothing_reaches() {
        let checker = ReachabilityChecker::new(Arc::new(FakeStore::default()));
        let outcome = checker.investigate(&request(&["parse_url"])).await;

        assert!(!outcome.is_reachable);
        assert_eq!(outcome.strategy, Some(Strategy::Exhausted));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.searched_functions, vec!["parse_url"]);
    }

    #[tokio::test]
    async fn empty_targets_is_an_error() {
        let checker = ReachabilityChecker::new(Arc::new(FakeStore::default()));
        let outcome = checker.investigate(&request(&[])).await;

        assert!(!outcome.is_reachable);
        assert_eq!(outcome.error.as_deref(), Some("no_affected_functions"));
        assert!(outcome.strategy.is_none());
    }

    #[tokio::test]
    async fn client_build_failure_carries_reason() {
        let store = FakeStore {
            build_fails_for: Some("https://github.com/acme/app".into()),
            ..FakeStore::default()
        };
        let checker = ReachabilityChecker::new(Arc::new(store));
        let outcome = checker.investigate(&request(&["parse_url"])).await;

        assert!(!outcome.is_reachable);
        let err = outcome.error.unwrap();
        assert!(err.starts_with("client_snapshot_build_failed:"));
        assert!(err.contains("clone failed"));
    }

    #[tokio::test]
    async fn existing_snapshots_are_not_rebuilt() {
        let store = FakeStore::default();
        store.snapshots.lock().unwrap().insert(
            key("https://github.com/acme/app", "v2.0"),
            "snap-client".into(),
        );
        store.snapshots.lock().unwrap().insert(
            key("https://github.com/curl/curl", "8.5.0"),
            "snap-lib".into(),
        );
        let store = Arc::new(store);

        let checker = ReachabilityChecker::new(store.clone());
        let outcome = checker.investigate(&request(&["parse_url"])).await;

        assert_eq!(outcome.client_snapshot_id.as_deref(), Some("snap-client"));
        assert!(store.builds.lock().unwrap().is_empty());
    }
}
