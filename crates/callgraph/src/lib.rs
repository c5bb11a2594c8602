//! Interface to the external static-analysis store plus the
//! reachability checker built on top of it.
//!
//! The store owns its own persistence and builds call-graph snapshots
//! keyed by (repo_url, version); this crate never writes to it except
//! implicitly through [`SnapshotStore::build_snapshot`].

pub mod reachability;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use reachability::{ReachabilityChecker, ReachabilityOutcome, Strategy, VulnImpactRequest};

/// Errors surfaced by the snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Building a snapshot failed; the reason is the store's message
    #[error("snapshot build failed: {0}")]
    BuildFailed(String),

    /// Any other store-side failure (connectivity, query)
    #[error("snapshot store error: {0}")]
    Store(String),
}

/// One fuzzer harness known to a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzerInfo {
    pub name: String,
    pub entry_function: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// One function reachable from a fuzzer entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachableFunction {
    pub name: String,
    pub file_path: Option<String>,
    pub depth: Option<u32>,
    #[serde(default)]
    pub is_external: bool,
}

/// A node-by-node call path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallPath {
    pub path: Vec<String>,
}

/// Result of a shortest-path query between two functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortestPath {
    pub length: u32,
    pub paths_found: u32,
    #[serde(default)]
    pub paths: Vec<CallPath>,
}

/// Read-only contract of the call-graph snapshot store.
///
/// Snapshots are keyed by (repo_url, version). `build_snapshot` may be
/// slow and may fail with a string reason; everything else is a cheap
/// query over an existing snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn find_snapshot(
        &self,
        repo_url: &str,
        version: &str,
    ) -> Result<Option<String>, SnapshotError>;

    async fn build_snapshot(&self, repo_url: &str, version: &str)
        -> Result<String, SnapshotError>;

    async fn list_fuzzer_info(&self, snapshot_id: &str) -> Result<Vec<FuzzerInfo>, SnapshotError>;

    async fn reachable_functions_by_one_fuzzer(
        &self,
        snapshot_id: &str,
        fuzzer_name: &str,
        max_depth: Option<u32>,
    ) -> Result<Vec<ReachableFunction>, SnapshotError>;

    async fn shortest_path(
        &self,
        snapshot_id: &str,
        from_name: &str,
        to_name: &str,
    ) -> Result<Option<ShortestPath>, SnapshotError>;
}
