//! The seven pipeline stages and their scheduler.
//!
//! ```text
//! DependencyScanner → EventCollector → EventClassifier → VulnAnalyzer
//!                                                           ↓
//!                               Notification ← Reachability ← ImpactMatcher
//! ```
//!
//! Each stage is a runner struct owning a `run_batch()` that polls the
//! store, processes items with per-item transaction isolation, and
//! returns the number of items processed. The [`scheduler`] wires the
//! runners into a chain of long-running loops with push-on-progress
//! wake-ups and pull-on-timeout polling; engines never call each other
//! directly.

pub mod analyzer;
pub mod audit;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod impact;
pub mod json_extract;
pub mod notification;
pub mod reachability;
pub mod scanner;
pub mod scheduler;
pub mod wiring;

pub use config::Config;
pub use scheduler::{EngineLoop, Scheduler};
pub use wiring::{build_scheduler, Runners};
