//! Data-access objects.
//!
//! Each DAO is a unit struct with associated async functions. Every
//! function takes an explicit `&mut PgConnection`: callers decide
//! whether that connection is inside a transaction. Batch runners open
//! one transaction per entity so a bad row cannot roll back a
//! successful neighbor.

mod agent_run;
mod client_vuln;
mod dependency;
mod event;
mod library;
mod project;
mod upstream_vuln;

pub use agent_run::{AgentRunDao, NewAgentRun, NewAgentToolCall};
pub use client_vuln::{ClientVulnDao, ClientVulnFilters, NewClientVuln, PipelineUpdate, StatusCounts};
pub use dependency::{DependencyUpsert, ProjectDependencyDao};
pub use event::EventDao;
pub use library::{LibraryDao, PointerUpdate};
pub use project::{NewProject, ProjectDao};
pub use upstream_vuln::{AnalysisUpdate, UpstreamVulnDao};
