//! Stateless services: invariant enforcement over the DAOs.
//!
//! Services never own a transaction; like the DAOs they operate on an
//! explicit `&mut PgConnection` supplied by the engine that owns the
//! work unit.

mod client_vuln;
mod event;
mod library;
mod project;
mod upstream_vuln;

pub use client_vuln::{ClientVulnDetail, ClientVulnService};
pub use event::{EventDetail, EventService};
pub use library::{LibraryDetail, LibraryService, LibraryUsedBy};
pub use project::ProjectService;
pub use upstream_vuln::{UpstreamVulnDetail, UpstreamVulnService};
