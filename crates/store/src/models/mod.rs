//! Row structs and database enums.
//!
//! Every table carries a UUID primary key plus `created_at` / `updated_at`
//! timestamps and participates in `(created_at DESC, id DESC)` cursor
//! pagination via [`CursorAnchor`](crate::cursor::CursorAnchor).

mod agent_run;
mod client_vuln;
mod dependency;
mod enums;
mod event;
mod library;
mod project;
mod upstream_vuln;

pub use agent_run::{AgentRun, AgentToolCall};
pub use client_vuln::ClientVuln;
pub use dependency::ProjectDependency;
pub use enums::{
    AgentRunStatus, AgentType, Classification, ClientStatus, EventType, PipelineStatus, Severity,
    VulnStatus,
};
pub use event::{Event, NewEvent};
pub use library::Library;
pub use project::Project;
pub use upstream_vuln::UpstreamVuln;

macro_rules! impl_cursor_anchor {
    ($($model:ty),+ $(,)?) => {
        $(
            impl crate::cursor::CursorAnchor for $model {
                fn cursor_created_at(&self) -> chrono::DateTime<chrono::Utc> {
                    self.created_at
                }
                fn cursor_id(&self) -> uuid::Uuid {
                    self.id
                }
            }
        )+
    };
}

impl_cursor_anchor!(
    Library,
    Project,
    ProjectDependency,
    Event,
    UpstreamVuln,
    ClientVuln,
    AgentRun,
    AgentToolCall,
);
