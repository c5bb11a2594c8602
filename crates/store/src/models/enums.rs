//! Database-level enumerations.

use serde::{Deserialize, Serialize};

/// One observation in an upstream repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Commit,
    PrMerge,
    Tag,
    BugIssue,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::PrMerge => "pr_merge",
            Self::Tag => "tag",
            Self::BugIssue => "bug_issue",
        }
    }
}

/// Classifier verdict for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_classification", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    SecurityBugfix,
    NormalBugfix,
    Refactor,
    Feature,
    Other,
}

impl Classification {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SecurityBugfix => "security_bugfix",
            Self::NormalBugfix => "normal_bugfix",
            Self::Refactor => "refactor",
            Self::Feature => "feature",
            Self::Other => "other",
        }
    }

    /// `is_bugfix` is derived: true iff the classification is
    /// `security_bugfix`.
    #[must_use]
    pub fn is_bugfix(self) -> bool {
        matches!(self, Self::SecurityBugfix)
    }
}

/// Severity of an upstream vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "severity_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Lifecycle of an upstream vulnerability record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "upstream_vuln_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VulnStatus {
    Analyzing,
    Published,
}

/// Automated-processing state of a client vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pipeline_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    PathSearching,
    PocGenerating,
    Verified,
    NotAffect,
}

/// Human-visible lifecycle state of a client vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "client_vuln_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Recorded,
    Reported,
    Confirmed,
    Fixed,
    NotAffect,
}

impl ClientStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::Reported => "reported",
            Self::Confirmed => "confirmed",
            Self::Fixed => "fixed",
            Self::NotAffect => "not_affect",
        }
    }

    /// Terminal states permit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Fixed | Self::NotAffect)
    }
}

/// Which agent produced an audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "agent_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    EventClassifier,
    VulnAnalyzer,
    Reachability,
    PocGenerator,
    Report,
}

/// Final status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "agent_run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}
