//! `events` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Classification, EventType};

/// One observation in an upstream repo (commit, merged PR, tag, or bug
/// issue). Append-only; unique on (library_id, type, ref).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub library_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// SHA / PR number / tag name / issue number.
    pub r#ref: String,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub event_at: Option<DateTime<Utc>>,
    pub title: String,
    pub message: Option<String>,

    // cross-references extracted from message text
    pub related_issue_ref: Option<String>,
    pub related_issue_url: Option<String>,
    pub related_pr_ref: Option<String>,
    pub related_pr_url: Option<String>,
    pub related_commit_sha: Option<String>,

    // classification (null until the classifier has run)
    pub classification: Option<Classification>,
    pub confidence: Option<f64>,
    pub is_bugfix: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A collected event before insertion: the pure output of the collector
/// engine, no identifiers or timestamps yet.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub r#ref: String,
    pub title: String,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub event_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub related_issue_ref: Option<String>,
    pub related_issue_url: Option<String>,
    pub related_pr_ref: Option<String>,
    pub related_pr_url: Option<String>,
    pub related_commit_sha: Option<String>,
}

impl NewEvent {
    #[must_use]
    pub fn new(event_type: EventType, r#ref: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            event_type,
            r#ref: r#ref.into(),
            title: title.into(),
            source_url: None,
            author: None,
            event_at: None,
            message: None,
            related_issue_ref: None,
            related_issue_url: None,
            related_pr_ref: None,
            related_pr_url: None,
            related_commit_sha: None,
        }
    }
}
