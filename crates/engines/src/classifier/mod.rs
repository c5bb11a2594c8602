//! Event classifier. Two tiers: a rule-based pre-filter, then the LLM
//! agent for everything the rules cannot safely decide.

mod agent;
pub mod prefilter;
pub mod prompts;
pub mod runner;

pub use self::agent::{ClassificationVerdict, ClassifierAgent};
pub use prefilter::{pre_filter, PreFilterVerdict};
pub use runner::EventClassifierRunner;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use store::models::{Event, EventType};
    use uuid::Uuid;

    /// Build an in-memory event for pure-logic tests.
    pub fn event(
        event_type: EventType,
        title: &str,
        message: Option<&str>,
        author: Option<&str>,
    ) -> Event {
        Event {
            id: Uuid::new_v4(),
            library_id: Uuid::new_v4(),
            event_type,
            r#ref: "abc123".to_string(),
            source_url: None,
            author: author.map(String::from),
            event_at: None,
            title: title.to_string(),
            message: message.map(String::from),
            related_issue_ref: None,
            related_issue_url: None,
            related_pr_ref: None,
            related_pr_url: None,
            related_commit_sha: None,
            classification: None,
            confidence: None,
            is_bugfix: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
