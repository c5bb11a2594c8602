//! Cross-reference extraction from commit and PR text.

use std::sync::OnceLock;

use regex::Regex;

use store::models::NewEvent;

/// "Fixes #123", "Closes #45", "Resolved #6"
fn issue_fix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:fix(?:es|ed)?|close[sd]?|resolve[sd]?)\s+#(\d+)\b")
            .unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

/// Inline "(#123)" in commit titles.
fn pr_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(#(\d+)\)").unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

/// Fill `related_issue_ref/url` and `related_pr_ref/url` in place.
///
/// Issue patterns are scanned across title and message; the inline PR
/// pattern is matched against the title only: body text frequently
/// contains `(#N)` referring to issues, not PRs.
pub fn parse_refs(event: &mut NewEvent, owner: &str, repo: &str) {
    let full_text = format!(
        "{}\n{}",
        event.title,
        event.message.as_deref().unwrap_or_default()
    );

    if event.related_issue_ref.is_none() {
        if let Some(caps) = issue_fix_re().captures(&full_text) {
            let num = &caps[1];
            event.related_issue_ref = Some(format!("#{num}"));
            event.related_issue_url =
                Some(format!("https://github.com/{owner}/{repo}/issues/{num}"));
        }
    }

    if event.related_pr_ref.is_none() {
        if let Some(caps) = pr_ref_re().captures(&event.title) {
            let num = &caps[1];
            event.related_pr_ref = Some(format!("#{num}"));
            event.related_pr_url = Some(format!("https://github.com/{owner}/{repo}/pull/{num}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::models::EventType;

    fn commit(title: &str, message: Option<&str>) -> NewEvent {
        let mut event = NewEvent::new(EventType::Commit, "abc", title);
        event.message = message.map(String::from);
        event
    }

    #[test]
    fn fixes_pattern_in_message_fills_issue_ref() {
        let mut event = commit("harden parser", Some("This fixes #123 for good."));
        parse_refs(&mut event, "curl", "curl");
        assert_eq!(event.related_issue_ref.as_deref(), Some("#123"));
        assert_eq!(
            event.related_issue_url.as_deref(),
            Some("https://github.com/curl/curl/issues/123")
        );
    }

    #[test]
    fn closes_and_resolves_also_match() {
        let mut a = commit("x", Some("Closes #7"));
        parse_refs(&mut a, "o", "r");
        assert_eq!(a.related_issue_ref.as_deref(), Some("#7"));

        let mut b = commit("x", Some("resolved #99 upstream"));
        parse_refs(&mut b, "o", "r");
        assert_eq!(b.related_issue_ref.as_deref(), Some("#99"));
    }

    #[test]
    fn inline_pr_ref_only_from_title() {
        let mut titled = commit("fix overflow (#55)", None);
        parse_refs(&mut titled, "o", "r");
        assert_eq!(titled.related_pr_ref.as_deref(), Some("#55"));
        assert_eq!(
            titled.related_pr_url.as_deref(),
            Some("https://github.com/o/r/pull/55")
        );

        // The same pattern in the body must not populate the PR ref.
        let mut bodied = commit("fix overflow", Some("see (#55)"));
        parse_refs(&mut bodied, "o", "r");
        assert!(bodied.related_pr_ref.is_none());
    }

    #[test]
    fn existing_refs_are_not_overwritten() {
        let mut event = commit("fix (#2)", Some("fixes #3"));
        event.related_issue_ref = Some("#1".to_string());
        parse_refs(&mut event, "o", "r");
        assert_eq!(event.related_issue_ref.as_deref(), Some("#1"));
        assert_eq!(event.related_pr_ref.as_deref(), Some("#2"));
    }

    #[test]
    fn plain_text_yields_nothing() {
        let mut event = commit("update docs", Some("routine wording pass"));
        parse_refs(&mut event, "o", "r");
        assert!(event.related_issue_ref.is_none());
        assert!(event.related_pr_ref.is_none());
    }
}
