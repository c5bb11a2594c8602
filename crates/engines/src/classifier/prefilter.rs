//! Rule-based pre-filter: classify obvious events without LLM cost.

use std::sync::OnceLock;

use regex::Regex;

use store::models::{Classification, Event, EventType};

fn bot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(dependabot|renovate|greenkeeper|snyk-bot|github-actions|semantic-release-bot|mergify|codecov|depfu)\b",
        )
        .unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

/// Security-related keywords. Any hit forces the LLM path, even when a
/// conventional-commit prefix would otherwise classify the event.
fn security_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(CVE-\d{4}-\d+|CWE-\d+|vulnerab|exploit|security|buffer.?over(?:flow|read|write)|heap.?over(?:flow|read|write)|stack.?over(?:flow|read|write)|use.?after.?free|double.?free|out.?of.?bounds|oob|integer.?(?:over|under)flow|null.?(?:pointer|ptr|deref)|uninitiali[sz]ed|race.?condition|TOCTOU|injection|XSS|CSRF|SSRF|auth.?bypass|privilege.?escalat|info(?:rmation)?.?leak|denial.?of.?service|dos\b|memory.?corrupt|memory.?safety)",
        )
        .unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

fn conventional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\w+)(?:\([^)]*\))?!?:\s")
            .unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

/// Conventional-commit prefix → (classification, confidence).
fn prefix_verdict(prefix: &str) -> Option<(Classification, f64)> {
    match prefix {
        "fix" => Some((Classification::NormalBugfix, 0.70)),
        "feat" => Some((Classification::Feature, 0.80)),
        "refactor" => Some((Classification::Refactor, 0.80)),
        "docs" | "test" | "perf" | "ci" | "chore" | "build" => {
            Some((Classification::Other, 0.85))
        }
        _ => None,
    }
}

/// Result from the rule-based pre-filter.
#[derive(Debug, Clone)]
pub struct PreFilterVerdict {
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
}

fn has_security_signals(event: &Event) -> bool {
    let text = format!(
        "{} {}",
        event.title,
        event.message.as_deref().unwrap_or_default()
    );
    security_re().is_match(&text)
}

/// Attempt to classify `event` with cheap heuristics.
///
/// Returns `None` when the event must go to the LLM. This function
/// never returns `security_bugfix`: it is a fast path for
/// obviously-safe labels only, and any security signal forces the LLM
/// path to avoid false negatives that would skip deeper analysis.
pub fn pre_filter(event: &Event) -> Option<PreFilterVerdict> {
    // Rule 1: tags are always "other".
    if event.event_type == EventType::Tag {
        return Some(PreFilterVerdict {
            classification: Classification::Other,
            confidence: 0.95,
            reasoning: "tag release event".to_string(),
        });
    }

    // Rule 2: bot authors.
    if let Some(author) = &event.author {
        if bot_re().is_match(author) {
            return Some(PreFilterVerdict {
                classification: Classification::Other,
                confidence: 0.90,
                reasoning: format!("bot author: {author}"),
            });
        }
    }

    // Rule 3: security keywords always go to the LLM.
    if has_security_signals(event) {
        return None;
    }

    // Rule 4: conventional-commit prefix.
    if let Some(caps) = conventional_re().captures(event.title.trim()) {
        let prefix = caps[1].to_lowercase();
        if let Some((classification, confidence)) = prefix_verdict(&prefix) {
            return Some(PreFilterVerdict {
                classification,
                confidence,
                reasoning: format!("conventional commit prefix: {prefix}:"),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_support::event;

    #[test]
    fn tags_are_other() {
        let e = event(EventType::Tag, "v8.5.0", None, None);
        let verdict = pre_filter(&e).unwrap();
        assert_eq!(verdict.classification, Classification::Other);
        assert!((verdict.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn bot_commits_are_other() {
        let e = event(
            EventType::Commit,
            "bump openssl to 3.3.1",
            None,
            Some("dependabot[bot]"),
        );
        let verdict = pre_filter(&e).unwrap();
        assert_eq!(verdict.classification, Classification::Other);
        assert!((verdict.confidence - 0.90).abs() < f64::EPSILON);
    }

    #[test]
    fn conventional_prefixes_classify() {
        let fix = event(
            EventType::Commit,
            "fix: off-by-one in progress bar",
            None,
            None,
        );
        let verdict = pre_filter(&fix).unwrap();
        assert_eq!(verdict.classification, Classification::NormalBugfix);
        assert!((verdict.confidence - 0.70).abs() < f64::EPSILON);

        let feat = event(EventType::Commit, "feat(url): add IDN support", None, None);
        assert_eq!(
            pre_filter(&feat).unwrap().classification,
            Classification::Feature
        );

        let chore = event(EventType::Commit, "chore: tidy CI config", None, None);
        assert_eq!(
            pre_filter(&chore).unwrap().classification,
            Classification::Other
        );
    }

    #[test]
    fn security_keywords_force_llm_path() {
        // Even with a "fix:" prefix that would otherwise pre-classify.
        let e = event(
            EventType::Commit,
            "fix: correct bounds check in parse_url",
            Some("CVE-2024-9999"),
            None,
        );
        assert!(pre_filter(&e).is_none());

        let uaf = event(EventType::Commit, "avoid use-after-free in pool", None, None);
        assert!(pre_filter(&uaf).is_none());
    }

    #[test]
    fn unmatched_events_miss() {
        let e = event(EventType::Commit, "improve connection handling", None, None);
        assert!(pre_filter(&e).is_none());
    }

    #[test]
    fn never_emits_security_bugfix() {
        // Sweep a grab-bag of adversarial inputs: anything returned must
        // not be security_bugfix.
        let titles = [
            "fix: heap overflow in parser",
            "security: rotate keys",
            "fix!: hardening",
            "feat: sandbox escape detection",
            "refactor: rename exploit_check",
            "docs: document CVE process",
            "random words entirely",
        ];
        for title in titles {
            let e = event(EventType::Commit, title, None, None);
            if let Some(verdict) = pre_filter(&e) {
                assert_ne!(
                    verdict.classification,
                    Classification::SecurityBugfix,
                    "pre-filter returned security_bugfix for {title:?}"
                );
            }
        }
    }
}
