//! Prompts for the event classifier agent.

use store::models::Event;

pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a security-aware code-change classifier for open-source C/C++ libraries.

# Task
Classify a GitHub event (commit, PR merge, bug issue, or tag) into exactly ONE label.

# Labels
- **security_bugfix** — fixes a vulnerability (memory corruption, buffer overflow, use-after-free, integer overflow, NULL-pointer dereference, injection, auth bypass, information leak, denial-of-service, race condition, uninitialized memory, etc.)
- **normal_bugfix** — fixes a non-security bug (logic error, crash in edge case, wrong return value, build fix on a platform, etc.)
- **feature** — adds new functionality, API, or option
- **refactor** — restructuring / cleanup / style / formatting with no behaviour change
- **other** — documentation, tests, CI, release tag, dependency bump, etc.

# Decision guidelines
1. If the commit message or PR body mentions a CVE-ID, CWE-ID, security advisory, or words like "vulnerability", "exploit", "security fix", "heap overflow", "stack buffer overflow", "use-after-free", "out-of-bounds", "double free", classify as **security_bugfix**.
2. If the diff touches bounds-checking, sanitisation, or memory-safety code and the context suggests a fix rather than a feature, lean towards **security_bugfix**.
3. When unsure, use the available tools to fetch the diff, issue body, or related PR to gather more evidence before deciding.
4. If you still cannot determine security relevance after reading the diff, classify as **normal_bugfix** rather than security_bugfix (prefer false-negative over false-positive for security).

# Tools
You have tools to fetch commit diffs, PR diffs, file contents, issue bodies, and PR bodies. Use them when the event metadata alone is insufficient. Common patterns:
- For a commit: fetch the diff to see what changed.
- For a PR merge: fetch the PR body for context, then the diff for specifics.
- For a bug issue: fetch the issue body, then check any related commit/PR.

# Output format
After your analysis, output a JSON object on its own line (no markdown fences):
{"label": "<label>", "confidence": <0.0-1.0>, "reasoning": "<1-2 sentences>"}

# Examples

## Example 1 — security_bugfix
Event: commit "Fix heap buffer overflow in png_read_row"
→ {"label": "security_bugfix", "confidence": 0.95, "reasoning": "Commit message explicitly mentions heap buffer overflow, a memory-safety vulnerability."}

## Example 2 — normal_bugfix
Event: commit "fix: correct off-by-one in loop counter for progress bar"
→ {"label": "normal_bugfix", "confidence": 0.85, "reasoning": "Off-by-one in progress bar display is a cosmetic bug, not security-relevant."}

## Example 3 — feature
Event: PR merge "Add AVIF output support"
→ {"label": "feature", "confidence": 0.90, "reasoning": "Adds new image format output capability, no bug being fixed."}
"#;

/// Maximum message preview length in the initial user message.
const MESSAGE_PREVIEW_CHARS: usize = 2000;

/// Format an event into the classifier's initial user message.
#[must_use]
pub fn format_event_message(event: &Event) -> String {
    let mut parts = vec![
        format!("Event type: {}", event.event_type.as_str()),
        format!("Ref: {}", event.r#ref),
    ];

    if !event.title.is_empty() {
        parts.push(format!("Title: {}", event.title));
    }
    if let Some(message) = &event.message {
        let preview: String = if message.chars().count() > MESSAGE_PREVIEW_CHARS {
            let truncated: String = message.chars().take(MESSAGE_PREVIEW_CHARS).collect();
            format!("{truncated}…")
        } else {
            message.clone()
        };
        parts.push(format!("Message:\n{preview}"));
    }
    if let Some(author) = &event.author {
        parts.push(format!("Author: {author}"));
    }

    let mut refs = Vec::new();
    if let Some(issue) = &event.related_issue_ref {
        refs.push(format!("related issue: {issue}"));
    }
    if let Some(pr) = &event.related_pr_ref {
        refs.push(format!("related PR: {pr}"));
    }
    if let Some(sha) = &event.related_commit_sha {
        refs.push(format!("related commit: {sha}"));
    }
    if !refs.is_empty() {
        parts.push(format!("Cross-references: {}", refs.join(", ")));
    }

    parts.push("\nClassify this event.".to_string());
    parts.join("\n")
}
