//! HTML rendering for vulnerability notification emails.

use serde_json::Value;

use store::models::{ClientVuln, Library, Project, UpstreamVuln};

fn severity_color(severity: &str) -> &'static str {
    match severity {
        "critical" => "#d32f2f",
        "high" => "#f57c00",
        "medium" => "#fbc02d",
        "low" => "#388e3c",
        _ => "#757575",
    }
}

/// Minimal HTML escaping.
fn esc(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render `(subject, html_body)` for one verified client vuln.
#[must_use]
pub fn render_notification(
    project: &Project,
    library: &Library,
    upstream: &UpstreamVuln,
    client_vuln: &ClientVuln,
) -> (String, String) {
    let severity = upstream
        .severity
        .map(|s| s.as_str())
        .unwrap_or("unknown");
    let subject = format!(
        "[VulnSentinel] {} vulnerability in {} affects {}",
        severity.to_uppercase(),
        library.name,
        project.name
    );

    let color = severity_color(severity);
    let affected_funcs = format_affected_functions(&upstream.affected_functions);
    let call_chain = format_reachable_path(client_vuln.reachable_path.as_ref());

    let td_hdr = r#"style="padding: 6px 12px; font-weight: bold; border-bottom: 1px solid #e0e0e0;""#;
    let td_val = r#"style="padding: 6px 12px; border-bottom: 1px solid #e0e0e0;""#;
    let sev_span = format!(
        r#"<span style="color: {color}; font-weight: bold;">{}</span>"#,
        severity.to_uppercase()
    );
    let body_style = "font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, \
                      sans-serif; color: #212121; max-width: 640px; margin: 0 auto;";

    let html_body = format!(
        r#"<html>
<body style="{body_style}">
<h2 style="color: {color};">{sev_upper} Vulnerability Detected</h2>
<table style="border-collapse: collapse; width: 100%; margin-bottom: 16px;">
  <tr><td {td_hdr}>Project</td>
      <td {td_val}>{project}</td></tr>
  <tr><td {td_hdr}>Library</td>
      <td {td_val}>{library}</td></tr>
  <tr><td {td_hdr}>Vulnerability Type</td>
      <td {td_val}>{vuln_type}</td></tr>
  <tr><td {td_hdr}>Severity</td>
      <td {td_val}>{sev_span}</td></tr>
  <tr><td {td_hdr}>Commit SHA</td>
      <td {td_val}><code>{commit}</code></td></tr>
  <tr><td {td_hdr}>Fix Version</td>
      <td {td_val}>{fix_version}</td></tr>
</table>

<h3>Summary</h3>
<p>{summary}</p>

<h3>Affected Functions</h3>
{affected_funcs}

<h3>Reachable Path</h3>
{call_chain}

<hr style="border: none; border-top: 1px solid #e0e0e0; margin: 24px 0;">
<p style="color: #757575; font-size: 12px;">This is an automated notification from VulnSentinel.</p>
</body>
</html>"#,
        sev_upper = severity.to_uppercase(),
        project = esc(&project.name),
        library = esc(&library.name),
        vuln_type = esc(upstream.vuln_type.as_deref().unwrap_or("N/A")),
        commit = esc(&upstream.commit_sha),
        fix_version = esc(client_vuln.fix_version.as_deref().unwrap_or("N/A")),
        summary = esc(upstream.summary.as_deref().unwrap_or("No summary available.")),
    );

    (subject, html_body)
}

fn format_affected_functions(funcs: &Option<Value>) -> String {
    let names: Vec<&str> = funcs
        .as_ref()
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if names.is_empty() {
        return "<p>No affected functions identified.</p>".to_string();
    }
    let items: String = names
        .iter()
        .map(|f| format!("<li><code>{}</code></li>", esc(f)))
        .collect();
    format!("<ul>{items}</ul>")
}

/// Tolerant reader over the reachable-path JSON: the producer shapes
/// drift.
fn format_reachable_path(path: Option<&Value>) -> String {
    let Some(path) = path else {
        return "<p>No reachable path data.</p>".to_string();
    };

    let mut parts = Vec::new();

    if path["found"].as_bool().unwrap_or(false) {
        parts.push(
            r#"<p style="color: #d32f2f; font-weight: bold;">Reachable: YES</p>"#.to_string(),
        );
    } else {
        parts.push(r#"<p style="color: #388e3c;">Reachable: NO</p>"#.to_string());
    }

    if let Some(strategy) = path["strategy"].as_str() {
        parts.push(format!("<p>Strategy: <code>{}</code></p>", esc(strategy)));
    }
    if let Some(depth) = path["depth"].as_u64() {
        parts.push(format!("<p>Call depth: {depth}</p>"));
    }
    if let Some(chain) = path["call_chain"].as_array() {
        if !chain.is_empty() {
            let items: String = chain
                .iter()
                .map(|step| format!("<li><code>{}</code></li>", esc(&step.to_string())))
                .collect();
            parts.push(format!("<p>Call chain:</p><ol>{items}</ol>"));
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use store::models::{PipelineStatus, Severity, VulnStatus};
    use uuid::Uuid;

    fn fixtures() -> (Project, Library, UpstreamVuln, ClientVuln) {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: "acme-gateway".into(),
            organization: Some("acme".into()),
            repo_url: "https://github.com/acme/gateway".into(),
            platform: "github".into(),
            default_branch: "main".into(),
            contact: None,
            current_version: Some("v2.0".into()),
            pinned_ref: None,
            auto_sync_deps: true,
            scan_status: None,
            scan_error: None,
            monitoring_since: now,
            last_scanned_at: None,
            created_at: now,
            updated_at: now,
        };
        let library = Library {
            id: Uuid::new_v4(),
            name: "curl".into(),
            repo_url: "https://github.com/curl/curl".into(),
            platform: "github".into(),
            ecosystem: "c_cpp".into(),
            default_branch: "master".into(),
            latest_tag_version: None,
            latest_commit_sha: None,
            monitoring_since: now,
            last_scanned_at: None,
            collect_status: "healthy".into(),
            collect_error: None,
            collect_detail: None,
            created_at: now,
            updated_at: now,
        };
        let upstream = UpstreamVuln {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            library_id: library.id,
            commit_sha: "abc123def456".into(),
            vuln_type: Some("buffer_overflow".into()),
            severity: Some(Severity::High),
            affected_versions: Some("< 8.12.0".into()),
            summary: Some("Heap overflow in parse_url() on long hostnames.".into()),
            reasoning: None,
            status: VulnStatus::Published,
            error_message: None,
            upstream_poc: None,
            affected_functions: Some(json!(["parse_url"])),
            detected_at: now,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        let client_vuln = ClientVuln {
            id: Uuid::new_v4(),
            upstream_vuln_id: upstream.id,
            project_id: project.id,
            pipeline_status: PipelineStatus::Verified,
            is_affected: Some(true),
            error_message: None,
            analysis_started_at: None,
            analysis_completed_at: Some(now),
            status: Some(store::models::ClientStatus::Recorded),
            recorded_at: Some(now),
            reported_at: None,
            not_affect_at: None,
            confirmed_at: None,
            confirmed_msg: None,
            fixed_at: None,
            fixed_msg: None,
            constraint_expr: Some(">= 8.0".into()),
            constraint_source: Some("conanfile.txt".into()),
            resolved_version: Some("8.5.0".into()),
            fix_version: Some("8.12.0".into()),
            verdict: None,
            reachable_path: Some(json!({
                "found": true,
                "strategy": "fuzzer_reaches",
                "depth": 3,
            })),
            poc_results: None,
            report: None,
            created_at: now,
            updated_at: now,
        };
        (project, library, upstream, client_vuln)
    }

    #[test]
    fn subject_names_severity_library_and_project() {
        let (project, library, upstream, cv) = fixtures();
        let (subject, _) = render_notification(&project, &library, &upstream, &cv);
        assert_eq!(
            subject,
            "[VulnSentinel] HIGH vulnerability in curl affects acme-gateway"
        );
    }

    #[test]
    fn body_carries_key_facts() {
        let (project, library, upstream, cv) = fixtures();
        let (_, html) = render_notification(&project, &library, &upstream, &cv);
        assert!(html.contains("acme-gateway"));
        assert!(html.contains("curl"));
        assert!(html.contains("buffer_overflow"));
        assert!(html.contains("abc123def456"));
        assert!(html.contains("8.12.0"));
        assert!(html.contains("<code>parse_url</code>"));
        assert!(html.contains("Reachable: YES"));
        assert!(html.contains("fuzzer_reaches"));
        assert!(html.contains("Call depth: 3"));
    }

    #[test]
    fn escapes_html_in_summaries() {
        let (project, library, mut upstream, cv) = fixtures();
        upstream.summary = Some("overflow when n < 0 && buf > \"end\"".into());
        let (_, html) = render_notification(&project, &library, &upstream, &cv);
        assert!(html.contains("n &lt; 0 &amp;&amp; buf &gt; &quot;end&quot;"));
    }

    #[test]
    fn missing_path_data_renders_placeholder() {
        let (project, library, upstream, mut cv) = fixtures();
        cv.reachable_path = None;
        let (_, html) = render_notification(&project, &library, &upstream, &cv);
        assert!(html.contains("No reachable path data."));
    }
}
