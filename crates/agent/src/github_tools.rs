//! Read-only GitHub tools exposed to the LLM.
//!
//! The client, owner, and repo are captured at construction: tool
//! parameters only expose the parts the model should control.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use github::GitHubClient;

use crate::tools::{truncate_output, AgentTool, ToolRegistry};

/// Page cap when listing PR files for a diff summary.
const PR_FILES_MAX_PAGES: usize = 3;

/// Assemble the full GitHub tool surface for one repository.
#[must_use]
pub fn github_tool_registry(client: Arc<GitHubClient>, owner: &str, repo: &str) -> ToolRegistry {
    let target = Arc::new(RepoTarget {
        client,
        owner: owner.to_string(),
        repo: repo.to_string(),
    });
    ToolRegistry::new()
        .register(Arc::new(FetchCommitDiff(target.clone())))
        .register(Arc::new(FetchPrDiff(target.clone())))
        .register(Arc::new(FetchFileContent(target.clone())))
        .register(Arc::new(FetchIssueBody(target.clone())))
        .register(Arc::new(FetchPrBody(target)))
}

struct RepoTarget {
    client: Arc<GitHubClient>,
    owner: String,
    repo: String,
}

impl RepoTarget {
    fn prefix(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

/// Concise diffstat from the GitHub `files` array.
fn diffstat(files: &[Value]) -> String {
    files
        .iter()
        .map(|f| {
            let name = f["filename"].as_str().unwrap_or("?");
            let adds = f["additions"].as_u64().unwrap_or(0);
            let dels = f["deletions"].as_u64().unwrap_or(0);
            let status = f["status"].as_str().unwrap_or("modified");
            format!("  {status:10} +{adds}/-{dels}  {name}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn patch_for(files: &[Value], file_path: &str) -> Option<String> {
    files
        .iter()
        .find(|f| f["filename"].as_str() == Some(file_path))
        .map(|f| {
            let patch = f["patch"].as_str().unwrap_or("(binary or too large)");
            format!("--- {file_path} ---\n{patch}")
        })
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn int_arg(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

struct FetchCommitDiff(Arc<RepoTarget>);

#[async_trait]
impl AgentTool for FetchCommitDiff {
    fn name(&self) -> &'static str {
        "fetch_commit_diff"
    }

    fn description(&self) -> &'static str {
        "Fetch a commit diff. Without file_path returns a diffstat summary; \
         with file_path returns the full patch for that file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sha": {"type": "string", "description": "Commit SHA"},
                "file_path": {"type": "string", "description": "Optional file to fetch the patch for"}
            },
            "required": ["sha"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String, String> {
        let sha = str_arg(args, "sha").ok_or("missing required argument: sha")?;
        let data = self
            .0
            .client
            .get(&format!("{}/commits/{sha}", self.0.prefix()), &[])
            .await
            .map_err(|e| e.to_string())?;

        let files = data["files"].as_array().cloned().unwrap_or_default();
        if files.is_empty() {
            return Ok("No files changed in this commit.".to_string());
        }

        let short = &sha[..sha.len().min(12)];
        match str_arg(args, "file_path") {
            None => {
                let header = format!("Commit {short} — {} file(s) changed\n", files.len());
                Ok(truncate_output(&(header + &diffstat(&files))))
            }
            Some(file_path) => patch_for(&files, file_path)
                .map(|p| truncate_output(&p))
                .ok_or_else(|| format!("File '{file_path}' not found in commit {short}.")),
        }
    }
}

struct FetchPrDiff(Arc<RepoTarget>);

#[async_trait]
impl AgentTool for FetchPrDiff {
    fn name(&self) -> &'static str {
        "fetch_pr_diff"
    }

    fn description(&self) -> &'static str {
        "Fetch a pull request diff. Without file_path returns a diffstat \
         summary; with file_path returns the full patch for that file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pr_number": {"type": "integer", "description": "Pull request number"},
                "file_path": {"type": "string", "description": "Optional file to fetch the patch for"}
            },
            "required": ["pr_number"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String, String> {
        let pr = int_arg(args, "pr_number").ok_or("missing required argument: pr_number")?;
        let files = self
            .0
            .client
            .paginate(
                &format!("{}/pulls/{pr}/files", self.0.prefix()),
                &[],
                PR_FILES_MAX_PAGES,
            )
            .collect_all()
            .await
            .map_err(|e| e.to_string())?;

        if files.is_empty() {
            return Ok("No files changed in this PR.".to_string());
        }

        match str_arg(args, "file_path") {
            None => {
                let header = format!("PR #{pr} — {} file(s) changed\n", files.len());
                Ok(truncate_output(&(header + &diffstat(&files))))
            }
            Some(file_path) => patch_for(&files, file_path)
                .map(|p| truncate_output(&p))
                .ok_or_else(|| format!("File '{file_path}' not found in PR #{pr}.")),
        }
    }
}

struct FetchFileContent(Arc<RepoTarget>);

#[async_trait]
impl AgentTool for FetchFileContent {
    fn name(&self) -> &'static str {
        "fetch_file_content"
    }

    fn description(&self) -> &'static str {
        "Fetch a file's content at a given ref (branch, tag, or SHA). Use \
         start_line/end_line for a 1-indexed range; with both 0 the full \
         file is returned (truncated if large)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path within the repository"},
                "ref": {"type": "string", "description": "Branch, tag, or SHA (default HEAD)"},
                "start_line": {"type": "integer"},
                "end_line": {"type": "integer"}
            },
            "required": ["path"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String, String> {
        let path = str_arg(args, "path").ok_or("missing required argument: path")?;
        let r#ref = str_arg(args, "ref").unwrap_or("HEAD").to_string();

        let data = self
            .0
            .client
            .get(
                &format!("{}/contents/{path}", self.0.prefix()),
                &[("ref", r#ref)],
            )
            .await
            .map_err(|e| e.to_string())?;

        let content = if data["encoding"].as_str() == Some("base64") {
            let raw: String = data["content"]
                .as_str()
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let bytes = STANDARD
                .decode(raw)
                .map_err(|e| format!("failed to decode file content: {e}"))?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            data["content"].as_str().unwrap_or("(unable to decode)").to_string()
        };

        let start = int_arg(args, "start_line").unwrap_or(0);
        let end = int_arg(args, "end_line").unwrap_or(0);
        if start > 0 || end > 0 {
            let lines: Vec<&str> = content.lines().collect();
            let s = (start.max(1) as usize) - 1;
            let e = if end > 0 { end as usize } else { lines.len() };
            let numbered: Vec<String> = lines
                .iter()
                .skip(s)
                .take(e.saturating_sub(s))
                .enumerate()
                .map(|(i, line)| format!("{:5} | {line}", s + i + 1))
                .collect();
            return Ok(truncate_output(&numbered.join("\n")));
        }

        Ok(truncate_output(&content))
    }
}

/// Shared rendering for issue and PR bodies.
fn render_body(data: &Value) -> String {
    let title = data["title"].as_str().unwrap_or_default();
    let body = data["body"].as_str().unwrap_or_default();
    let labels: Vec<&str> = data["labels"]
        .as_array()
        .map(|ls| ls.iter().filter_map(|l| l["name"].as_str()).collect())
        .unwrap_or_default();

    let mut parts = vec![format!("# {title}")];
    if !labels.is_empty() {
        parts.push(format!("Labels: {}", labels.join(", ")));
    }
    parts.push(body.to_string());
    truncate_output(&parts.join("\n\n"))
}

struct FetchIssueBody(Arc<RepoTarget>);

#[async_trait]
impl AgentTool for FetchIssueBody {
    fn name(&self) -> &'static str {
        "fetch_issue_body"
    }

    fn description(&self) -> &'static str {
        "Fetch an issue's title, body, and labels."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_number": {"type": "integer", "description": "Issue number"}
            },
            "required": ["issue_number"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String, String> {
        let n = int_arg(args, "issue_number").ok_or("missing required argument: issue_number")?;
        let data = self
            .0
            .client
            .get(&format!("{}/issues/{n}", self.0.prefix()), &[])
            .await
            .map_err(|e| e.to_string())?;
        Ok(render_body(&data))
    }
}

struct FetchPrBody(Arc<RepoTarget>);

#[async_trait]
impl AgentTool for FetchPrBody {
    fn name(&self) -> &'static str {
        "fetch_pr_body"
    }

    fn description(&self) -> &'static str {
        "Fetch a pull request's title, body, and labels."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pr_number": {"type": "integer", "description": "Pull request number"}
            },
            "required": ["pr_number"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String, String> {
        let n = int_arg(args, "pr_number").ok_or("missing required argument: pr_number")?;
        let data = self
            .0
            .client
            .get(&format!("{}/pulls/{n}", self.0.prefix()), &[])
            .await
            .map_err(|e| e.to_string())?;
        Ok(render_body(&data))
    }
}
