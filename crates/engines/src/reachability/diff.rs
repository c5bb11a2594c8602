//! Diff fallback: extract modified C/C++ function names from a commit
//! diff when the analyzer named no affected functions.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use github::GitHubClient;

const C_CPP_EXTENSIONS: &[&str] = &[".c", ".cc", ".cpp", ".cxx", ".h", ".hh", ".hpp", ".hxx"];

/// GitHub puts the enclosing declaration after the `@@` range, e.g.
/// `@@ -123,4 +123,5 @@ static int parse_url(...)`.
fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^@@.*@@[ \t]+(.+)$")
            .unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

fn func_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\w+)\s*\(").unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_]\w*$").unwrap_or_else(|_| unreachable!("static regex compiles"))
    })
}

fn is_c_cpp_file(filename: &str) -> bool {
    C_CPP_EXTENSIONS.iter().any(|ext| filename.ends_with(ext))
}

/// Extract function context labels from unified-diff `@@` hunk headers,
/// reduced to bare identifiers.
fn parse_functions_from_patch(patch: &str) -> Vec<String> {
    let mut funcs = Vec::new();
    for caps in hunk_header_re().captures_iter(patch) {
        let ctx = caps[1].trim();
        if ctx.is_empty() {
            continue;
        }
        // "static int parse_url(const char *url)" → "parse_url"
        if let Some(func) = func_name_re().captures(ctx) {
            funcs.push(func[1].to_string());
            continue;
        }
        // Bare word: use as-is when it looks like an identifier.
        if let Some(bare) = ctx.split_whitespace().last() {
            if identifier_re().is_match(bare) {
                funcs.push(bare.to_string());
            }
        }
    }
    funcs
}

/// Fetch a commit from GitHub and extract modified C/C++ function
/// names, deduplicated in first-seen order. Fetch failures degrade to
/// an empty list: the caller treats that the same as "no functions".
pub async fn extract_functions_from_diff(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    commit_sha: &str,
) -> Vec<String> {
    let data = match client
        .get(&format!("/repos/{owner}/{repo}/commits/{commit_sha}"), &[])
        .await
    {
        Ok(data) => data,
        Err(err) => {
            warn!(owner, repo, commit_sha, error = %err, "diff fetch failed");
            return Vec::new();
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();

    for file in data["files"].as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let filename = file["filename"].as_str().unwrap_or_default();
        if !is_c_cpp_file(filename) {
            continue;
        }
        let Some(patch) = file["patch"].as_str() else {
            continue;
        };

        for func in parse_functions_from_patch(patch) {
            if seen.insert(func.clone()) {
                result.push(func);
            }
        }
    }

    result
}
