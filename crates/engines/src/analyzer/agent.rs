//! LLM vulnerability analyzer agent.

use agent::{AgentSpec, Compression, ToolRegistry};
use serde_json::Value;
use store::models::{Event, Severity};

use super::prompts::{format_bugfix_message, ANALYZER_SYSTEM_PROMPT};
use crate::json_extract::extract_objects;

/// One vulnerability extracted from a bugfix event, normalized onto the
/// canonical type and severity values.
#[derive(Debug, Clone)]
pub struct VulnFinding {
    pub vuln_type: String,
    pub severity: Severity,
    pub affected_versions: String,
    pub summary: String,
    pub reasoning: String,
    pub affected_functions: Option<Value>,
    pub upstream_poc: Option<Value>,
}

/// Map a raw model vuln_type onto the 11 canonical values. Unknown
/// types fall back to `other`.
fn normalize_vuln_type(raw: &str) -> &'static str {
    match raw.trim().to_lowercase().as_str() {
        // canonical values
        "buffer_overflow" => "buffer_overflow",
        "use_after_free" | "use-after-free" => "use_after_free",
        "integer_overflow" => "integer_overflow",
        "null_deref" => "null_deref",
        "injection" => "injection",
        "auth_bypass" => "auth_bypass",
        "info_leak" => "info_leak",
        "dos" => "dos",
        "race_condition" => "race_condition",
        "memory_corruption" => "memory_corruption",
        // common aliases
        "heap_overflow" | "stack_overflow" | "buffer_overread" | "heap_buffer_overflow"
        | "stack_buffer_overflow" | "oob_read" | "oob_write" | "out_of_bounds" => {
            "buffer_overflow"
        }
        "double_free" | "uaf" => "use_after_free",
        "int_overflow" | "integer_underflow" => "integer_overflow",
        "null_pointer" | "null_dereference" | "nullptr" => "null_deref",
        "command_injection" | "sql_injection" | "header_injection" => "injection",
        "authentication_bypass" | "authorization_bypass" => "auth_bypass",
        "information_leak" | "information_disclosure" | "uninitialized_memory" => "info_leak",
        "denial_of_service" | "infinite_loop" => "dos",
        "toctou" | "data_race" => "race_condition",
        _ => "other",
    }
}

/// Map a raw model severity onto the 4 levels. Unknown severities fall
/// back to `medium`.
fn normalize_severity(raw: &str) -> Severity {
    match raw.trim().to_lowercase().as_str() {
        "critical" | "severe" => Severity::Critical,
        "high" | "important" => Severity::High,
        "low" | "minor" | "negligible" => Severity::Low,
        "medium" | "moderate" => Severity::Medium,
        _ => Severity::Medium,
    }
}

fn finding_from_value(data: &Value) -> VulnFinding {
    let affected_functions = match &data["affected_functions"] {
        Value::Array(items) if !items.is_empty() => Some(Value::Array(items.clone())),
        _ => None,
    };
    let upstream_poc = match &data["upstream_poc"] {
        Value::Object(obj) => Some(Value::Object(obj.clone())),
        _ => None,
    };

    VulnFinding {
        vuln_type: normalize_vuln_type(data["vuln_type"].as_str().unwrap_or("other")).to_string(),
        severity: normalize_severity(data["severity"].as_str().unwrap_or("medium")),
        affected_versions: data["affected_versions"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        summary: data["summary"].as_str().unwrap_or_default().to_string(),
        reasoning: data["reasoning"].as_str().unwrap_or_default().to_string(),
        affected_functions,
        upstream_poc,
    }
}

pub struct AnalyzerAgent {
    model: String,
    tools: ToolRegistry,
    event_message: String,
}

impl AnalyzerAgent {
    #[must_use]
    pub fn new(model: String, tools: ToolRegistry, event: &Event) -> Self {
        Self {
            model,
            tools,
            event_message: format_bugfix_message(event),
        }
    }
}

impl AgentSpec for AnalyzerAgent {
    type Output = Vec<VulnFinding>;

    fn agent_type(&self) -> &'static str {
        "vuln_analyzer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> String {
        ANALYZER_SYSTEM_PROMPT.to_string()
    }

    fn initial_message(&self) -> String {
        self.event_message.clone()
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Deeper budget than the classifier: the analyzer reads diffs.
    fn max_turns(&self) -> u32 {
        15
    }

    fn parse(&self, content: &str) -> Option<Vec<VulnFinding>> {
        let items = extract_objects(content)?;
        Some(items.iter().map(finding_from_value).collect())
    }

    fn should_stop(&self, content: &str) -> bool {
        extract_objects(content).is_some()
    }

    fn urgency_message(&self) -> Option<String> {
        Some(
            "You are running low on turns. Please output your final vulnerability \
             analysis JSON now, even if you haven't gathered all the evidence you wanted."
                .to_string(),
        )
    }

    fn compression(&self) -> Option<Compression> {
        Some(Compression {
            criteria: "Preserve: diff analysis findings, vulnerability discoveries, severity \
                       assessment reasoning, affected version information, PoC evidence. \
                       Discard: raw tool outputs already summarized, intermediate reasoning \
                       that led to dead ends."
                .to_string(),
            max_context_tokens: 90_000,
        })
    }
}
