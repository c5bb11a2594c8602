//! Tool trait, registry, and output truncation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

/// Tool outputs are truncated at this many characters before re-entering
/// the conversation, with a trailing notice.
pub const MAX_TOOL_OUTPUT_CHARS: usize = 15_000;

/// A read-only function exposed to the model.
///
/// `invoke` returns `Ok(text)` or `Err(text)`; the error text still goes
/// back to the model, flagged as an error in the audit log.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON-schema object describing the arguments.
    fn parameters(&self) -> Value;
    async fn invoke(&self, args: &Value) -> Result<String, String>;
}

/// Named set of tools handed to the runner. The loop and the tool
/// surface are decoupled: agents assemble whatever registry they need.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.insert(tool.name(), tool);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// OpenAI-format tool schemas for the request body.
    #[must_use]
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect()
    }
}

/// Truncate a tool output, appending a notice with the original length.
#[must_use]
pub fn truncate_output(text: &str) -> String {
    if text.chars().count() <= MAX_TOOL_OUTPUT_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
    format!(
        "{truncated}\n\n[truncated — {} chars total]",
        text.chars().count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl AgentTool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "Echo the input back."
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn invoke(&self, args: &Value) -> Result<String, String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn registry_exports_openai_schemas() {
        let registry = ToolRegistry::new().register(Arc::new(Echo));
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["function"]["name"], "echo");
    }

    #[test]
    fn short_output_is_unchanged() {
        assert_eq!(truncate_output("short"), "short");
    }

    #[test]
    fn long_output_is_truncated_with_notice() {
        let long = "x".repeat(MAX_TOOL_OUTPUT_CHARS + 100);
        let out = truncate_output(&long);
        assert!(out.len() < long.len());
        assert!(out.contains("[truncated — "));
        assert!(out.contains(&format!("{} chars total", long.len())));
    }
}
