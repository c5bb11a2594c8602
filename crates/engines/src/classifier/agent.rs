//! LLM classifier agent.

use agent::{AgentSpec, ToolRegistry};
use store::models::{Classification, Event};

use super::prompts::{format_event_message, CLASSIFIER_SYSTEM_PROMPT};
use crate::json_extract::extract_object;

/// Structured output of the classifier agent.
#[derive(Debug, Clone)]
pub struct ClassificationVerdict {
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
}

/// Map a raw model label onto the five database enum values. Unknown
/// labels fall back to `other`.
fn normalize_label(raw: &str) -> Classification {
    match raw.trim().to_lowercase().as_str() {
        "security_bugfix" | "security" => Classification::SecurityBugfix,
        "normal_bugfix" | "bugfix" | "bug_fix" | "bug" => Classification::NormalBugfix,
        "feature" => Classification::Feature,
        "refactor" | "refactoring" => Classification::Refactor,
        _ => Classification::Other,
    }
}

pub struct ClassifierAgent {
    model: String,
    tools: ToolRegistry,
    event_message: String,
}

impl ClassifierAgent {
    #[must_use]
    pub fn new(model: String, tools: ToolRegistry, event: &Event) -> Self {
        Self {
            model,
            tools,
            event_message: format_event_message(event),
        }
    }
}

impl AgentSpec for ClassifierAgent {
    type Output = ClassificationVerdict;

    fn agent_type(&self) -> &'static str {
        "event_classifier"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> String {
        CLASSIFIER_SYSTEM_PROMPT.to_string()
    }

    fn initial_message(&self) -> String {
        self.event_message.clone()
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn max_turns(&self) -> u32 {
        5
    }

    fn parse(&self, content: &str) -> Option<ClassificationVerdict> {
        let data = extract_object(content)?;

        let classification = normalize_label(data["label"].as_str().unwrap_or("other"));
        let confidence = data["confidence"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0);
        let reasoning = data["reasoning"].as_str().unwrap_or_default().to_string();

        Some(ClassificationVerdict {
            classification,
            confidence,
            reasoning,
        })
    }

    /// Stop as soon as the model has emitted a JSON classification.
    fn should_stop(&self, content: &str) -> bool {
        extract_object(content).is_some()
    }

    fn urgency_message(&self) -> Option<String> {
        Some(
            "You are running low on turns. Please output your final classification \
             JSON now, even if you haven't gathered all the evidence you wanted."
                .to_string(),
        )
    }
}
