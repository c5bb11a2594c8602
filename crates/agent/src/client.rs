//! OpenAI-compatible chat-completions client.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, AgentResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// One message in the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// Assistant message carrying the model's tool-call requests.
    #[must_use]
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// A tool result message answering one tool call.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool call requested by the model (OpenAI wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments string.
    pub arguments: String,
}

/// Normalized response from a single LLM call.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

impl LlmResponse {
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ── wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Async wrapper around an OpenAI-compatible `/chat/completions`
/// endpoint. The system prompt is always sent as the first message.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl LlmClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from `VULNSENTINEL_LLM_API_KEY` /
    /// `VULNSENTINEL_LLM_BASE_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: std::env::var("VULNSENTINEL_LLM_API_KEY").ok(),
            base_url: std::env::var("VULNSENTINEL_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Set a custom endpoint (proxies, self-hosted gateways, tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send one chat-completion request.
    pub async fn create(
        &self,
        model: &str,
        system: &str,
        messages: &[ChatMessage],
        tools: Option<&[Value]>,
        temperature: f32,
        max_tokens: u32,
    ) -> AgentResult<LlmResponse> {
        let api_key = self.api_key.as_ref().ok_or(AgentError::MissingApiKey)?;

        let mut full_messages = Vec::with_capacity(messages.len() + 1);
        full_messages.push(ChatMessage::system(system));
        full_messages.extend_from_slice(messages);

        let request = ChatRequest {
            model,
            messages: &full_messages,
            tools,
            temperature,
            max_tokens,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let usage = parsed.usage.unwrap_or_default();
        let choice = parsed.choices.into_iter().next();

        let (content, tool_calls, stop_reason) = match choice {
            Some(c) => (
                c.message.content.unwrap_or_default(),
                c.message.tool_calls,
                c.finish_reason.unwrap_or_default(),
            ),
            None => (String::new(), Vec::new(), String::new()),
        };

        Ok(LlmResponse {
            content,
            tool_calls,
            stop_reason,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_message_carries_call_id() {
        let msg = ChatMessage::tool("call_1", "output");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn plain_messages_skip_tool_fields() {
        let serialized = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(serialized["role"], "user");
        assert!(serialized.get("tool_calls").is_none());
        assert!(serialized.get("tool_call_id").is_none());
    }

    #[test]
    fn parses_tool_call_wire_format() {
        let raw = r#"{"id":"call_1","type":"function","function":{"name":"fetch_commit_diff","arguments":"{\"sha\":\"abc\"}"}}"#;
        let tc: ToolCall = serde_json::from_str(raw).unwrap();
        assert_eq!(tc.function.name, "fetch_commit_diff");
    }
}
