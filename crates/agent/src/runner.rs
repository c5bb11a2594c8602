//! The turn-bounded agent loop.

use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{ChatMessage, LlmClient};
use crate::context::{AgentContext, AgentOutcome, RunStatus, ToolCallRecord};
use crate::cost::context_window;
use crate::tools::{truncate_output, ToolRegistry};

/// Fraction of the model window that triggers context compression.
const COMPRESSION_THRESHOLD: f64 = 0.8;

/// Messages kept verbatim when compressing; everything earlier is folded
/// into a single summary.
const COMPRESSION_KEEP_RECENT: usize = 4;

/// Context-compression settings for agents with long tool transcripts.
#[derive(Debug, Clone)]
pub struct Compression {
    /// What the summary must preserve and what it may discard.
    pub criteria: String,
    /// Budget that overrides the model's own window when smaller.
    pub max_context_tokens: u32,
}

/// What a concrete agent provides to the runner.
///
/// All hooks are synchronous: the asynchronous work (LLM calls, tool
/// dispatch) belongs to the runner.
pub trait AgentSpec: Send + Sync {
    /// Parser output type.
    type Output: Send;

    fn agent_type(&self) -> &'static str;
    fn model(&self) -> &str;
    fn system_prompt(&self) -> String;
    /// Initial user message built from the input record.
    fn initial_message(&self) -> String;
    fn tools(&self) -> &ToolRegistry;
    /// Extract the structured result from the final assistant text.
    fn parse(&self, content: &str) -> Option<Self::Output>;

    fn temperature(&self) -> f32 {
        0.2
    }
    fn max_turns(&self) -> u32 {
        5
    }
    fn max_tokens(&self) -> u32 {
        4096
    }
    /// Early-stop predicate over assistant content.
    fn should_stop(&self, _content: &str) -> bool {
        false
    }
    /// Injected as a user turn when two turns remain.
    fn urgency_message(&self) -> Option<String> {
        None
    }
    fn compression(&self) -> Option<Compression> {
        None
    }
}

/// Executes [`AgentSpec`]s against an [`LlmClient`].
#[derive(Clone)]
pub struct AgentRunner {
    llm: LlmClient,
}

impl AgentRunner {
    #[must_use]
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Run the loop to completion.
    ///
    /// Never panics and never returns early on provider errors: a
    /// failure is reported through [`AgentOutcome::status`] so the
    /// caller can persist the audit record and decide what to rethrow.
    pub async fn run<S: AgentSpec>(&self, spec: &S) -> AgentOutcome<S::Output> {
        let mut ctx = AgentContext::new(spec.model());
        let system = spec.system_prompt();
        let schemas = spec.tools().schemas();
        let tool_schemas = if schemas.is_empty() {
            None
        } else {
            Some(schemas.as_slice())
        };

        let mut messages = vec![ChatMessage::user(spec.initial_message())];
        let mut final_content = String::new();
        let mut urgency_sent = false;
        let max_turns = spec.max_turns();

        loop {
            if ctx.turn() >= max_turns {
                // Turn budget exhausted: parse whatever content exists.
                let parsed = spec.parse(&final_content);
                let status = if parsed.is_some() {
                    RunStatus::Completed
                } else {
                    RunStatus::Timeout
                };
                warn!(
                    agent = spec.agent_type(),
                    run_id = %ctx.run_id,
                    turns = max_turns,
                    parseable = parsed.is_some(),
                    "agent ran out of turns"
                );
                ctx.finish(status, None);
                return ctx.into_outcome(final_content, parsed);
            }
            let turn = ctx.increment_turn();

            // Push the model toward an answer when the budget nears.
            if !urgency_sent && max_turns - turn == 1 {
                if let Some(urgency) = spec.urgency_message() {
                    messages.push(ChatMessage::user(urgency));
                    urgency_sent = true;
                }
            }

            let response = match self
                .llm
                .create(
                    spec.model(),
                    &system,
                    &messages,
                    tool_schemas,
                    spec.temperature(),
                    spec.max_tokens(),
                )
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    ctx.finish(RunStatus::Failed, Some(err.to_string()));
                    return ctx.into_outcome(final_content, None);
                }
            };
            ctx.add_usage(&response);
            debug!(
                agent = spec.agent_type(),
                run_id = %ctx.run_id,
                turn,
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                tool_calls = response.tool_calls.len(),
                latency_ms = response.latency_ms,
                "agent turn"
            );

            if response.has_tool_calls() {
                let content = if response.content.is_empty() {
                    None
                } else {
                    Some(response.content.clone())
                };
                messages.push(ChatMessage::assistant_with_tools(
                    content,
                    response.tool_calls.clone(),
                ));

                for (seq, call) in response.tool_calls.iter().enumerate() {
                    let args: Value =
                        serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));

                    let started = Instant::now();
                    let result = match spec.tools().get(&call.function.name) {
                        Some(tool) => tool.invoke(&args).await,
                        None => Err(format!("unknown tool: {}", call.function.name)),
                    };
                    let duration_ms = started.elapsed().as_millis() as u64;

                    let (text, is_error) = match result {
                        Ok(text) => (truncate_output(&text), false),
                        Err(text) => (truncate_output(&text), true),
                    };

                    ctx.record_tool_call(ToolCallRecord {
                        turn,
                        seq: seq as u32,
                        tool_name: call.function.name.clone(),
                        tool_input: args,
                        output_chars: text.chars().count(),
                        duration_ms,
                        is_error,
                    });
                    messages.push(ChatMessage::tool(call.id.clone(), text));
                }

                self.maybe_compress(spec, &mut messages, response.input_tokens)
                    .await;
                continue;
            }

            final_content = response.content.clone();
            messages.push(ChatMessage::assistant(response.content));

            if spec.should_stop(&final_content) || response.stop_reason == "stop" {
                let parsed = spec.parse(&final_content);
                ctx.finish(RunStatus::Completed, None);
                return ctx.into_outcome(final_content, parsed);
            }
        }
    }

    /// Fold earlier turns into one assistant summary when the prompt
    /// nears the context window. Failures are logged and skipped: a
    /// compression error must never kill the run.
    async fn maybe_compress<S: AgentSpec>(
        &self,
        spec: &S,
        messages: &mut Vec<ChatMessage>,
        prompt_tokens: u32,
    ) {
        let Some(compression) = spec.compression() else {
            return;
        };
        let window = context_window(spec.model()).min(compression.max_context_tokens);
        if f64::from(prompt_tokens) <= f64::from(window) * COMPRESSION_THRESHOLD {
            return;
        }
        if messages.len() <= COMPRESSION_KEEP_RECENT + 2 {
            return;
        }

        let split = messages.len() - COMPRESSION_KEEP_RECENT;
        let transcript = render_transcript(&messages[..split]);
        let prompt = format!(
            "Compress the following conversation history into a concise summary.\n\
             {}\n\n--- history ---\n{transcript}",
            compression.criteria
        );

        match self
            .llm
            .create(
                spec.model(),
                "You summarize agent conversation history without losing findings.",
                &[ChatMessage::user(prompt)],
                None,
                0.0,
                2048,
            )
            .await
        {
            Ok(summary) => {
                let kept = messages.split_off(split);
                messages.clear();
                messages.push(ChatMessage::assistant(format!(
                    "[Summary of earlier conversation]\n{}",
                    summary.content
                )));
                messages.extend(kept);
                debug!(agent = spec.agent_type(), "compressed agent context");
            }
            Err(err) => {
                warn!(agent = spec.agent_type(), error = %err, "context compression failed");
            }
        }
    }
}

fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let content = m.content.as_deref().unwrap_or("(tool calls)");
            format!("{}: {content}", m.role)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::AgentTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    struct CountingTool(Arc<AtomicUsize>);

    #[async_trait]
    impl AgentTool for CountingTool {
        fn name(&self) -> &'static str {
            "lookup"
        }
        fn description(&self) -> &'static str {
            "Look something up."
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn invoke(&self, _args: &Value) -> Result<String, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("tool says hello".to_string())
        }
    }

    struct TestAgent {
        tools: ToolRegistry,
    }

    impl AgentSpec for TestAgent {
        type Output = String;

        fn agent_type(&self) -> &'static str {
            "test"
        }
        fn model(&self) -> &str {
            "gpt-4o-mini"
        }
        fn system_prompt(&self) -> String {
            "You are a test agent.".to_string()
        }
        fn initial_message(&self) -> String {
            "Go.".to_string()
        }
        fn tools(&self) -> &ToolRegistry {
            &self.tools
        }
        fn parse(&self, content: &str) -> Option<String> {
            content.contains("ANSWER").then(|| content.to_string())
        }
        fn max_turns(&self) -> u32 {
            3
        }
    }

    fn completion(content: &str, stop: &str) -> Value {
        json!({
            "choices": [{
                "message": {"content": content},
                "finish_reason": stop
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })
    }

    fn tool_call_completion() -> Value {
        json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "lookup", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })
    }

    async fn runner_for(server: &MockServer) -> AgentRunner {
        AgentRunner::new(LlmClient::new("test-key").with_base_url(format!("{}/v1/chat", server.uri())))
    }

    #[tokio::test]
    async fn dispatches_tool_calls_then_completes() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));

        struct TwoTurns(AtomicUsize);
        impl Respond for TwoTurns {
            fn respond(&self, _request: &Request) -> ResponseTemplate {
                let n = self.0.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    ResponseTemplate::new(200).set_body_json(tool_call_completion())
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(completion("ANSWER: hello", "stop"))
                }
            }
        }

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(TwoTurns(AtomicUsize::new(0)))
            .expect(2)
            .mount(&server)
            .await;

        let agent = TestAgent {
            tools: ToolRegistry::new().register(Arc::new(CountingTool(calls.clone()))),
        };
        let outcome = runner_for(&server).await.run(&agent).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].tool_name, "lookup");
        assert!(outcome.parsed.unwrap().contains("hello"));
        assert_eq!(outcome.total_turns, 2);
        assert!(outcome.estimated_cost > 0.0);
    }

    #[tokio::test]
    async fn turn_exhaustion_without_answer_is_timeout() {
        let server = MockServer::start().await;

        // Model keeps asking for tools and never answers.
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_completion()))
            .expect(3)
            .mount(&server)
            .await;

        let agent = TestAgent {
            tools: ToolRegistry::new()
                .register(Arc::new(CountingTool(Arc::new(AtomicUsize::new(0))))),
        };
        let outcome = runner_for(&server).await.run(&agent).await;

        assert_eq!(outcome.status, RunStatus::Timeout);
        assert!(outcome.parsed.is_none());
        assert_eq!(outcome.total_turns, 3);
    }

    #[tokio::test]
    async fn provider_error_marks_run_failed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "boom"}})),
            )
            .mount(&server)
            .await;

        let agent = TestAgent {
            tools: ToolRegistry::new(),
        };
        let outcome = runner_for(&server).await.run(&agent).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_error_result() {
        let server = MockServer::start().await;

        struct TwoTurns(AtomicUsize);
        impl Respond for TwoTurns {
            fn respond(&self, _request: &Request) -> ResponseTemplate {
                let n = self.0.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    ResponseTemplate::new(200).set_body_json(json!({
                        "choices": [{
                            "message": {
                                "content": null,
                                "tool_calls": [{
                                    "id": "call_x",
                                    "type": "function",
                                    "function": {"name": "does_not_exist", "arguments": "{}"}
                                }]
                            },
                            "finish_reason": "tool_calls"
                        }],
                        "usage": {"prompt_tokens": 1, "completion_tokens": 1}
                    }))
                } else {
                    ResponseTemplate::new(200).set_body_json(completion("ANSWER", "stop"))
                }
            }
        }

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(TwoTurns(AtomicUsize::new(0)))
            .mount(&server)
            .await;

        let agent = TestAgent {
            tools: ToolRegistry::new(),
        };
        let outcome = runner_for(&server).await.run(&agent).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert!(outcome.tool_calls[0].is_error);
    }
}
