//! The reason-act tool loop.
//!
//! One loop run drives the provider through tool calls until it produces
//! a terminal text response, an error occurs, or the iteration cap is
//! reached. Tool calls within one provider turn execute sequentially in
//! the order the provider emitted them: later calls may depend on earlier
//! side effects.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ferriclaw_core::error::{AgentError, Error};
use ferriclaw_core::message::ChatMessage;
use ferriclaw_core::provider::{CompletionRequest, LlmOptions, LlmProvider, Usage};
use ferriclaw_core::tool::{ToolContext, ToolRegistry};

/// Everything a loop run needs besides the messages themselves.
#[derive(Clone)]
pub struct ToolLoopConfig {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
    pub registry: Arc<ToolRegistry>,
    pub max_iterations: u32,
    pub options: LlmOptions,
}

/// The terminal state of a loop run.
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    /// The last assistant text content (may be empty if the cap was hit
    /// before the model produced any)
    pub content: String,

    /// The full message list at termination, including assistant turns
    /// with their tool calls and one tool turn per call. The agent loop
    /// persists these into the session.
    pub messages: Vec<ChatMessage>,

    /// Cumulative token usage across all provider calls
    pub usage: Usage,

    /// Provider round trips performed
    pub iterations: u32,

    /// The loop stopped because `max_iterations` was reached. Callers
    /// MUST treat this as a valid response, not an error.
    pub cap_reached: bool,
}

/// Run the loop to completion.
///
/// Provider errors abort the run. Tool errors (including unknown tool
/// names) become tool turns so the model can recover. An `is_async` tool
/// result does not block the loop; the background work announces its own
/// completion over the bus.
pub async fn run_tool_loop(
    config: &ToolLoopConfig,
    mut messages: Vec<ChatMessage>,
    channel: &str,
    chat_id: &str,
    cancel: CancellationToken,
) -> Result<ToolLoopOutcome, Error> {
    let mut usage = Usage::default();
    let mut last_content = String::new();
    let mut iteration: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled.into());
        }
        if iteration >= config.max_iterations {
            warn!(
                iterations = iteration,
                "Max tool iterations reached, returning last assistant content"
            );
            return Ok(ToolLoopOutcome {
                content: last_content,
                messages,
                usage,
                iterations: iteration,
                cap_reached: true,
            });
        }
        iteration += 1;

        let request = CompletionRequest {
            model: config.model.clone(),
            messages: messages.clone(),
            tools: config.registry.definitions(),
            options: config.options.clone(),
        };

        debug!(iteration, messages = messages.len(), "Tool loop iteration");

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled.into()),
            result = config.provider.complete(request) => result.map_err(Error::Provider)?,
        };

        if let Some(u) = response.usage {
            usage.add(u);
        }

        if response.tool_calls.is_empty() {
            messages.push(ChatMessage::assistant(response.content.clone()));
            return Ok(ToolLoopOutcome {
                content: response.content,
                messages,
                usage,
                iterations: iteration,
                cap_reached: false,
            });
        }

        last_content = response.content.clone();
        let calls = response.tool_calls.clone();
        messages.push(ChatMessage::assistant_with_calls(response.content, calls.clone()));

        for call in &calls {
            let Some(tool) = config.registry.get(&call.name) else {
                warn!(tool = %call.name, "Provider requested unknown tool");
                messages.push(ChatMessage::tool_result(
                    &call.id,
                    format!("Error: unknown tool '{}'", call.name),
                ));
                continue;
            };

            let args: serde_json::Value =
                serde_json::from_str(&call.arguments).unwrap_or_else(|_| serde_json::json!({}));
            let ctx = ToolContext::new(channel, chat_id).with_cancel(cancel.clone());

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled.into()),
                result = tool.execute(&ctx, args) => result,
            };

            if result.is_error {
                warn!(tool = %call.name, error = ?result.error, "Tool execution failed");
            }
            if result.is_async {
                debug!(tool = %call.name, "Tool work continues in background");
            }
            messages.push(ChatMessage::tool_result(&call.id, result.for_llm));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferriclaw_core::error::ProviderError;
    use ferriclaw_core::provider::CompletionResponse;
    use ferriclaw_core::message::{Role, ToolCallRequest};
    use ferriclaw_core::tool::{Tool, ToolResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A provider that replays a scripted sequence of responses.
    struct ScriptedProvider {
        script: Mutex<Vec<CompletionResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<CompletionResponse>) -> Self {
            responses.reverse();
            Self {
                script: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn text(content: &str) -> CompletionResponse {
            CompletionResponse {
                content: content.into(),
                tool_calls: vec![],
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock".into(),
            }
        }

        fn tool_call(name: &str, args: &str) -> CompletionResponse {
            CompletionResponse {
                content: String::new(),
                tool_calls: vec![ToolCallRequest {
                    id: "call_1".into(),
                    name: name.into(),
                    arguments: args.into(),
                }],
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock".into(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen.lock().unwrap().push(request.messages);
            let mut script = self.script.lock().unwrap();
            script
                .pop()
                .ok_or_else(|| ProviderError::Network("script exhausted".into()))
        }
    }

    struct CountingTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counter"
        }
        fn description(&self) -> &str {
            "Counts invocations"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _ctx: &ToolContext, _args: serde_json::Value) -> ToolResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            ToolResult::text(format!("count={n}"))
        }
    }

    fn config(provider: Arc<dyn LlmProvider>, registry: ToolRegistry) -> ToolLoopConfig {
        ToolLoopConfig {
            provider,
            model: "mock".into(),
            registry: Arc::new(registry),
            max_iterations: 10,
            options: LlmOptions::default(),
        }
    }

    #[tokio::test]
    async fn plain_response_terminates_first_iteration() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("4")]));
        let cfg = config(provider, ToolRegistry::new());

        let outcome = run_tool_loop(
            &cfg,
            vec![ChatMessage::user("2+2")],
            "cli",
            "direct",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.content, "4");
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.cap_reached);
        assert_eq!(outcome.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("counter", "{}"),
            ScriptedProvider::text("Found: bar"),
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountingTool {
            calls: AtomicUsize::new(0),
        }));
        let cfg = config(provider.clone(), registry);

        let outcome = run_tool_loop(
            &cfg,
            vec![ChatMessage::user("search foo")],
            "cli",
            "direct",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.content, "Found: bar");
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.usage.total_tokens, 30);

        // The second provider call must have seen: user, assistant with
        // the tool call, and the tool turn mirroring for_llm.
        let seen = provider.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[1].tool_calls.len(), 1);
        assert_eq!(second[2].role, Role::Tool);
        assert_eq!(second[2].content, "count=1");
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("no_such_tool", "{}"),
            ScriptedProvider::text("recovered"),
        ]));
        let cfg = config(provider.clone(), ToolRegistry::new());

        let outcome = run_tool_loop(
            &cfg,
            vec![ChatMessage::user("go")],
            "cli",
            "direct",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.content, "recovered");
        let seen = provider.seen.lock().unwrap();
        let second = &seen[1];
        assert!(second[2].content.contains("unknown tool 'no_such_tool'"));
    }

    #[tokio::test]
    async fn iteration_cap_returns_last_content() {
        // The provider asks for the tool forever; the loop must stop at
        // the cap and hand back the last assistant text without erroring.
        let responses: Vec<CompletionResponse> = (0..5)
            .map(|_| {
                let mut r = ScriptedProvider::tool_call("counter", "{}");
                r.content = "working on it".into();
                r
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::new(responses));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountingTool {
            calls: AtomicUsize::new(0),
        }));
        let mut cfg = config(provider, registry);
        cfg.max_iterations = 3;

        let outcome = run_tool_loop(
            &cfg,
            vec![ChatMessage::user("loop")],
            "cli",
            "direct",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.cap_reached);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.content, "working on it");
    }

    #[tokio::test]
    async fn provider_error_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let cfg = config(provider, ToolRegistry::new());

        let err = run_tool_loop(
            &cfg,
            vec![ChatMessage::user("hi")],
            "cli",
            "direct",
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn cancellation_unwinds_cleanly() {
        struct HangingProvider;

        #[async_trait]
        impl LlmProvider for HangingProvider {
            fn name(&self) -> &str {
                "hanging"
            }
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Result<CompletionResponse, ProviderError> {
                // Simulates a provider call that never returns.
                std::future::pending().await
            }
        }

        let cfg = config(Arc::new(HangingProvider), ToolRegistry::new());
        let cancel = CancellationToken::new();
        let handle = {
            let cfg = cfg.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_tool_loop(&cfg, vec![ChatMessage::user("hi")], "cli", "direct", cancel).await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Agent(AgentError::Cancelled)));
    }

    #[tokio::test]
    async fn sequential_execution_within_one_turn() {
        // Two calls in one provider response execute in emitted order.
        let first = CompletionResponse {
            content: String::new(),
            tool_calls: vec![
                ToolCallRequest {
                    id: "call_a".into(),
                    name: "counter".into(),
                    arguments: "{}".into(),
                },
                ToolCallRequest {
                    id: "call_b".into(),
                    name: "counter".into(),
                    arguments: "{}".into(),
                },
            ],
            usage: None,
            model: "mock".into(),
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            first,
            ScriptedProvider::text("done"),
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountingTool {
            calls: AtomicUsize::new(0),
        }));
        let cfg = config(provider.clone(), registry);

        run_tool_loop(
            &cfg,
            vec![ChatMessage::user("go")],
            "cli",
            "direct",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let seen = provider.seen.lock().unwrap();
        let second = &seen[1];
        // user, assistant, tool(call_a), tool(call_b)
        assert_eq!(second.len(), 4);
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(second[2].content, "count=1");
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(second[3].content, "count=2");
    }
}
