//! Tool trait - the abstraction over agent capabilities.
//!
//! Tools are what let the agent act in the world: read files, run
//! commands, query the knowledge store, spawn subagents, message users.
//! Every tool returns a dual payload: `for_llm` is fed back into the model
//! as the tool turn, `for_user` is what a human should see. The two often
//! differ (raw search results vs a short summary), so the split is a core
//! concept rather than a rendering concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::provider::ToolDefinition;

/// The invocation context the tool loop hands to every tool call: where
/// the request originated and the ambient cancellation handle.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Originating channel ("cli", "api", "webhook", ...)
    pub channel: String,

    /// Originating chat identifier within the channel
    pub chat_id: String,

    /// Ambient cancellation; tools doing long work should honor it
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new("cli", "direct")
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    /// What the model sees as the tool turn
    pub for_llm: String,

    /// What the user sees (may be empty; falls back to `for_llm`)
    #[serde(default)]
    pub for_user: String,

    /// Whether the tool failed
    #[serde(default)]
    pub is_error: bool,

    /// Error detail when `is_error` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The work continues elsewhere; the loop must not block on it
    #[serde(default)]
    pub is_async: bool,

    /// Do not surface this result to the user
    #[serde(default)]
    pub silent: bool,
}

impl ToolResult {
    /// A successful result shown to both the model and the user.
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            for_llm: content.clone(),
            for_user: content,
            ..Default::default()
        }
    }

    /// A successful result with distinct model and user payloads.
    pub fn dual(for_llm: impl Into<String>, for_user: impl Into<String>) -> Self {
        Self {
            for_llm: for_llm.into(),
            for_user: for_user.into(),
            ..Default::default()
        }
    }

    /// An error result; the model sees the message and may recover.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            for_llm: format!("Error: {message}"),
            for_user: format!("Error: {message}"),
            is_error: true,
            error: Some(message),
            ..Default::default()
        }
    }

    /// A result that must not be surfaced to the user.
    pub fn silent(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            silent: true,
            ..Default::default()
        }
    }

    /// An acknowledgement for work that continues in the background.
    pub fn async_ack(ack: impl Into<String>) -> Self {
        let ack = ack.into();
        Self {
            for_llm: ack.clone(),
            for_user: ack,
            is_async: true,
            ..Default::default()
        }
    }
}

/// The core Tool trait.
///
/// Each tool implements this and is registered in the `ToolRegistry`, which
/// the tool loop consults both for definitions to send to the provider and
/// for dispatch when the provider requests a call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "knowledge", "spawn_agent").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// Tool failures are reported through the returned `ToolResult`
    /// (`is_error`), never by panicking: the loop feeds errors back to the
    /// model as tool turns so it can recover.
    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> ToolResult;

    /// Convert this tool into a definition for the provider.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Registration is idempotent under an identical name: last wins.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, for sending to the provider.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
