//! Provider trait - the abstraction over LLM backends.
//!
//! A provider knows how to send a message list plus tool definitions to a
//! language model and get a response back. The core never implements one;
//! it holds a `dyn LlmProvider` polymorphically. Implementations live at
//! the boundary (OpenAI-compatible HTTP, test mocks).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{ChatMessage, ToolCallRequest};

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Sampling options forwarded to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOptions {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4")
    pub model: String,

    /// The conversation so far
    pub messages: Vec<ChatMessage>,

    /// Available tools the model can call
    pub tools: Vec<ToolDefinition>,

    /// Sampling options
    pub options: LlmOptions,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another usage report into this one.
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text content
    pub content: String,

    /// Tool call intents, in the order the model emitted them
    pub tool_calls: Vec<ToolCallRequest>,

    /// Token usage, when the provider reports it
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// The core provider trait.
///
/// The tool loop calls `complete()` without knowing which backend is in
/// use - pure polymorphism.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError>;
}
