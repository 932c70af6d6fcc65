//! # Ferriclaw Core
//!
//! Domain types, traits, and error definitions for the ferriclaw agent
//! runtime. This crate has **zero framework dependencies** - it defines the
//! contracts that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here: the LLM provider, the tools, the agent
//! handle. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod bus;
pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentHandle;
pub use bus::MessageBus;
pub use error::{Error, Result};
pub use message::{ChatMessage, InboundMessage, OutboundMessage, Role, ToolCallRequest};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmOptions, LlmProvider, ToolDefinition, Usage,
};
pub use session::{Session, SessionStore};
pub use tool::{Tool, ToolContext, ToolRegistry, ToolResult};
