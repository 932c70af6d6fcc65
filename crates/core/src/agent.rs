//! The narrow agent interface.
//!
//! The agent loop holds a tool registry whose tools may need to re-enter
//! the agent (heartbeat, delegation). Passing the full loop around would
//! create a cyclic ownership graph, so collaborators hold this trait
//! object instead.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tool::ToolResult;

/// What the rest of the system is allowed to ask of the agent.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Process a user message synchronously against a session.
    async fn process_direct(
        &self,
        cancel: CancellationToken,
        text: &str,
        session_key: &str,
    ) -> Result<String>;

    /// Same, but records the origin channel so tools like `message` and
    /// `spawn_agent` know where to reply.
    async fn process_direct_with_channel(
        &self,
        cancel: CancellationToken,
        text: &str,
        session_key: &str,
        channel: &str,
        chat_id: &str,
    ) -> Result<String>;

    /// Run a context-free tool loop (no session history). A response of
    /// the literal token `HEARTBEAT_OK` means "nothing to do" and maps to
    /// a silent result.
    async fn process_heartbeat(
        &self,
        cancel: CancellationToken,
        prompt: &str,
        channel: &str,
        chat_id: &str,
    ) -> Result<ToolResult>;
}
