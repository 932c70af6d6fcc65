//! The agent loop: owns sessions, drains the bus, routes messages
//! through the tool loop, and publishes outbound results.
//!
//! Collaborators hold the loop as `Arc<dyn AgentHandle>` (the narrow
//! interface from core), never the concrete type - tools that re-enter
//! the agent would otherwise create a cyclic ownership graph.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ferriclaw_core::agent::AgentHandle;
use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::error::Result;
use ferriclaw_core::message::{ChatMessage, InboundMessage, OutboundMessage, Role};
use ferriclaw_core::provider::{LlmOptions, LlmProvider};
use ferriclaw_core::session::SessionStore;
use ferriclaw_core::tool::{ToolRegistry, ToolResult};

use crate::context::ContextBuilder;
use crate::heartbeat::HEARTBEAT_OK;
use crate::skills::SkillCatalog;
use crate::tool_loop::{run_tool_loop, ToolLoopConfig};

/// Tunables for the loop.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub model: String,
    pub max_iterations: u32,
    pub session_cap: usize,
    pub options: LlmOptions,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4".into(),
            max_iterations: 25,
            session_cap: ferriclaw_core::session::DEFAULT_SESSION_CAP,
            options: LlmOptions::default(),
        }
    }
}

pub struct AgentLoop {
    config: AgentLoopConfig,
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    bus: Arc<MessageBus>,
    context: ContextBuilder,
    skills: SkillCatalog,
    sessions: Mutex<SessionStore>,
}

impl AgentLoop {
    pub fn new(
        config: AgentLoopConfig,
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        bus: Arc<MessageBus>,
        workspace: impl Into<std::path::PathBuf>,
    ) -> Self {
        let workspace = workspace.into();
        let session_cap = config.session_cap;
        Self {
            config,
            provider,
            registry,
            bus,
            context: ContextBuilder::new(&workspace),
            skills: SkillCatalog::new(&workspace),
            sessions: Mutex::new(SessionStore::new(session_cap)),
        }
    }

    fn loop_config(&self, max_iterations: u32) -> ToolLoopConfig {
        ToolLoopConfig {
            provider: self.provider.clone(),
            model: self.config.model.clone(),
            registry: self.registry.clone(),
            max_iterations,
            options: self.config.options.clone(),
        }
    }

    /// Assemble the system prompt for this moment: identity and behavior
    /// blocks, the tool and skill inventory, memory notes.
    fn system_prompt(&self) -> String {
        self.context
            .build(&self.registry.definitions(), &self.skills.list())
    }

    /// Number of live sessions (for status reporting).
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn tools_loaded(&self) -> usize {
        self.registry.len()
    }

    /// Drain the bus until cancellation or shutdown. Each inbound runs
    /// through the tool loop; the response is published outbound on the
    /// same channel. Swarm announcements on the `system` channel are
    /// forwarded to their origin instead of re-entering the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Agent loop started");
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                msg = self.bus.drain() => match msg {
                    Some(m) => m,
                    None => break,
                },
            };
            self.dispatch(msg, &cancel).await;
        }
        info!("Agent loop stopped");
    }

    async fn dispatch(&self, msg: InboundMessage, cancel: &CancellationToken) {
        if msg.channel == "system" {
            // Subagent completion announcement; route back to the origin
            // encoded as "<channel>:<chat_id>".
            match msg.chat_id.split_once(':') {
                Some((channel, chat_id)) => self.bus.publish_outbound(OutboundMessage {
                    channel: channel.to_string(),
                    chat_id: chat_id.to_string(),
                    content: msg.content,
                }),
                None => warn!(chat_id = %msg.chat_id, "System message with unroutable chat id"),
            }
            return;
        }

        let session_key = msg.session_key();
        debug!(channel = %msg.channel, session = %session_key, "Dispatching inbound message");

        match self
            .process_direct_with_channel(
                cancel.child_token(),
                &msg.content,
                &session_key,
                &msg.channel,
                &msg.chat_id,
            )
            .await
        {
            Ok(response) if !response.trim().is_empty() => {
                self.bus.publish_outbound(OutboundMessage {
                    channel: msg.channel,
                    chat_id: msg.chat_id,
                    content: response,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, session = %session_key, "Failed to process inbound message");
            }
        }
    }
}

#[async_trait]
impl AgentHandle for AgentLoop {
    async fn process_direct(
        &self,
        cancel: CancellationToken,
        text: &str,
        session_key: &str,
    ) -> Result<String> {
        self.process_direct_with_channel(cancel, text, session_key, "cli", "direct")
            .await
    }

    async fn process_direct_with_channel(
        &self,
        cancel: CancellationToken,
        text: &str,
        session_key: &str,
        channel: &str,
        chat_id: &str,
    ) -> Result<String> {
        let system = self.system_prompt();

        // Short critical section: snapshot the transcript, then run the
        // loop without holding the session lock.
        let messages = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let session = sessions.get_or_create(session_key, channel, chat_id);
            if session.turns.first().map(|t| t.role) == Some(Role::System) {
                session.turns[0] = ChatMessage::system(system);
            } else {
                session.turns.insert(0, ChatMessage::system(system));
            }
            session.push(ChatMessage::user(text));
            session.turns.clone()
        };

        let outcome = run_tool_loop(
            &self.loop_config(self.config.max_iterations),
            messages,
            channel,
            chat_id,
            cancel,
        )
        .await?;

        {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let session = sessions.get_or_create(session_key, channel, chat_id);
            session.turns = outcome.messages;
            session.last_touched = chrono::Utc::now();
        }

        Ok(outcome.content)
    }

    async fn process_heartbeat(
        &self,
        cancel: CancellationToken,
        prompt: &str,
        channel: &str,
        chat_id: &str,
    ) -> Result<ToolResult> {
        // Context-free: no session history, each heartbeat stands alone.
        let messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(prompt),
        ];

        let outcome = run_tool_loop(
            &self.loop_config(self.config.max_iterations),
            messages,
            channel,
            chat_id,
            cancel,
        )
        .await?;

        let content = outcome.content.trim().to_string();
        if content == HEARTBEAT_OK {
            return Ok(ToolResult::silent("Heartbeat OK"));
        }
        Ok(ToolResult::text(content))
    }
}
