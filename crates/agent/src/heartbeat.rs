//! Periodic heartbeat runner.
//!
//! Every tick reads the `HEARTBEAT.md` checklist from the workspace and
//! runs a history-less agent turn over it. If nothing needs attention the
//! agent answers with the literal token `HEARTBEAT_OK` and the user hears
//! nothing; any other response is delivered to the configured channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ferriclaw_core::agent::AgentHandle;
use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::message::OutboundMessage;

/// The sentinel response meaning "nothing to report".
pub const HEARTBEAT_OK: &str = "HEARTBEAT_OK";

/// The checklist file read on every tick.
pub const HEARTBEAT_FILE: &str = "HEARTBEAT.md";

/// Floor on the tick interval.
const MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct HeartbeatRunner {
    workspace: PathBuf,
    interval: Duration,
    enabled: bool,
    handle: Arc<dyn AgentHandle>,
    bus: Arc<MessageBus>,
    /// Where findings are delivered
    channel: String,
    chat_id: String,
}

impl HeartbeatRunner {
    pub fn new(
        workspace: impl Into<PathBuf>,
        interval_minutes: u64,
        enabled: bool,
        handle: Arc<dyn AgentHandle>,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            interval: Duration::from_secs(interval_minutes * 60).max(MIN_INTERVAL),
            enabled,
            handle,
            bus,
            channel: "cli".into(),
            chat_id: "direct".into(),
        }
    }

    /// Route findings to a specific channel/chat instead of the default.
    pub fn with_target(mut self, channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        self.channel = channel.into();
        self.chat_id = chat_id.into();
        self
    }

    /// Tick until cancelled. A no-op when disabled.
    pub async fn run(&self, cancel: CancellationToken) {
        if !self.enabled {
            debug!("Heartbeat disabled");
            return;
        }
        info!(interval_secs = self.interval.as_secs(), "Heartbeat runner started");

        let mut ticker = tokio::time::interval(self.interval);
        // The immediate first tick would fire on startup; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_once(&cancel).await,
            }
        }
        info!("Heartbeat runner stopped");
    }

    /// One heartbeat: read the checklist, run the agent, deliver findings.
    pub async fn run_once(&self, cancel: &CancellationToken) {
        let path = self.workspace.join(HEARTBEAT_FILE);
        let checklist = match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => content,
            _ => {
                debug!(path = %path.display(), "No heartbeat checklist, skipping tick");
                return;
            }
        };

        let prompt = format!(
            "Heartbeat check. Work through this checklist and report anything \
             that needs attention. If nothing does, respond with exactly \
             {HEARTBEAT_OK}.\n\n{checklist}"
        );

        match self
            .handle
            .process_heartbeat(cancel.child_token(), &prompt, &self.channel, &self.chat_id)
            .await
        {
            Ok(result) if result.silent => debug!("Heartbeat OK"),
            Ok(result) => {
                let content = if result.for_user.is_empty() {
                    result.for_llm
                } else {
                    result.for_user
                };
                self.bus.publish_outbound(OutboundMessage {
                    channel: self.channel.clone(),
                    chat_id: self.chat_id.clone(),
                    content,
                });
            }
            Err(e) => warn!(error = %e, "Heartbeat processing failed"),
        }
    }
}
