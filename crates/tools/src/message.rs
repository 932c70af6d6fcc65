//! The `message` tool: deliver a message straight to a channel/chat.
//!
//! Used by subagents to talk to the user directly instead of waiting for
//! their final summary. Defaults to the invocation origin; both fields
//! can be overridden to target another chat.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::message::OutboundMessage;
use ferriclaw_core::tool::{Tool, ToolContext, ToolResult};

pub struct MessageTool {
    bus: Arc<MessageBus>,
}

impl MessageTool {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Tool for MessageTool {
    fn name(&self) -> &str {
        "message"
    }

    fn description(&self) -> &str {
        "Send a message directly to a channel chat. Defaults to the chat this request came from."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The message text to deliver"
                },
                "channel": {
                    "type": "string",
                    "description": "Target channel (default: the originating channel)"
                },
                "chat_id": {
                    "type": "string",
                    "description": "Target chat (default: the originating chat)"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let Some(content) = args["content"].as_str().filter(|c| !c.is_empty()) else {
            return ToolResult::error("content is required");
        };
        let channel = args["channel"]
            .as_str()
            .filter(|c| !c.is_empty())
            .unwrap_or(&ctx.channel);
        let chat_id = args["chat_id"]
            .as_str()
            .filter(|c| !c.is_empty())
            .unwrap_or(&ctx.chat_id);

        debug!(channel = %channel, chat_id = %chat_id, "Publishing direct message");
        self.bus.publish_outbound(OutboundMessage {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
        });

        // The content already reached the user; the confirmation is for
        // the model only.
        ToolResult::silent(format!("Message sent to {channel}:{chat_id}"))
    }
}
