//! Tools that expose the swarm to the model: fire-and-forget spawning,
//! synchronous delegation, and swarm introspection.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ferriclaw_core::tool::{Tool, ToolContext, ToolResult};

use crate::manager::{SpawnCallback, SwarmManager};

/// `spawn_agent` - start a subagent in the background and return
/// immediately with an acknowledgement.
pub struct SpawnAgentTool {
    manager: Arc<SwarmManager>,
}

impl SpawnAgentTool {
    pub fn new(manager: Arc<SwarmManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for SpawnAgentTool {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn description(&self) -> &str {
        "Spawn an autonomous subagent to complete a task in the background. Returns immediately."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task instructions for the subagent"
                },
                "label": {
                    "type": "string",
                    "description": "Short label for identifying this agent"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let Some(task) = args["task"].as_str().filter(|t| !t.is_empty()) else {
            return ToolResult::error("task is required");
        };
        let label = args["label"].as_str().unwrap_or_default();

        let (_, ack) = self
            .manager
            .spawn(task, label, &ctx.channel, &ctx.chat_id, None);
        ToolResult::async_ack(ack)
    }
}

/// `delegate_task` - spawn a subagent and block until it finishes,
/// forwarding its result to the caller.
///
/// If the ambient context is cancelled while waiting, this returns an
/// error but the spawned subagent keeps running; `swarm kill` is the
/// only way to stop it.
pub struct DelegateTaskTool {
    manager: Arc<SwarmManager>,
}

impl DelegateTaskTool {
    pub fn new(manager: Arc<SwarmManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for DelegateTaskTool {
    fn name(&self) -> &str {
        "delegate_task"
    }

    fn description(&self) -> &str {
        "Delegate a task to a subagent and wait for the result. Useful for complex sub-tasks."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task instructions"
                },
                "label": {
                    "type": "string",
                    "description": "Optional label"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let Some(task) = args["task"].as_str().filter(|t| !t.is_empty()) else {
            return ToolResult::error("task is required");
        };
        let label = args["label"].as_str().unwrap_or_default();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let callback: SpawnCallback = Box::new(move |result| {
            // The receiver may be gone if the caller was cancelled.
            let _ = tx.send(result);
        });

        let (id, _) = self
            .manager
            .spawn(task, label, &ctx.channel, &ctx.chat_id, Some(callback));
        debug!(id = %id, "Delegated task, awaiting result");

        tokio::select! {
            result = rx => match result {
                Ok(result) => result,
                Err(_) => ToolResult::error("Delegated task dropped its result"),
            },
            _ = ctx.cancel.cancelled() => {
                ToolResult::error(format!(
                    "Delegated task cancelled while waiting; subagent {id} keeps running"
                ))
            }
        }
    }
}

/// `swarm` - list, inspect, or kill subagents.
pub struct SwarmTool {
    manager: Arc<SwarmManager>,
}

impl SwarmTool {
    pub fn new(manager: Arc<SwarmManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for SwarmTool {
    fn name(&self) -> &str {
        "swarm"
    }

    fn description(&self) -> &str {
        "Manage swarm agents: list active agents, check status, or kill an agent."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "status", "kill"],
                    "description": "Action to perform"
                },
                "agent_id": {
                    "type": "string",
                    "description": "Agent ID (for status/kill)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let action = args["action"].as_str().unwrap_or_default();
        let agent_id = args["agent_id"].as_str().unwrap_or_default();

        match action {
            "list" => {
                let agents = self.manager.list();
                if agents.is_empty() {
                    return ToolResult::text("No swarm agents.");
                }
                let mut out = String::from("Swarm agents:\n");
                for a in agents {
                    out.push_str(&format!(
                        "- [{}] {} (task: {}) - status: {}\n",
                        a.id, a.label, a.task, a.status
                    ));
                }
                ToolResult::text(out)
            }
            "status" => {
                if agent_id.is_empty() {
                    return ToolResult::error("agent_id is required for status");
                }
                match self.manager.get(agent_id) {
                    Some(a) => ToolResult::text(format!(
                        "Agent: {}\nID: {}\nStatus: {}\nCreated: {}\nTask: {}\nResult: {}",
                        a.label, a.id, a.status, a.created, a.task, a.result
                    )),
                    None => ToolResult::error(format!("agent '{agent_id}' not found")),
                }
            }
            "kill" => {
                if agent_id.is_empty() {
                    return ToolResult::error("agent_id is required for kill");
                }
                match self.manager.kill(agent_id) {
                    Ok(()) => ToolResult::text(format!("Agent {agent_id} killed.")),
                    Err(e) => ToolResult::error(format!("failed to kill agent: {e}")),
                }
            }
            other => ToolResult::error(format!("unknown action: {other}")),
        }
    }
}
