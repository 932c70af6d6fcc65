//! Subagent lifecycle management.
//!
//! Every spawned task runs an independent tool loop on its own tokio
//! task, with its own cancellation token rooted at spawn time: returning
//! from the request that spawned it does not kill background work.
//! `kill` is the only way to cancel a running subagent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ferriclaw_agent::tool_loop::{run_tool_loop, ToolLoopConfig};
use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::error::{Error, SwarmError};
use ferriclaw_core::message::{ChatMessage, InboundMessage};
use ferriclaw_core::provider::{LlmOptions, LlmProvider};
use ferriclaw_core::tool::{ToolRegistry, ToolResult};

const SUBAGENT_SYSTEM_PROMPT: &str = "You are an autonomous subagent of the ferriclaw swarm.\n\
Your goal is to complete the assigned task independently.\n\
You have access to a set of tools - use them as needed.\n\
When finished, provide a clear summary of your work.";

/// Terminal states are sticky; `running -> cancelled` may happen at any
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        self != TaskStatus::Running
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One background subagent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTask {
    /// Monotone id: `agent-1`, `agent-2`, ...
    pub id: String,

    /// The user instruction
    pub task: String,

    #[serde(default)]
    pub label: String,

    pub origin_channel: String,
    pub origin_chat_id: String,

    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,

    /// Unix millis
    pub created: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<i64>,

    #[serde(skip)]
    cancel: CancellationToken,
}

/// Invoked exactly once when a spawned task finishes (success or error).
pub type SpawnCallback = Box<dyn FnOnce(ToolResult) + Send + 'static>;

struct TaskTable {
    tasks: HashMap<String, SubagentTask>,
    next_id: u64,
}

/// Coordinates swarm agents.
pub struct SwarmManager {
    table: Mutex<TaskTable>,
    provider: Arc<dyn LlmProvider>,
    model: String,
    options: LlmOptions,
    registry: RwLock<Option<Arc<ToolRegistry>>>,
    bus: Arc<MessageBus>,
    max_iterations: u32,
}

impl SwarmManager {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        bus: Arc<MessageBus>,
        max_iterations: u32,
    ) -> Self {
        Self {
            table: Mutex::new(TaskTable {
                tasks: HashMap::new(),
                next_id: 1,
            }),
            provider,
            model: model.into(),
            options: LlmOptions::default(),
            registry: RwLock::new(None),
            bus,
            max_iterations,
        }
    }

    /// Install the tool registry subagents run with. Set after
    /// construction because the registry's swarm tools hold the manager.
    pub fn set_registry(&self, registry: Arc<ToolRegistry>) {
        *self.registry.write().expect("registry lock poisoned") = Some(registry);
    }

    /// Start a new subagent. Returns the task id and a human-readable
    /// ack immediately; execution is scheduled concurrently with an
    /// independent cancellation token.
    pub fn spawn(
        self: &Arc<Self>,
        task: impl Into<String>,
        label: impl Into<String>,
        origin_channel: impl Into<String>,
        origin_chat_id: impl Into<String>,
        callback: Option<SpawnCallback>,
    ) -> (String, String) {
        let task = task.into();
        let label = label.into();

        let (id, cancel) = {
            let mut table = self.table.lock().expect("task table lock poisoned");
            let id = format!("agent-{}", table.next_id);
            table.next_id += 1;

            let cancel = CancellationToken::new();
            table.tasks.insert(
                id.clone(),
                SubagentTask {
                    id: id.clone(),
                    task: task.clone(),
                    label: label.clone(),
                    origin_channel: origin_channel.into(),
                    origin_chat_id: origin_chat_id.into(),
                    status: TaskStatus::Running,
                    result: String::new(),
                    tokens_used: None,
                    created: chrono::Utc::now().timestamp_millis(),
                    finished: None,
                    cancel: cancel.clone(),
                },
            );
            (id, cancel)
        };

        info!(id = %id, label = %label, "Spawning subagent");

        let manager = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            // The executor runs on its own task so a panic inside it is
            // contained at the join handle and recorded as a failure.
            let executor = {
                let manager = manager.clone();
                let task_id = task_id.clone();
                tokio::spawn(async move { manager.run_task(&task_id, cancel).await })
            };

            let outcome = match executor.await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(id = %task_id, error = %join_err, "Subagent executor panicked");
                    manager.finish_task(&task_id, Err(format!("executor panicked: {join_err}")));
                    manager.announce(&task_id);
                    Err(Error::Internal(join_err.to_string()))
                }
            };

            if let Some(callback) = callback {
                let result = match outcome {
                    Ok(content) => ToolResult {
                        for_llm: format!("Agent completed: {content}"),
                        for_user: content,
                        ..Default::default()
                    },
                    Err(e) => ToolResult::error(format!("Agent failed: {e}")),
                };
                callback(result);
            }
        });

        let ack = if label.is_empty() {
            format!("Spawned agent (ID: {id}) for task: {task}")
        } else {
            format!("Spawned agent '{label}' (ID: {id}) for task: {task}")
        };
        (id, ack)
    }

    /// Execute one subagent task to completion: minimal system prompt,
    /// shared registry, fixed iteration cap. Updates the terminal state
    /// and announces the outcome on the bus.
    async fn run_task(&self, id: &str, cancel: CancellationToken) -> Result<String, Error> {
        let (task_text, origin_channel, origin_chat_id) = {
            let table = self.table.lock().expect("task table lock poisoned");
            let Some(task) = table.tasks.get(id) else {
                return Err(SwarmError::NotFound(id.to_string()).into());
            };
            (
                task.task.clone(),
                task.origin_channel.clone(),
                task.origin_chat_id.clone(),
            )
        };

        let registry = self
            .registry
            .read()
            .expect("registry lock poisoned")
            .clone()
            .unwrap_or_else(|| Arc::new(ToolRegistry::new()));

        let config = ToolLoopConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            registry,
            max_iterations: self.max_iterations,
            options: self.options.clone(),
        };

        let messages = vec![
            ChatMessage::system(SUBAGENT_SYSTEM_PROMPT),
            ChatMessage::user(&task_text),
        ];

        let outcome =
            run_tool_loop(&config, messages, &origin_channel, &origin_chat_id, cancel).await;

        let result = match outcome {
            Ok(outcome) => {
                self.finish_task(id, Ok((outcome.content.clone(), outcome.usage.total_tokens)));
                Ok(outcome.content)
            }
            Err(e) => {
                self.finish_task(id, Err(e.to_string()));
                Err(e)
            }
        };

        self.announce(id);
        result
    }

    /// Settle a task's terminal state. Terminal states already set (a
    /// concurrent `kill`) are never overwritten; only the result text
    /// and finish time are filled in.
    fn finish_task(&self, id: &str, outcome: Result<(String, u32), String>) {
        let mut table = self.table.lock().expect("task table lock poisoned");
        let Some(task) = table.tasks.get_mut(id) else {
            return;
        };

        task.finished = Some(chrono::Utc::now().timestamp_millis());
        match outcome {
            Ok((content, tokens)) => {
                if task.status == TaskStatus::Running {
                    task.status = TaskStatus::Completed;
                }
                task.result = if task.status == TaskStatus::Cancelled {
                    "Task cancelled".into()
                } else {
                    content
                };
                task.tokens_used = Some(tokens);
            }
            Err(message) => {
                if task.status == TaskStatus::Running {
                    task.status = if task.cancel.is_cancelled() {
                        TaskStatus::Cancelled
                    } else {
                        TaskStatus::Failed
                    };
                }
                task.result = if task.status == TaskStatus::Cancelled {
                    "Task cancelled".into()
                } else {
                    format!("Error: {message}")
                };
            }
        }
        debug!(id = %id, status = %task.status, "Subagent finished");
    }

    /// Publish the task outcome on the `system` channel. The agent loop
    /// routes it back to the origin chat.
    fn announce(&self, id: &str) {
        let Some(task) = self.get(id) else { return };
        let content = format!(
            "Swarm agent '{}' ({}) finished.\nTask: {}\n\nResult:\n{}",
            task.label, task.id, task.task, task.result
        );
        self.bus.publish_inbound(InboundMessage {
            channel: "system".into(),
            sender_id: format!("swarm:{}", task.id),
            chat_id: format!("{}:{}", task.origin_channel, task.origin_chat_id),
            content,
            session_key: None,
        });
    }

    pub fn get(&self, id: &str) -> Option<SubagentTask> {
        self.table
            .lock()
            .expect("task table lock poisoned")
            .tasks
            .get(id)
            .cloned()
    }

    /// All tasks, newest first.
    pub fn list(&self) -> Vec<SubagentTask> {
        let table = self.table.lock().expect("task table lock poisoned");
        let mut tasks: Vec<SubagentTask> = table.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        tasks
    }

    /// Number of currently running tasks.
    pub fn active_count(&self) -> usize {
        self.table
            .lock()
            .expect("task table lock poisoned")
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    /// Cancel a running task. Killing a task in a terminal state is an
    /// error; terminal states are never overwritten.
    pub fn kill(&self, id: &str) -> Result<(), SwarmError> {
        let mut table = self.table.lock().expect("task table lock poisoned");
        let Some(task) = table.tasks.get_mut(id) else {
            return Err(SwarmError::NotFound(id.to_string()));
        };
        if task.status != TaskStatus::Running {
            return Err(SwarmError::NotRunning {
                id: id.to_string(),
                status: task.status.to_string(),
            });
        }
        task.cancel.cancel();
        task.status = TaskStatus::Cancelled;
        info!(id = %id, "Subagent killed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferriclaw_core::error::ProviderError;
    use ferriclaw_core::provider::{CompletionRequest, CompletionResponse, Usage};
    use std::time::Duration;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: self.0.into(),
                tool_calls: vec![],
                usage: Some(Usage {
                    prompt_tokens: 50,
                    completion_tokens: 50,
                    total_tokens: 100,
                }),
                model: "fixed".into(),
            })
        }
    }

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
            std::future::pending().await
        }
    }

    fn manager_with(provider: Arc<dyn LlmProvider>) -> (Arc<SwarmManager>, Arc<MessageBus>) {
        let bus = Arc::new(MessageBus::new());
        let manager = Arc::new(SwarmManager::new(provider, "test-model", bus.clone(), 10));
        manager.set_registry(Arc::new(ToolRegistry::new()));
        (manager, bus)
    }

    async fn wait_for_terminal(manager: &SwarmManager, id: &str) -> SubagentTask {
        for _ in 0..100 {
            let task = manager.get(id).unwrap();
            if task.status.is_terminal() && task.finished.is_some() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn spawn_completes_and_announces() {
        let (manager, bus) = manager_with(Arc::new(FixedProvider("Task complete.")));

        let (id, ack) = manager.spawn("Test task", "test-agent", "cli", "direct", None);
        assert_eq!(id, "agent-1");
        assert!(ack.contains("Spawned agent 'test-agent'"));
        assert!(ack.contains("agent-1"));

        let task = wait_for_terminal(&manager, &id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, "Task complete.");
        assert_eq!(task.tokens_used, Some(100));
        assert!(task.finished.unwrap() >= task.created);

        // Announcement on the system channel with the swarm sender.
        let announcement = bus.drain().await.unwrap();
        assert_eq!(announcement.channel, "system");
        assert_eq!(announcement.sender_id, "swarm:agent-1");
        assert_eq!(announcement.chat_id, "cli:direct");
        assert!(announcement.content.contains("Task complete."));
    }

    #[tokio::test]
    async fn ids_are_monotone_across_spawns() {
        let (manager, _bus) = manager_with(Arc::new(FixedProvider("done")));

        let (id1, _) = manager.spawn("a", "", "cli", "direct", None);
        let (id2, _) = manager.spawn("b", "", "cli", "direct", None);
        let (id3, _) = manager.spawn("c", "", "cli", "direct", None);
        assert_eq!((id1.as_str(), id2.as_str(), id3.as_str()), ("agent-1", "agent-2", "agent-3"));
    }

    #[tokio::test]
    async fn kill_cancels_running_task() {
        let (manager, bus) = manager_with(Arc::new(HangingProvider));

        let (id, _) = manager.spawn("sleep forever", "x", "cli", "direct", None);
        // Let the executor reach the provider call.
        tokio::time::sleep(Duration::from_millis(20)).await;

        manager.kill(&id).unwrap();

        let task = wait_for_terminal(&manager, &id).await;
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.result, "Task cancelled");

        let announcement = bus.drain().await.unwrap();
        assert_eq!(announcement.sender_id, format!("swarm:{id}"));
    }

    #[tokio::test]
    async fn kill_unknown_task_errors() {
        let (manager, _bus) = manager_with(Arc::new(FixedProvider("done")));
        assert!(matches!(
            manager.kill("agent-99"),
            Err(SwarmError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn kill_terminal_task_errors_and_preserves_status() {
        let (manager, _bus) = manager_with(Arc::new(FixedProvider("done")));
        let (id, _) = manager.spawn("quick", "", "cli", "direct", None);
        wait_for_terminal(&manager, &id).await;

        let err = manager.kill(&id).unwrap_err();
        assert!(matches!(err, SwarmError::NotRunning { .. }));
        assert_eq!(manager.get(&id).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn callback_invoked_exactly_once() {
        let (manager, _bus) = manager_with(Arc::new(FixedProvider("summary")));

        let (tx, rx) = tokio::sync::oneshot::channel();
        let callback: SpawnCallback = Box::new(move |result| {
            // A second invocation would panic on the consumed sender.
            tx.send(result).ok();
        });
        manager.spawn("task", "", "cli", "direct", Some(callback));

        let result = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(!result.is_error);
        assert!(result.for_llm.contains("Agent completed: summary"));
        assert_eq!(result.for_user, "summary");
    }

    #[tokio::test]
    async fn provider_failure_marks_failed() {
        struct FailingProvider;

        #[async_trait]
        impl LlmProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Result<CompletionResponse, ProviderError> {
                Err(ProviderError::Network("connection refused".into()))
            }
        }

        let (manager, _bus) = manager_with(Arc::new(FailingProvider));
        let (id, _) = manager.spawn("doomed", "", "cli", "direct", None);

        let task = wait_for_terminal(&manager, &id).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.contains("connection refused"));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (manager, _bus) = manager_with(Arc::new(FixedProvider("done")));
        manager.spawn("a", "", "cli", "direct", None);
        manager.spawn("b", "", "cli", "direct", None);

        let tasks = manager.list();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "agent-2");
        assert_eq!(tasks[1].id, "agent-1");
    }
}
