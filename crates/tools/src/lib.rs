//! Baseline tool implementations for ferriclaw.
//!
//! Tools give the agent the ability to act: query and grow the knowledge
//! store, message users directly, read and write files, and run guarded
//! shell commands. The swarm tools (`spawn_agent`, `delegate_task`,
//! `swarm`) live in the swarm crate; the application wiring registers
//! them alongside these.

pub mod file_read;
pub mod file_write;
pub mod knowledge;
pub mod message;
pub mod shell;

mod paths;

use std::path::PathBuf;
use std::sync::Arc;

use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::tool::ToolRegistry;
use ferriclaw_knowledge::Store;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use knowledge::KnowledgeTool;
pub use message::MessageTool;
pub use shell::ShellTool;

/// Create a registry with all baseline tools.
///
/// File access is confined to the workspace; the shell runs only
/// allowlisted commands.
pub fn baseline_registry(
    store: Arc<Store>,
    bus: Arc<MessageBus>,
    workspace: PathBuf,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(KnowledgeTool::new(store)));
    registry.register(Box::new(MessageTool::new(bus)));
    registry.register(Box::new(FileReadTool::new(Some(workspace.clone()))));
    registry.register(Box::new(FileWriteTool::new(Some(workspace))));
    registry.register(Box::new(ShellTool::with_default_allowlist()));
    registry
}
