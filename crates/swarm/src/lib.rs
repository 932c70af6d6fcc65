//! Swarm management: spawn, track, cancel, and introspect concurrent
//! background subagents, each running its own tool loop.

pub mod manager;
pub mod tools;

pub use manager::{SpawnCallback, SubagentTask, SwarmManager, TaskStatus};
pub use tools::{DelegateTaskTool, SpawnAgentTool, SwarmTool};
