//! The agent execution substrate: the reason-act tool loop, the session
//! owning agent loop that drains the message bus, workspace context
//! assembly, and the periodic heartbeat runner.

pub mod agent_loop;
pub mod context;
pub mod heartbeat;
pub mod skills;
pub mod tool_loop;

pub use agent_loop::{AgentLoop, AgentLoopConfig};
pub use context::ContextBuilder;
pub use heartbeat::{HeartbeatRunner, HEARTBEAT_OK};
pub use skills::{SkillCatalog, SkillInfo};
pub use tool_loop::{run_tool_loop, ToolLoopConfig, ToolLoopOutcome};
