//! Shell tool with a command allowlist.
//!
//! Only the first token of the command line is checked against the
//! allowlist; pipes and substitution are rejected outright since they
//! can smuggle arbitrary programs past the check.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use ferriclaw_core::tool::{Tool, ToolContext, ToolResult};

const MAX_OUTPUT_CHARS: usize = 10_000;

/// Shell metacharacters that defeat a first-token allowlist.
const FORBIDDEN_SEQUENCES: &[&str] = &["|", "&&", "||", ";", "$(", "`", ">", "<"];

pub struct ShellTool {
    allowed_commands: Vec<String>,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    /// Common read-only and developer commands.
    pub fn with_default_allowlist() -> Self {
        Self::new(
            [
                "ls", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep",
                "find", "which", "git", "cargo", "rustc", "python", "uname", "df", "du",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute an allowlisted shell command and return its output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command line to run"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let Some(command) = args["command"].as_str().filter(|c| !c.trim().is_empty()) else {
            return ToolResult::error("command is required");
        };

        for seq in FORBIDDEN_SEQUENCES {
            if command.contains(seq) {
                return ToolResult::error(format!("command contains forbidden sequence '{seq}'"));
            }
        }

        let first = command.split_whitespace().next().unwrap_or_default();
        if !self.allowed_commands.iter().any(|c| c == first) {
            return ToolResult::error(format!("command '{first}' is not in the allowlist"));
        }

        debug!(command = %command, "Running shell command");
        let output = match Command::new("sh").arg("-c").arg(command).output().await {
            Ok(output) => output,
            Err(e) => return ToolResult::error(format!("failed to run command: {e}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = String::new();
        combined.push_str(&stdout);
        if !stderr.trim().is_empty() {
            combined.push_str("\n[stderr]\n");
            combined.push_str(&stderr);
        }
        if combined.chars().count() > MAX_OUTPUT_CHARS {
            combined = combined.chars().take(MAX_OUTPUT_CHARS).collect();
            combined.push_str("\n... (output truncated)");
        }

        if output.status.success() {
            ToolResult::text(combined)
        } else {
            ToolResult {
                for_llm: format!(
                    "Command exited with {}\n{combined}",
                    output.status.code().unwrap_or(-1)
                ),
                for_user: combined,
                is_error: true,
                error: Some(format!("exit status {}", output.status.code().unwrap_or(-1))),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allowlisted_command_runs() {
        let tool = ShellTool::with_default_allowlist();
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"command": "echo hello shell"}),
            )
            .await;
        assert!(!result.is_error);
        assert!(result.for_llm.contains("hello shell"));
    }

    #[tokio::test]
    async fn unlisted_command_rejected() {
        let tool = ShellTool::new(vec!["echo".into()]);
        let result = tool
            .execute(&ToolContext::default(), serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(result.is_error);
        assert!(result.for_llm.contains("not in the allowlist"));
    }

    #[tokio::test]
    async fn pipes_rejected() {
        let tool = ShellTool::with_default_allowlist();
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"command": "echo hi | sh"}),
            )
            .await;
        assert!(result.is_error);
        assert!(result.for_llm.contains("forbidden sequence"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_with_output() {
        let tool = ShellTool::new(vec!["sh".into(), "grep".into()]);
        // grep with no match exits 1.
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"command": "grep needle /dev/null"}),
            )
            .await;
        assert!(result.is_error);
        assert!(result.for_llm.contains("exited with"));
    }
}
