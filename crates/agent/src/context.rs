//! System prompt assembly.
//!
//! The prompt for each inbound message is built fresh from the workspace:
//! identity and behavior blocks (plain text files), a compact inventory of
//! skills and tools, then long-term memory notes and today's daily note.
//! Later sections override earlier ones on conflict, so the order is
//! fixed: identity, capabilities, memory. Missing files are silently
//! skipped.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;

use ferriclaw_core::provider::ToolDefinition;

use crate::skills::SkillInfo;

/// Well-known workspace files.
pub const IDENTITY_FILE: &str = "AGENTS.md";
pub const BEHAVIOR_FILE: &str = "SOUL.md";
pub const MEMORY_FILE: &str = "memory/MEMORY.md";

pub struct ContextBuilder {
    workspace: PathBuf,
}

impl ContextBuilder {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Assemble the full system prompt.
    pub fn build(&self, tools: &[ToolDefinition], skills: &[SkillInfo]) -> String {
        let mut prompt = String::with_capacity(4096);

        match read_trimmed(&self.workspace.join(IDENTITY_FILE)) {
            Some(identity) => prompt.push_str(&identity),
            None => prompt.push_str(
                "You are a capable autonomous assistant. Use your tools to \
                 accomplish what the user asks, and answer concisely.",
            ),
        }

        if let Some(behavior) = read_trimmed(&self.workspace.join(BEHAVIOR_FILE)) {
            prompt.push_str("\n\n## Behavior\n");
            prompt.push_str(&behavior);
        }

        prompt.push_str("\n\n## Capabilities\n");
        if !tools.is_empty() {
            prompt.push_str("Tools available to you:\n");
            for tool in tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name, first_line(&tool.description)));
            }
        }
        if !skills.is_empty() {
            prompt.push_str("Skills you can follow:\n");
            for skill in skills {
                prompt.push_str(&format!("- {}: {}\n", skill.name, skill.description));
            }
        }

        let mut memory_sections = Vec::new();
        if let Some(memory) = read_trimmed(&self.workspace.join(MEMORY_FILE)) {
            memory_sections.push(memory);
        }
        if let Some(daily) = read_trimmed(&self.daily_note_path()) {
            memory_sections.push(daily);
        }
        if !memory_sections.is_empty() {
            prompt.push_str("\n## Memory\n");
            prompt.push_str(&memory_sections.join("\n\n"));
            prompt.push('\n');
        }

        debug!(prompt_len = prompt.len(), "Assembled system prompt");
        prompt
    }

    /// Today's note under `memory/YYYYMM/DD.md`.
    fn daily_note_path(&self) -> PathBuf {
        let now = Utc::now();
        self.workspace
            .join("memory")
            .join(now.format("%Y%m").to_string())
            .join(format!("{}.md", now.format("%d")))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
