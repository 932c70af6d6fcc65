//! File read tool with workspace confinement.

use async_trait::async_trait;
use std::path::PathBuf;

use ferriclaw_core::tool::{Tool, ToolContext, ToolResult};

use crate::paths::confine;

pub struct FileReadTool {
    /// Confinement root; None allows any path.
    root: Option<PathBuf>,
}

impl FileReadTool {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let Some(path) = args["path"].as_str().filter(|p| !p.is_empty()) else {
            return ToolResult::error("path is required");
        };

        let resolved = match &self.root {
            Some(root) => match confine(path, root) {
                Ok(p) => p,
                Err(e) => return ToolResult::error(e),
            },
            None => PathBuf::from(path),
        };

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => ToolResult::dual(content, format!("Read {path}")),
            Err(e) => ToolResult::error(format!("failed to read file: {e}")),
        }
    }
}
