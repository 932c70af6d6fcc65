//! File write tool with workspace confinement.

use async_trait::async_trait;
use std::path::PathBuf;

use ferriclaw_core::tool::{Tool, ToolContext, ToolResult};

use crate::paths::confine;

pub struct FileWriteTool {
    root: Option<PathBuf>,
}

impl FileWriteTool {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwrite (default: false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let Some(path) = args["path"].as_str().filter(|p| !p.is_empty()) else {
            return ToolResult::error("path is required");
        };
        let Some(content) = args["content"].as_str() else {
            return ToolResult::error("content is required");
        };
        let append = args["append"].as_bool().unwrap_or(false);

        let resolved = match &self.root {
            Some(root) => {
                // Create intermediate dirs inside the root before
                // confinement so the parent can canonicalize.
                let joined = root.join(path);
                if let Some(parent) = joined.parent() {
                    if parent.starts_with(root) {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                }
                match confine(path, root) {
                    Ok(p) => p,
                    Err(e) => return ToolResult::error(e),
                }
            }
            None => PathBuf::from(path),
        };

        let write_result = if append {
            use tokio::io::AsyncWriteExt;
            match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await
            {
                Ok(mut file) => file.write_all(content.as_bytes()).await,
                Err(e) => Err(e),
            }
        } else {
            tokio::fs::write(&resolved, content).await
        };

        match write_result {
            Ok(()) => ToolResult::text(format!("Wrote {} bytes to {path}", content.len())),
            Err(e) => ToolResult::error(format!("failed to write file: {e}")),
        }
    }
}
