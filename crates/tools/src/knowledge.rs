//! The `knowledge` tool: search, grow, and inspect the BM25 store.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use ferriclaw_core::tool::{Tool, ToolContext, ToolResult};
use ferriclaw_knowledge::{Document, Store};

const DEFAULT_COLLECTION: &str = "general";
const DEFAULT_LIMIT: usize = 5;

pub struct KnowledgeTool {
    store: Arc<Store>,
}

impl KnowledgeTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn handle_search(&self, args: &serde_json::Value, collection: &str) -> ToolResult {
        let Some(query) = args["query"].as_str().filter(|q| !q.is_empty()) else {
            return ToolResult::error("query is required for the search action");
        };
        let limit = args["limit"].as_u64().map(|l| l as usize).unwrap_or(DEFAULT_LIMIT);

        let results = match self.store.search(collection, query, limit).await {
            Ok(results) => results,
            Err(e) => return ToolResult::error(format!("search failed: {e}")),
        };

        if results.is_empty() {
            return ToolResult::dual(
                format!("No results found for '{query}' in collection '{collection}'."),
                format!("Searched '{query}' in '{collection}': no matches."),
            );
        }

        let mut for_llm = String::new();
        for (i, res) in results.iter().enumerate() {
            for_llm.push_str(&format!(
                "Result {} (score: {:.2})\nSource: {}\nContent:\n{}\n\n---\n\n",
                i + 1,
                res.score,
                res.source,
                res.chunk.content
            ));
        }

        let mut for_user = format!(
            "Found {} results for '{query}' in '{collection}':\n",
            results.len()
        );
        for res in results.iter().take(3) {
            let title = res
                .chunk
                .metadata
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("Untitled");
            let preview: String = res.chunk.content.chars().take(100).collect();
            for_user.push_str(&format!("- {title}: {preview}\n"));
        }

        ToolResult::dual(for_llm, for_user)
    }

    async fn handle_add(&self, args: &serde_json::Value, collection: &str) -> ToolResult {
        let Some(content) = args["content"].as_str().filter(|c| !c.is_empty()) else {
            return ToolResult::error("content is required for the add action");
        };
        let title = args["title"].as_str().unwrap_or("Untitled Note");

        let mut metadata = serde_json::Map::new();
        metadata.insert("title".into(), serde_json::Value::String(title.into()));

        let doc = Document {
            title: Some(title.into()),
            content: content.into(),
            source: "manual".into(),
            kind: "text".into(),
            metadata,
            ..Default::default()
        };

        if let Err(e) = self.store.add_document(collection, doc).await {
            return ToolResult::error(format!("failed to add document: {e}"));
        }
        ToolResult::dual(
            format!("Added document '{title}' to collection '{collection}'."),
            format!("Added '{title}' to knowledge base '{collection}'."),
        )
    }

    async fn handle_ingest(&self, args: &serde_json::Value, collection: &str) -> ToolResult {
        let Some(path) = args["path"].as_str().filter(|p| !p.is_empty()) else {
            return ToolResult::error("path is required for the ingest action");
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => return ToolResult::error(format!("failed to read file: {e}")),
        };

        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let ext = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut metadata = serde_json::Map::new();
        metadata.insert("title".into(), serde_json::Value::String(filename.clone()));
        metadata.insert("path".into(), serde_json::Value::String(path.into()));

        let doc = Document {
            title: Some(filename.clone()),
            content,
            source: path.into(),
            kind: ext,
            metadata,
            ..Default::default()
        };

        if let Err(e) = self.store.add_document(collection, doc).await {
            return ToolResult::error(format!("failed to ingest document: {e}"));
        }
        ToolResult::dual(
            format!("Ingested file '{filename}' into collection '{collection}'."),
            format!("Ingested '{filename}' into knowledge base '{collection}'."),
        )
    }

    async fn handle_list(&self) -> ToolResult {
        let collections = match self.store.list_collections().await {
            Ok(collections) => collections,
            Err(e) => return ToolResult::error(format!("failed to list collections: {e}")),
        };

        if collections.is_empty() {
            return ToolResult::text("No knowledge collections found.");
        }

        let mut out = String::from("Available knowledge collections:\n");
        for c in collections {
            out.push_str(&format!(
                "- {}: {} documents, {} chunks\n",
                c.name, c.documents, c.chunks
            ));
        }
        ToolResult::text(out)
    }
}

#[async_trait]
impl Tool for KnowledgeTool {
    fn name(&self) -> &str {
        "knowledge"
    }

    fn description(&self) -> &str {
        "Search, retrieve, and manage knowledge in the corporate memory.\n\
         Use this to find existing information or save new knowledge for future recall.\n\
         Capabilities:\n\
         - search: Find relevant information using keywords (BM25)\n\
         - add: Save text snippets or summaries\n\
         - ingest: Read and index a file (markdown, text, etc.)\n\
         - list: List available knowledge collections"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["search", "add", "ingest", "list"],
                    "description": "The action to perform"
                },
                "collection": {
                    "type": "string",
                    "description": "The knowledge collection name (default: 'general')"
                },
                "query": {
                    "type": "string",
                    "description": "Search query keywords (for action='search')"
                },
                "content": {
                    "type": "string",
                    "description": "Text content to save (for action='add')"
                },
                "title": {
                    "type": "string",
                    "description": "Title of the document (for action='add')"
                },
                "path": {
                    "type": "string",
                    "description": "Path to a file to ingest (for action='ingest')"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max number of results to return (default: 5)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let action = args["action"].as_str().unwrap_or_default();
        let collection = args["collection"]
            .as_str()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COLLECTION);

        match action {
            "search" => self.handle_search(&args, collection).await,
            "add" => self.handle_add(&args, collection).await,
            "ingest" => self.handle_ingest(&args, collection).await,
            "list" => self.handle_list().await,
            other => ToolResult::error(format!("unknown action: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferriclaw_knowledge::ChunkerConfig;

    fn tool_in(dir: &Path) -> KnowledgeTool {
        let store = Arc::new(Store::new(dir, ChunkerConfig::default()).unwrap());
        KnowledgeTool::new(store)
    }

    #[tokio::test]
    async fn add_then_search_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let ctx = ToolContext::default();

        let added = tool
            .execute(
                &ctx,
                serde_json::json!({
                    "action": "add",
                    "collection": "c1",
                    "title": "Deploy Notes",
                    "content": "Deploy requires the staging gate to pass first."
                }),
            )
            .await;
        assert!(!added.is_error);

        let found = tool
            .execute(
                &ctx,
                serde_json::json!({"action": "search", "collection": "c1", "query": "staging gate"}),
            )
            .await;
        assert!(!found.is_error);
        assert!(found.for_llm.contains("staging gate"));
        assert!(found.for_user.contains("Deploy Notes"));
        // Dual payload: the model gets full chunks, the user a summary.
        assert_ne!(found.for_llm, found.for_user);
    }

    #[tokio::test]
    async fn search_no_results_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"action": "search", "query": "missing"}),
            )
            .await;
        assert!(!result.is_error);
        assert!(result.for_llm.contains("No results"));
    }

    #[tokio::test]
    async fn ingest_reads_file_with_extension_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("runbook.md");
        std::fs::write(&file, "Restart the ingest worker when the queue stalls.").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({
                    "action": "ingest",
                    "collection": "ops",
                    "path": file.to_str().unwrap()
                }),
            )
            .await;
        assert!(!result.is_error);
        assert!(result.for_llm.contains("runbook.md"));

        let found = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"action": "search", "collection": "ops", "query": "queue stalls"}),
            )
            .await;
        assert!(found.for_llm.contains("ingest worker"));
    }

    #[tokio::test]
    async fn ingest_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"action": "ingest", "path": "/nonexistent/file.md"}),
            )
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn list_reports_collections() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let ctx = ToolContext::default();

        let empty = tool.execute(&ctx, serde_json::json!({"action": "list"})).await;
        assert!(empty.for_llm.contains("No knowledge collections"));

        tool.execute(
            &ctx,
            serde_json::json!({"action": "add", "collection": "notes", "content": "something"}),
        )
        .await;

        let listed = tool.execute(&ctx, serde_json::json!({"action": "list"})).await;
        assert!(listed.for_llm.contains("notes"));
        assert!(listed.for_llm.contains("1 documents"));
    }

    #[tokio::test]
    async fn unknown_action_errors() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let result = tool
            .execute(&ToolContext::default(), serde_json::json!({"action": "zap"}))
            .await;
        assert!(result.is_error);
        assert!(result.for_llm.contains("unknown action"));
    }
}
