//! Multi-collection knowledge store.
//!
//! Each collection is one `Index` backed by one on-disk file,
//! `<base>/<collection>.index.json`. Loading is lazy; every successful
//! `add_document` re-serializes the whole index (write-through). Saves go
//! through a temp file and an atomic rename so a crash mid-write cannot
//! corrupt the collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use ferriclaw_core::error::KnowledgeError;

use crate::index::{ChunkerConfig, Document, Index, SearchResult};

/// Summary of one collection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Collection {
    pub name: String,
    pub documents: usize,
    pub chunks: usize,
}

/// The collection map. The map itself and every index carry their own
/// read-write lock: two searches proceed in parallel, a search and an add
/// on the same collection are serialized.
pub struct Store {
    base_dir: PathBuf,
    chunker: ChunkerConfig,
    indexes: RwLock<HashMap<String, Arc<RwLock<Index>>>>,
}

impl Store {
    pub fn new(base_dir: impl Into<PathBuf>, chunker: ChunkerConfig) -> Result<Self, KnowledgeError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| {
            KnowledgeError::Storage(format!(
                "failed to create knowledge directory {}: {e}",
                base_dir.display()
            ))
        })?;
        Ok(Self {
            base_dir,
            chunker,
            indexes: RwLock::new(HashMap::new()),
        })
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.index.json"))
    }

    fn normalize(name: &str) -> Result<String, KnowledgeError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(KnowledgeError::EmptyCollectionName);
        }
        Ok(name)
    }

    /// Get a collection's index, loading it from disk on first access.
    /// A missing file yields a fresh empty index; an unreadable one is
    /// treated the same way with a warning, and the bad file is left in
    /// place until the next successful save.
    async fn get_index(&self, name: &str) -> Result<Arc<RwLock<Index>>, KnowledgeError> {
        let name = Self::normalize(name)?;

        if let Some(idx) = self.indexes.read().await.get(&name) {
            return Ok(idx.clone());
        }

        let mut indexes = self.indexes.write().await;
        // Re-check: another task may have loaded it while we waited.
        if let Some(idx) = indexes.get(&name) {
            return Ok(idx.clone());
        }

        let index = self.load_index(&name).await;
        let index = Arc::new(RwLock::new(index));
        indexes.insert(name, index.clone());
        Ok(index)
    }

    async fn load_index(&self, name: &str) -> Index {
        let path = self.index_path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Index>(&bytes) {
                Ok(mut index) => {
                    index.name = name.to_string();
                    index.repair_order();
                    debug!(collection = %name, chunks = index.doc_count, "Loaded index from disk");
                    index
                }
                Err(e) => {
                    warn!(
                        collection = %name,
                        path = %path.display(),
                        error = %e,
                        "Index file is schema-invalid, starting fresh (file preserved)"
                    );
                    Index::new(name)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Index::new(name),
            Err(e) => {
                warn!(
                    collection = %name,
                    error = %e,
                    "Index file unreadable, starting fresh (file preserved)"
                );
                Index::new(name)
            }
        }
    }

    /// Serialize an index to its file via temp file + rename.
    async fn save_index(&self, index: &Index) -> Result<(), KnowledgeError> {
        let path = self.index_path(&index.name);
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec(index)
            .map_err(|e| KnowledgeError::Storage(format!("serialize index: {e}")))?;

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }

    /// Add a document to a collection, assigning an id and timestamps
    /// when absent, then persist the index.
    pub async fn add_document(
        &self,
        collection: &str,
        mut doc: Document,
    ) -> Result<(), KnowledgeError> {
        let index = self.get_index(collection).await?;

        if doc.id.is_empty() {
            doc.id = format!(
                "doc_{}",
                chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
            );
        }
        let now = chrono::Utc::now();
        if doc.created_at.is_none() {
            doc.created_at = Some(now);
        }
        doc.updated_at = Some(now);

        // Hold the write lock across the save: a mutated index must reach
        // disk before the next search on it completes.
        let mut guard = index.write().await;
        guard.add_document(&doc, self.chunker);
        self.save_index(&guard).await
    }

    /// BM25 search within one collection.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, KnowledgeError> {
        let index = self.get_index(collection).await?;
        let guard = index.read().await;
        Ok(guard.search(query, limit))
    }

    /// List collections known on disk, with document/chunk counts.
    pub async fn list_collections(&self) -> Result<Vec<Collection>, KnowledgeError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("read dir: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| KnowledgeError::Storage(format!("read dir entry: {e}")))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(".index.json") {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut collections = Vec::with_capacity(names.len());
        for name in names {
            let index = self.get_index(&name).await?;
            let guard = index.read().await;
            collections.push(Collection {
                name: guard.name.clone(),
                documents: guard.doc_count,
                chunks: guard.docs.len(),
            });
        }
        Ok(collections)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str) -> Document {
        Document {
            id: id.into(),
            source: "test".into(),
            kind: "text".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    fn store_in(dir: &Path) -> Store {
        Store::new(dir, ChunkerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn add_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store
            .add_document("notes", doc("note1", "Persistent knowledge is valuable."))
            .await
            .unwrap();

        let results = store.search("notes", "knowledge", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "note1");
    }

    #[tokio::test]
    async fn persistence_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let top_score = {
            let store = store_in(dir.path());
            store
                .add_document("k", doc("note1", "Persistent knowledge is valuable."))
                .await
                .unwrap();
            store.search("k", "valuable", 5).await.unwrap()[0].score
        };

        // Fresh store over the same base dir: lazy load from disk.
        let store = store_in(dir.path());
        let results = store.search("k", "valuable", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "note1");
        assert!((results[0].score - top_score).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .add_document("atomic", doc("d", "content"))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"atomic.index.json".to_string()));
        assert!(
            names.iter().all(|n| !n.ends_with(".tmp")),
            "atomic save must not leave temp files: {names:?}"
        );
    }

    #[tokio::test]
    async fn corrupt_index_file_starts_fresh_and_preserves_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad_path = dir.path().join("broken.index.json");
        std::fs::write(&bad_path, "{not valid json").unwrap();

        let store = store_in(dir.path());
        let results = store.search("broken", "anything", 5).await.unwrap();
        assert!(results.is_empty());

        // Search alone must not clobber the original file.
        let raw = std::fs::read_to_string(&bad_path).unwrap();
        assert_eq!(raw, "{not valid json");

        // The next successful save replaces it.
        store.add_document("broken", doc("d", "fresh start")).await.unwrap();
        let raw = std::fs::read_to_string(&bad_path).unwrap();
        assert!(raw.contains("fresh start"));
    }

    #[tokio::test]
    async fn empty_collection_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.search("  ", "q", 5).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::EmptyCollectionName));
    }

    #[tokio::test]
    async fn collection_names_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_document(" Notes ", doc("n", "alpha")).await.unwrap();

        let results = store.search("notes", "alpha", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(dir.path().join("notes.index.json").exists());
    }

    #[tokio::test]
    async fn list_collections_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_document("alpha", doc("a", "one two three")).await.unwrap();
        store.add_document("beta", doc("b", "four")).await.unwrap();
        store.add_document("beta", doc("c", "five")).await.unwrap();

        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].name, "alpha");
        assert_eq!(collections[0].chunks, 1);
        assert_eq!(collections[1].name, "beta");
        assert_eq!(collections[1].documents, 2);
    }

    #[tokio::test]
    async fn generated_ids_for_blank_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .add_document("gen", doc("", "auto id content"))
            .await
            .unwrap();

        let results = store.search("gen", "auto", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].document_id.starts_with("doc_"));
    }
}
