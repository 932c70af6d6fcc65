//! BM25 search index over document chunks.
//!
//! Documents are split into overlapping character windows; each chunk is
//! the unit of ranking. Scoring is Okapi BM25 with k1 = 1.2, b = 0.75.
//!
//! The tokenizer lowercases and matches `[a-zA-Z0-9]+`, so alphabetic
//! characters outside ASCII are dropped. Known limitation, kept for
//! index-file compatibility.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use ferriclaw_core::error::KnowledgeError;

/// BM25 parameters.
const K1: f64 = 1.2;
const B: f64 = 0.75;

/// Chunking parameters (characters, counted in code points).
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("[a-zA-Z0-9]+").expect("token pattern compiles"));

/// A source document (file, note, web page).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    /// File path, URL, or "manual"
    pub source: String,

    /// "markdown", "text", a file extension, etc.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub content: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A contiguous character window of a document's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `<document_id>_chk_<index>`
    pub id: String,

    pub document_id: String,

    pub content: String,

    /// Order within the document, starting at 0
    pub index: usize,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A matched chunk with its BM25 score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f64,
    pub document_id: String,
    pub source: String,
}

/// Term frequency for one chunk in a posting list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Posting {
    #[serde(rename = "id")]
    pub chunk_id: String,
    pub tf: usize,
}

/// Window size and overlap for the chunker.
///
/// `chunk_size` must be strictly greater than `chunk_overlap`, otherwise
/// the window would never advance.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, KnowledgeError> {
        if chunk_size == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "chunk_size must be positive".into(),
            ));
        }
        if chunk_size <= chunk_overlap {
            return Err(KnowledgeError::InvalidConfig(format!(
                "chunk_size ({chunk_size}) must exceed chunk_overlap ({chunk_overlap})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A BM25 search index for one collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Index {
    pub name: String,

    /// chunk id -> chunk
    pub docs: HashMap<String, Chunk>,

    /// term -> postings
    #[serde(rename = "inverted_idx")]
    pub inverted: HashMap<String, Vec<Posting>>,

    /// chunk id -> token count
    pub doc_lengths: HashMap<String, usize>,

    /// Chunk ids in insertion order; fixes tie-breaking and keeps
    /// save/load round trips deterministic
    #[serde(default)]
    pub chunk_order: Vec<String>,

    pub doc_count: usize,

    /// Sum of all chunk token counts
    pub sum_doc_len: usize,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: HashMap::new(),
            inverted: HashMap::new(),
            doc_lengths: HashMap::new(),
            chunk_order: Vec::new(),
            doc_count: 0,
            sum_doc_len: 0,
        }
    }

    /// Chunk a document and add every chunk to the index.
    pub fn add_document(&mut self, doc: &Document, chunker: ChunkerConfig) {
        let chunks = chunk_text(&doc.content, chunker.chunk_size, chunker.chunk_overlap);
        for (i, content) in chunks.into_iter().enumerate() {
            let chunk_id = format!("{}_chk_{}", doc.id, i);
            let chunk = Chunk {
                id: chunk_id.clone(),
                document_id: doc.id.clone(),
                content,
                index: i,
                metadata: doc.metadata.clone(),
            };

            let tokens = tokenize(&chunk.content);
            let doc_len = tokens.len();

            let mut term_freqs: HashMap<&str, usize> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.as_str()).or_default() += 1;
            }
            for (term, tf) in term_freqs {
                self.inverted.entry(term.to_string()).or_default().push(Posting {
                    chunk_id: chunk_id.clone(),
                    tf,
                });
            }

            self.docs.insert(chunk_id.clone(), chunk);
            self.doc_lengths.insert(chunk_id.clone(), doc_len);
            self.chunk_order.push(chunk_id);
            self.sum_doc_len += doc_len;
            self.doc_count += 1;
        }
    }

    /// Rebuild `chunk_order` from the chunk map when it is missing or
    /// inconsistent (an index file written by an older schema). Sorted
    /// ids stand in for the lost insertion order.
    pub fn repair_order(&mut self) {
        if self.chunk_order.len() != self.docs.len()
            || self.chunk_order.iter().any(|id| !self.docs.contains_key(id))
        {
            let mut ids: Vec<String> = self.docs.keys().cloned().collect();
            ids.sort();
            self.chunk_order = ids;
        }
    }

    /// Rank chunks against a query with Okapi BM25.
    ///
    /// Results come back in descending score order; ties keep insertion
    /// order (stable sort). Terms absent from the index contribute zero.
    /// An empty index returns an empty result.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        if self.doc_count == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        let avg_doc_len = self.sum_doc_len as f64 / self.doc_count as f64;
        let mut scores: HashMap<&str, f64> = HashMap::new();

        for term in &query_tokens {
            let Some(postings) = self.inverted.get(term.as_str()) else {
                continue;
            };
            let doc_freq = postings.len();
            if doc_freq == 0 {
                continue;
            }

            // idf = ln((N - n + 0.5) / (n + 0.5) + 1)
            let idf = ((self.doc_count as f64 - doc_freq as f64 + 0.5)
                / (doc_freq as f64 + 0.5)
                + 1.0)
                .ln();

            for posting in postings {
                let tf = posting.tf as f64;
                let doc_len = *self.doc_lengths.get(&posting.chunk_id).unwrap_or(&0) as f64;

                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * (doc_len / avg_doc_len));
                *scores.entry(posting.chunk_id.as_str()).or_default() +=
                    idf * (numerator / denominator);
            }
        }

        let mut results: Vec<SearchResult> = self
            .chunk_order
            .iter()
            .filter_map(|chunk_id| {
                let score = *scores.get(chunk_id.as_str())?;
                let chunk = self.docs.get(chunk_id)?;
                Some(SearchResult {
                    chunk: chunk.clone(),
                    score,
                    document_id: chunk.document_id.clone(),
                    source: format!("chunk:{chunk_id}"),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        results
    }
}

/// Lowercase, then extract `[a-zA-Z0-9]+` runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Slide a `size` code-point window over `text`, advancing by
/// `size - overlap`. The last chunk is truncated to the text end.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        return vec![text.to_string()];
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end >= chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
