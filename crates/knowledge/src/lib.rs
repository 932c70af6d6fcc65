//! BM25 knowledge store.
//!
//! Documents live in named collections. Each collection is a keyword
//! index at chunk granularity, ranked with Okapi BM25 and persisted as a
//! single JSON file (`<base>/<collection>.index.json`) after every write.

pub mod index;
pub mod store;

pub use index::{Chunk, ChunkerConfig, Document, Index, SearchResult};
pub use store::{Collection, Store};
