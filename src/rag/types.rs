use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fetched page: ephemeral, consumed immediately by the chunker.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_url: String,
    pub text: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A chunk of source text before the vector store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub text: String,
    pub source_url: String,
    pub chunk_index: i32,
    /// Scalar-only metadata; non-scalar values were dropped by the chunker.
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A chunk as persisted in the vector store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub source_url: String,
    pub chunk_index: i32,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: StoredChunk,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    WebPage,
}

/// One ingested source. Immutable once created; re-ingesting the same URL
/// appends a second record rather than de-duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSource {
    pub source_type: SourceType,
    pub source_url: String,
    pub max_crawl_depth: usize,
    pub chunk_ids: Vec<String>,
}

/// The full persisted set of sources, saved atomically as one JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagSources {
    pub sources: Vec<RagSource>,
}
