//! Surprise-gated semantic memory over the KV/vector store.
//!
//! One index (`memory_index`, HNSW + COSINE) over hash keys prefixed
//! `memory:`. Entries are written exclusively by the memory worker once their
//! surprise score clears the threshold, and are read-only afterwards except
//! for deletion by the admin surface or the archival sweep.

mod codec;
mod embedder;
mod http_embedder;
mod in_memory_store;
mod redis_store;

pub use codec::{decode_embedding, embedding_to_hex, encode_embedding};
pub use embedder::{Embedder, HashEmbedder};
pub use http_embedder::HttpEmbedder;
pub use in_memory_store::InMemoryMemoryStore;
pub use redis_store::RedisMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Key prefix of every memory hash.
pub const MEMORY_PREFIX: &str = "memory:";
/// Name of the vector index over [`MEMORY_PREFIX`].
pub const MEMORY_INDEX: &str = "memory_index";

#[derive(Debug, Error)]
pub enum StoreError {
    /// KV/vector store unreachable or a command failed.
    #[error("kv store unavailable: {0}")]
    Unavailable(String),

    /// Embedding the text failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Entry violates a store invariant (empty message, wrong dimension).
    #[error("invalid memory entry: {0}")]
    InvalidEntry(String),

    /// No entry under the given id.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Field encoding/decoding failed.
    #[error("memory serialization: {0}")]
    Serialization(String),
}

/// One stored memory. `embedding` has the index dimension; `timestamp` is
/// seconds since epoch.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MemoryEntry {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub perplexity: f64,
    pub surprise_score: f64,
    pub timestamp: f64,
    pub session_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl MemoryEntry {
    /// Entry with defaults for everything but the message: session
    /// `"default"`, current wall-clock timestamp, null metadata.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            embedding: Vec::new(),
            perplexity: 0.0,
            surprise_score: 0.0,
            timestamp: now_epoch_secs(),
            session_id: "default".to_string(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Seconds since the Unix epoch as f64 (sub-second precision kept).
pub fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// One search hit: the entry, its id, and `similarity = 1 - cosine distance`.
#[derive(Clone, Debug)]
pub struct MemoryHit {
    pub id: String,
    pub entry: MemoryEntry,
    pub similarity: f64,
}

/// Vector memory store: one index, KNN search, timestamp-ordered listing.
///
/// Implementations: [`RedisMemoryStore`] (FT.SEARCH over HNSW) and
/// [`InMemoryMemoryStore`] (brute-force cosine; tests and single-box use).
/// Writes are idempotent per key; ids derive from the entry timestamp with a
/// sequence suffix on collision.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Creates the vector index when absent; tolerates "already exists".
    async fn ensure_index(&self) -> Result<(), StoreError>;

    /// Stores an entry and returns its id (`memory:<ms-timestamp>[-seq]`).
    /// The entry must carry a non-empty message and an embedding of the index
    /// dimension.
    async fn store(&self, entry: MemoryEntry) -> Result<String, StoreError>;

    /// Embeds `query` and KNN-searches the index. `session` filters on the
    /// `session_id` tag when given.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        session: Option<&str>,
    ) -> Result<Vec<MemoryHit>, StoreError>;

    async fn get(&self, id: &str) -> Result<MemoryEntry, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Entries sorted by descending timestamp, then paginated.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<(String, MemoryEntry)>, StoreError>;

    /// Number of keys under the memory prefix.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Liveness probe for the backing store (PING or equivalent).
    async fn ping(&self) -> bool;
}

/// Validates the store invariants shared by all backends.
pub(crate) fn check_entry(entry: &MemoryEntry, dimension: usize) -> Result<(), StoreError> {
    if entry.message.trim().is_empty() {
        return Err(StoreError::InvalidEntry("empty message".to_string()));
    }
    if entry.embedding.len() != dimension {
        return Err(StoreError::InvalidEntry(format!(
            "embedding dimension {} != index dimension {}",
            entry.embedding.len(),
            dimension
        )));
    }
    Ok(())
}
