//! In-memory memory store: dashmap + brute-force cosine search.
//!
//! Same trait and id scheme as the Redis backend, no persistence. Used by the
//! test suites and by single-box deployments without a KV store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::codec::cosine_similarity;
use super::{check_entry, Embedder, MemoryEntry, MemoryHit, MemoryStore, StoreError, MEMORY_PREFIX};

pub struct InMemoryMemoryStore {
    data: DashMap<String, MemoryEntry>,
    embedder: Arc<dyn Embedder>,
    seq: AtomicU64,
}

impl InMemoryMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            data: DashMap::new(),
            embedder,
            seq: AtomicU64::new(0),
        }
    }

    /// `memory:<ms>` from the entry timestamp, suffixed `-<seq>` when that
    /// key is already taken (same-millisecond writes, clock regression).
    fn next_id(&self, timestamp: f64) -> String {
        let ms = (timestamp * 1000.0) as u64;
        let base = format!("{MEMORY_PREFIX}{ms}");
        if !self.data.contains_key(&base) {
            return base;
        }
        loop {
            let id = format!("{base}-{}", self.seq.fetch_add(1, Ordering::Relaxed));
            if !self.data.contains_key(&id) {
                return id;
            }
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn ensure_index(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String, StoreError> {
        check_entry(&entry, self.embedder.dimension())?;
        let id = self.next_id(entry.timestamp);
        self.data.insert(id.clone(), entry);
        Ok(id)
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        session: Option<&str>,
    ) -> Result<Vec<MemoryHit>, StoreError> {
        let qv = self.embedder.embed_one(query).await?;
        let mut hits: Vec<MemoryHit> = self
            .data
            .iter()
            .filter(|r| session.map_or(true, |s| r.value().session_id == s))
            .map(|r| MemoryHit {
                id: r.key().clone(),
                similarity: cosine_similarity(&qv, &r.value().embedding),
                entry: r.value().clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<MemoryEntry, StoreError> {
        self.data
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.data
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<(String, MemoryEntry)>, StoreError> {
        let mut all: Vec<(String, MemoryEntry)> = self
            .data
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort_by(|a, b| b.1.timestamp.total_cmp(&a.1.timestamp));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.data.len())
    }

    async fn ping(&self) -> bool {
        true
    }
}
