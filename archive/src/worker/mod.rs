//! Memory worker: the input stream's single consumer.
//!
//! Pulls turns from the stream, scores each for surprise (normalized
//! perplexity blended with vector novelty), and stores the ones that clear
//! the threshold. Processing is at-least-once: the cursor advances after
//! every entry, stores are idempotent per key, and any per-entry failure is
//! a logged skip, never a crash.

mod surprise;

pub use surprise::{normalize_perplexity, perplexity, surprise_score, SurpriseConfig};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::llm::LlmClient;
use crate::memory::{Embedder, MemoryEntry, MemoryStore};
use crate::stream::{Cursor, InputStream};

const BATCH_SIZE: usize = 16;
const POLL_BLOCK: Duration = Duration::from_secs(1);
const LOGPROB_RETRIES: u32 = 3;
const LOGPROB_RETRY_DELAY: Duration = Duration::from_millis(250);
/// Stream trim cadence, in processed batches.
const TRIM_EVERY: u64 = 32;

/// Shared counters surfaced through `/health` and `/metrics`.
#[derive(Default)]
pub struct WorkerStats {
    pub processed: AtomicU64,
    pub stored: AtomicU64,
    pub skipped: AtomicU64,
    pub running: AtomicBool,
}

impl WorkerStats {
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "running": self.running.load(Ordering::Relaxed),
            "processed": self.processed.load(Ordering::Relaxed),
            "stored": self.stored.load(Ordering::Relaxed),
            "skipped": self.skipped.load(Ordering::Relaxed),
        })
    }
}

pub struct MemoryWorker {
    stream: Arc<dyn InputStream>,
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmClient>,
    config: SurpriseConfig,
    stream_maxlen: usize,
    start_from_latest: bool,
    stats: Arc<WorkerStats>,
}

impl MemoryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: Arc<dyn InputStream>,
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmClient>,
        config: SurpriseConfig,
        stream_maxlen: usize,
        start_from_latest: bool,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            stream,
            store,
            embedder,
            llm,
            config,
            stream_maxlen,
            start_from_latest,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Initial cursor: the persisted one when present, else latest or
    /// beginning per configuration.
    async fn initial_cursor(&self) -> Cursor {
        match self.stream.read_cursor().await {
            Ok(Some(id)) => Cursor::At(id),
            Ok(None) if self.start_from_latest => Cursor::Latest,
            Ok(None) => Cursor::Beginning,
            Err(e) => {
                tracing::warn!(error = %e, "could not read worker cursor, starting from beginning");
                Cursor::Beginning
            }
        }
    }

    /// Consumes the stream until `cancel` fires. Exits within one poll
    /// interval of cancellation; no state is lost because the cursor is
    /// externalized after every entry.
    pub async fn run(self, cancel: CancellationToken) {
        self.stats.running.store(true, Ordering::Relaxed);
        let mut cursor = self.initial_cursor().await;
        let mut batches: u64 = 0;
        tracing::info!(?cursor, "memory worker started");

        while !cancel.is_cancelled() {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.stream.read_batch(&cursor, BATCH_SIZE, POLL_BLOCK) => r,
            };

            let batch = match batch {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "stream read failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_BLOCK) => continue,
                    }
                }
            };

            for (id, entry) in batch {
                self.process_entry(&entry).await;
                cursor = Cursor::At(id.clone());
                if let Err(e) = self.stream.write_cursor(&id).await {
                    tracing::warn!(error = %e, "failed to persist worker cursor");
                }
                if cancel.is_cancelled() {
                    break;
                }
            }

            batches += 1;
            if batches % TRIM_EVERY == 0 {
                if let Err(e) = self.stream.trim(self.stream_maxlen).await {
                    tracing::warn!(error = %e, "stream trim failed");
                }
            }
        }

        self.stats.running.store(false, Ordering::Relaxed);
        tracing::info!("memory worker stopped");
    }

    /// Scores one turn and stores it when the gate opens. Every failure path
    /// is an explicit skip with a logged reason.
    async fn process_entry(&self, entry: &crate::stream::StreamEntry) {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        if entry.message.trim().is_empty() {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("skipping empty stream entry");
            return;
        }

        let logprobs = match self.logprobs_with_retry(&entry.message).await {
            Some(lp) => lp,
            None => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    message = %truncate(&entry.message, 80),
                    "perplexity unavailable after retries, skipping entry"
                );
                return;
            }
        };
        let p = perplexity(&logprobs);
        let p_hat = normalize_perplexity(p, self.config.norm_divisor);

        let novelty = match self.store.search(&entry.message, 1, None).await {
            Ok(hits) => hits.first().map(|h| 1.0 - h.similarity).unwrap_or(1.0),
            Err(e) => {
                tracing::warn!(error = %e, "novelty search failed, assuming novel");
                1.0
            }
        };

        let score = surprise_score(p_hat, novelty, self.config.alpha);
        tracing::debug!(
            perplexity = p,
            p_hat,
            novelty,
            score,
            threshold = self.config.threshold,
            "scored stream entry"
        );

        if score < self.config.threshold {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(score, "below surprise threshold, not retained");
            return;
        }

        let embedding = match self.embedder.embed_one(&entry.message).await {
            Ok(v) => v,
            Err(e) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "embedding failed, skipping entry");
                return;
            }
        };

        let memory = MemoryEntry {
            message: entry.message.clone(),
            embedding,
            perplexity: p,
            surprise_score: score,
            timestamp: entry.timestamp,
            session_id: entry.session_id.clone(),
            metadata: serde_json::Value::Null,
        };
        match self.store.store(memory).await {
            Ok(id) => {
                self.stats.stored.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%id, score, "retained surprising memory");
            }
            Err(e) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "memory store failed, skipping entry");
            }
        }
    }

    async fn logprobs_with_retry(&self, message: &str) -> Option<Vec<f64>> {
        for attempt in 0..LOGPROB_RETRIES {
            match self.llm.logprobs(message).await {
                Ok(lp) => return Some(lp),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "logprobs call failed");
                    tokio::time::sleep(LOGPROB_RETRY_DELAY * (attempt + 1)).await;
                }
            }
        }
        None
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::memory::{HashEmbedder, InMemoryMemoryStore};
    use crate::stream::{InMemoryInputStream, StreamEntry};

    struct Harness {
        stream: Arc<InMemoryInputStream>,
        store: Arc<InMemoryMemoryStore>,
        llm: Arc<MockLlm>,
        worker: MemoryWorker,
    }

    fn harness(config: SurpriseConfig) -> Harness {
        let embedder = Arc::new(HashEmbedder::new(32));
        let stream = Arc::new(InMemoryInputStream::new());
        let store = Arc::new(InMemoryMemoryStore::new(
            Arc::clone(&embedder) as Arc<dyn Embedder>
        ));
        let llm = Arc::new(MockLlm::new());
        let worker = MemoryWorker::new(
            Arc::clone(&stream) as Arc<dyn InputStream>,
            Arc::clone(&store) as Arc<dyn MemoryStore>,
            embedder,
            Arc::clone(&llm) as Arc<dyn LlmClient>,
            config,
            1000,
            false,
            Arc::new(WorkerStats::default()),
        );
        Harness {
            stream,
            store,
            llm,
            worker,
        }
    }

    /// Drives the worker's per-entry path deterministically: read, process,
    /// advance cursor, until the stream is drained.
    async fn drain(h: &Harness) {
        let mut cursor = h.worker.initial_cursor().await;
        loop {
            let batch = h
                .worker
                .stream
                .read_batch(&cursor, BATCH_SIZE, Duration::ZERO)
                .await
                .unwrap();
            if batch.is_empty() {
                break;
            }
            for (id, entry) in batch {
                h.worker.process_entry(&entry).await;
                cursor = Cursor::At(id.clone());
                h.worker.stream.write_cursor(&id).await.unwrap();
            }
        }
    }

    /// Gate invariant: stored iff `alpha * p_hat + (1-alpha) * novelty >= threshold`.
    #[tokio::test]
    async fn surprising_entry_is_stored_and_mundane_is_not() {
        let h = harness(SurpriseConfig::default());

        // Low perplexity (flat -0.2 per token) on an empty store: novelty 1.0,
        // p_hat = ln(exp(0.2)+1)/5 ~ 0.157, score ~ 0.49 -> below 0.7.
        h.llm.push_logprobs(vec![-0.2; 6]);
        h.stream
            .append(StreamEntry::new("Hello, how are you today?", "default"))
            .await
            .unwrap();

        // High perplexity (-6.0 per token): p_hat = 1.0, score = 1.0 -> stored.
        h.llm.push_logprobs(vec![-6.0; 5]);
        h.stream
            .append(StreamEntry::new(
                "Quantum flibbertigibbet zamboni crystallography",
                "default",
            ))
            .await
            .unwrap();

        drain(&h).await;

        assert_eq!(h.store.count().await.unwrap(), 1);
        let stats = h.worker.stats();
        assert_eq!(stats.stored.load(Ordering::Relaxed), 1);
        assert_eq!(stats.skipped.load(Ordering::Relaxed), 1);
        let (_, stored) = h.store.list(1, 0).await.unwrap().remove(0);
        assert!(stored.message.starts_with("Quantum"));
        assert!(stored.surprise_score >= SurpriseConfig::default().threshold - 1e-6);
        assert_eq!(stored.embedding.len(), 32);
    }

    /// At-least-once accounting: every entry is either stored or an explicit
    /// skip; nothing disappears silently.
    #[tokio::test]
    async fn every_entry_is_stored_or_skipped() {
        let h = harness(SurpriseConfig {
            threshold: 0.5,
            ..SurpriseConfig::default()
        });
        let n = 12;
        for i in 0..n {
            // Alternate mundane and surprising logprobs.
            let lp = if i % 2 == 0 { -0.1 } else { -8.0 };
            h.llm.push_logprobs(vec![lp; 4]);
            h.stream
                .append(StreamEntry::new(format!("synthetic message {i}"), "default"))
                .await
                .unwrap();
        }
        drain(&h).await;

        let stats = h.worker.stats();
        let stored = stats.stored.load(Ordering::Relaxed);
        let skipped = stats.skipped.load(Ordering::Relaxed);
        assert_eq!(stored + skipped, n as u64);
        assert_eq!(h.store.count().await.unwrap(), stored as usize);
    }

    #[tokio::test]
    async fn cursor_advances_past_failed_entries() {
        let h = harness(SurpriseConfig::default());
        // Empty message: skipped without an LLM call, cursor still advances.
        h.stream
            .append(StreamEntry::new("   ", "default"))
            .await
            .unwrap();
        h.llm.push_logprobs(vec![-9.0; 3]);
        h.stream
            .append(StreamEntry::new("unforeseen axolotl syzygy", "default"))
            .await
            .unwrap();

        drain(&h).await;

        let cursor = h.stream.read_cursor().await.unwrap();
        let latest = h.stream.latest_id().await.unwrap();
        assert_eq!(cursor, latest);
        assert_eq!(h.store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn run_observes_cancellation() {
        let h = harness(SurpriseConfig::default());
        let cancel = CancellationToken::new();
        let stats = h.worker.stats();
        let handle = tokio::spawn(h.worker.run(cancel.clone()));
        // Let the loop enter its poll, then cancel.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(stats.running.load(Ordering::Relaxed));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker exits within the poll interval")
            .unwrap();
        assert!(!stats.running.load(Ordering::Relaxed));
    }
}
