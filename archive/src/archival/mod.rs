//! Cold-archive sweep: old memories beyond the keep window move from the KV
//! store into append-only monthly JSON files.
//!
//! Runs daily at the configured hour/minute, and on demand through the admin
//! endpoint. The sweep is idempotent over a day: when today's file already
//! exists the scheduled run is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::memory::{embedding_to_hex, MemoryEntry, MemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("archive io: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sweep policy. `keep` newest entries always stay; of the rest only entries
/// older than `days` are archived.
#[derive(Clone, Debug)]
pub struct ArchivePolicy {
    pub keep: usize,
    pub days: u32,
    pub hour: u32,
    pub minute: u32,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            keep: 1000,
            days: 30,
            hour: 3,
            minute: 0,
        }
    }
}

/// Archived form of one memory: embedding hex-encoded so the file stays
/// valid JSON without megabytes of float arrays.
#[derive(Serialize)]
struct ArchivedMemory<'a> {
    id: &'a str,
    message: &'a str,
    embedding_hex: String,
    perplexity: f64,
    surprise_score: f64,
    timestamp: f64,
    session_id: &'a str,
    metadata: &'a serde_json::Value,
}

fn archived<'a>(id: &'a str, e: &'a MemoryEntry) -> ArchivedMemory<'a> {
    ArchivedMemory {
        id,
        message: &e.message,
        embedding_hex: embedding_to_hex(&e.embedding),
        perplexity: e.perplexity,
        surprise_score: e.surprise_score,
        timestamp: e.timestamp,
        session_id: &e.session_id,
        metadata: &e.metadata,
    }
}

pub struct ArchivalWorker {
    store: Arc<dyn MemoryStore>,
    data_dir: PathBuf,
    policy: ArchivePolicy,
}

impl ArchivalWorker {
    pub fn new(store: Arc<dyn MemoryStore>, data_dir: &Path, policy: ArchivePolicy) -> Self {
        Self {
            store,
            data_dir: data_dir.to_path_buf(),
            policy,
        }
    }

    /// `archive/YYYY-MM/memories-YYYYMMDD.json` under the data root for the
    /// given day.
    fn file_for(&self, now: DateTime<Utc>) -> PathBuf {
        self.data_dir
            .join("archive")
            .join(now.format("%Y-%m").to_string())
            .join(format!("memories-{}.json", now.format("%Y%m%d")))
    }

    /// One sweep. Returns the number of archived entries; 0 when today's file
    /// already exists or nothing qualifies.
    pub async fn run_once(&self) -> Result<usize, ArchiveError> {
        self.run_once_at(Utc::now()).await
    }

    /// Sweep with an explicit "now" so tests control the clock.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<usize, ArchiveError> {
        let path = self.file_for(now);
        if path.exists() {
            tracing::debug!(path = %path.display(), "archive file for today exists, skipping sweep");
            return Ok(0);
        }

        // Newest-first listing; everything past `keep` is a candidate.
        let all = self.store.list(usize::MAX, 0).await?;
        let cutoff = now.timestamp() as f64 - self.policy.days as f64 * 86_400.0;
        let victims: Vec<&(String, MemoryEntry)> = all
            .iter()
            .skip(self.policy.keep)
            .filter(|(_, e)| e.timestamp < cutoff)
            .collect();

        if victims.is_empty() {
            return Ok(0);
        }

        let body: Vec<ArchivedMemory> = victims
            .iter()
            .map(|(id, e)| archived(id, e))
            .collect();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(&body)?)?;

        // Delete only after the file is durably on disk.
        let mut archived_count = 0;
        for (id, _) in victims {
            match self.store.delete(id).await {
                Ok(()) => archived_count += 1,
                Err(StoreError::NotFound(_)) => {} // raced with an admin delete
                Err(e) => {
                    tracing::warn!(error = %e, %id, "failed to delete archived memory");
                }
            }
        }

        tracing::info!(
            count = archived_count,
            path = %path.display(),
            "archived cold memories"
        );
        Ok(archived_count)
    }

    /// Seconds until the next scheduled run at `hour:minute` local time.
    fn seconds_until_next_run(&self, now: DateTime<Local>) -> u64 {
        let at = NaiveTime::from_hms_opt(self.policy.hour, self.policy.minute, 0)
            .unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(at);
        let next = if today > now.naive_local() {
            today
        } else {
            today + chrono::Duration::days(1)
        };
        match Local.from_local_datetime(&next).single() {
            Some(next) => (next - now).num_seconds().max(1) as u64,
            None => 86_400, // DST gap; try again in a day
        }
    }

    /// Daily scheduler; exits when `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            hour = self.policy.hour,
            minute = self.policy.minute,
            "archival worker scheduled"
        );
        loop {
            let sleep_secs = self.seconds_until_next_run(Local::now());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)) => {}
            }
            if let Err(e) = self.run_once().await {
                tracing::warn!(error = %e, "archival sweep failed");
            }
        }
        tracing::info!("archival worker stopped");
    }
}
