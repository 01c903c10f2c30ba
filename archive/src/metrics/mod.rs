//! Metrics collector: periodic samples of process and collaborator state in
//! a bounded ring buffer, mirrored to the KV store when one is wired.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;

use crate::health::{HealthChecker, ServiceStatus};
use crate::memory::MemoryStore;

/// Samples kept in process memory.
const RING_CAPACITY: usize = 120;
/// Samples mirrored to the KV sorted set.
const KV_MIRROR_CAP: usize = 1000;
const KV_MIRROR_KEY: &str = "archive:metrics";

#[derive(Clone, Debug, Serialize)]
pub struct MetricsSample {
    pub timestamp: f64,
    pub cpu_percent: f32,
    pub rss_bytes: u64,
    pub uptime_seconds: u64,
    pub total_memories: usize,
    pub services: std::collections::BTreeMap<String, ServiceStatus>,
}

pub struct MetricsCollector {
    system: Mutex<System>,
    ring: Mutex<VecDeque<MetricsSample>>,
    started: Instant,
    pid: Pid,
    health: Arc<HealthChecker>,
    store: Arc<dyn MemoryStore>,
    kv_mirror: Option<redis::aio::ConnectionManager>,
    sample_interval: std::time::Duration,
}

impl MetricsCollector {
    pub fn new(
        health: Arc<HealthChecker>,
        store: Arc<dyn MemoryStore>,
        kv_mirror: Option<redis::aio::ConnectionManager>,
        sample_interval: std::time::Duration,
    ) -> Self {
        Self {
            system: Mutex::new(System::new()),
            ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
            started: Instant::now(),
            pid: Pid::from_u32(std::process::id()),
            health,
            store,
            kv_mirror,
            sample_interval,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn cpu_and_rss(&self) -> (f32, u64) {
        let mut system = self.system.lock().unwrap();
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        match system.process(self.pid) {
            Some(p) => (p.cpu_usage(), p.memory()),
            None => (0.0, 0),
        }
    }

    /// Takes one sample, pushes it into the ring, and mirrors it to the KV
    /// sorted set when wired.
    pub async fn sample(&self) -> MetricsSample {
        let (cpu_percent, rss_bytes) = self.cpu_and_rss();
        let total_memories = self.store.count().await.unwrap_or(0);
        let services = self.health.check_all().await;

        let sample = MetricsSample {
            timestamp: crate::memory::now_epoch_secs(),
            cpu_percent,
            rss_bytes,
            uptime_seconds: self.uptime_seconds(),
            total_memories,
            services,
        };

        {
            let mut ring = self.ring.lock().unwrap();
            if ring.len() == RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(sample.clone());
        }

        if let Some(conn) = &self.kv_mirror {
            if let Ok(body) = serde_json::to_string(&sample) {
                let mut conn = conn.clone();
                let ts = sample.timestamp;
                let result: Result<(), redis::RedisError> = async {
                    let _: () = redis::cmd("ZADD")
                        .arg(KV_MIRROR_KEY)
                        .arg(ts)
                        .arg(&body)
                        .query_async(&mut conn)
                        .await?;
                    redis::cmd("ZREMRANGEBYRANK")
                        .arg(KV_MIRROR_KEY)
                        .arg(0)
                        .arg(-(KV_MIRROR_CAP as i64 + 1))
                        .query_async(&mut conn)
                        .await
                }
                .await;
                if let Err(e) = result {
                    tracing::debug!(error = %e, "metrics mirror write failed");
                }
            }
        }

        sample
    }

    /// Snapshot of the newest sample and ring length for the API.
    pub fn latest(&self) -> Option<MetricsSample> {
        self.ring.lock().unwrap().back().cloned()
    }

    pub fn ring_len(&self) -> usize {
        self.ring.lock().unwrap().len()
    }

    /// Sampling loop; exits when `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.sample_interval.as_secs(),
            "metrics collector started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.sample_interval) => {
                    let _ = self.sample().await;
                }
            }
        }
        tracing::info!("metrics collector stopped");
    }
}
