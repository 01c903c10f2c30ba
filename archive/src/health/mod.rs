//! Bounded health probes of the orchestrator's collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::memory::MemoryStore;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    /// Optional collaborator absent or failing; the system still works.
    Degraded,
    Unhealthy,
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

/// Probes every collaborator with a bounded GET/PING.
pub struct HealthChecker {
    http: reqwest::Client,
    fast_engine_url: String,
    deep_engine_url: Option<String>,
    sandbox_url: Option<String>,
    store: Arc<dyn MemoryStore>,
}

impl HealthChecker {
    pub fn new(
        http: reqwest::Client,
        fast_engine_url: String,
        deep_engine_url: Option<String>,
        sandbox_url: Option<String>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            http,
            fast_engine_url,
            deep_engine_url,
            sandbox_url,
            store,
        }
    }

    async fn probe_http(&self, base: &str) -> bool {
        let url = format!("{}/health", base.trim_end_matches('/'));
        self.http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Status of every collaborator. Optional collaborators (deep engine,
    /// sandbox) degrade instead of failing when absent.
    pub async fn check_all(&self) -> BTreeMap<String, ServiceStatus> {
        let mut out = BTreeMap::new();

        out.insert(
            "fast_engine".to_string(),
            if self.probe_http(&self.fast_engine_url).await {
                ServiceStatus::Healthy
            } else {
                ServiceStatus::Unhealthy
            },
        );

        out.insert(
            "deep_engine".to_string(),
            match &self.deep_engine_url {
                None => ServiceStatus::Degraded,
                Some(url) if self.probe_http(url).await => ServiceStatus::Healthy,
                Some(_) => ServiceStatus::Degraded,
            },
        );

        out.insert(
            "kv_store".to_string(),
            if self.store.ping().await {
                ServiceStatus::Healthy
            } else {
                ServiceStatus::Unhealthy
            },
        );

        out.insert(
            "sandbox".to_string(),
            match &self.sandbox_url {
                None => ServiceStatus::Unknown,
                Some(url) if self.probe_http(url).await => ServiceStatus::Healthy,
                Some(_) => ServiceStatus::Unhealthy,
            },
        );

        out
    }
}

/// Aggregate for the `/health` endpoint: `healthy` only when every required
/// collaborator is healthy; `degraded` while optional ones are; otherwise
/// `unhealthy`.
pub fn aggregate(services: &BTreeMap<String, ServiceStatus>) -> ServiceStatus {
    let mut worst = ServiceStatus::Healthy;
    for (name, status) in services {
        match status {
            ServiceStatus::Healthy => {}
            ServiceStatus::Degraded | ServiceStatus::Unknown => {
                if worst == ServiceStatus::Healthy {
                    worst = ServiceStatus::Degraded;
                }
            }
            ServiceStatus::Unhealthy => {
                // Required collaborators take the whole system down; the
                // sandbox only degrades agent features.
                if name == "sandbox" {
                    if worst == ServiceStatus::Healthy {
                        worst = ServiceStatus::Degraded;
                    }
                } else {
                    return ServiceStatus::Unhealthy;
                }
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, ServiceStatus)]) -> BTreeMap<String, ServiceStatus> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn all_healthy_aggregates_healthy() {
        let t = table(&[
            ("fast_engine", ServiceStatus::Healthy),
            ("deep_engine", ServiceStatus::Healthy),
            ("kv_store", ServiceStatus::Healthy),
            ("sandbox", ServiceStatus::Healthy),
        ]);
        assert_eq!(aggregate(&t), ServiceStatus::Healthy);
    }

    #[test]
    fn missing_deep_engine_degrades_only() {
        let t = table(&[
            ("fast_engine", ServiceStatus::Healthy),
            ("deep_engine", ServiceStatus::Degraded),
            ("kv_store", ServiceStatus::Healthy),
            ("sandbox", ServiceStatus::Healthy),
        ]);
        assert_eq!(aggregate(&t), ServiceStatus::Degraded);
    }

    #[test]
    fn dead_fast_engine_is_unhealthy() {
        let t = table(&[
            ("fast_engine", ServiceStatus::Unhealthy),
            ("deep_engine", ServiceStatus::Healthy),
            ("kv_store", ServiceStatus::Healthy),
            ("sandbox", ServiceStatus::Healthy),
        ]);
        assert_eq!(aggregate(&t), ServiceStatus::Unhealthy);
    }

    #[test]
    fn dead_sandbox_only_degrades() {
        let t = table(&[
            ("fast_engine", ServiceStatus::Healthy),
            ("deep_engine", ServiceStatus::Healthy),
            ("kv_store", ServiceStatus::Healthy),
            ("sandbox", ServiceStatus::Unhealthy),
        ]);
        assert_eq!(aggregate(&t), ServiceStatus::Degraded);
    }
}
