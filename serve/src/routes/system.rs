//! `/health` and `/metrics`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use archive::health::aggregate;

use crate::app::AppState;
use crate::error::ApiError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let services = state.health.check_all().await;
    let overall = aggregate(&services);
    Ok(Json(json!({
        "status": overall.as_str(),
        "services": services,
        "async_memory": state.worker_stats.snapshot(),
    })))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    // Serve the freshest ring sample; take one on demand when the sampler
    // has not run yet (e.g. right after boot).
    let sample = match state.metrics.latest() {
        Some(s) => s,
        None => state.metrics.sample().await,
    };

    Ok(Json(json!({
        "uptime_seconds": state.metrics.uptime_seconds(),
        "system": {
            "cpu_percent": sample.cpu_percent,
            "rss_bytes": sample.rss_bytes,
        },
        "memory_stats": {
            "total_memories": sample.total_memories,
            "worker": state.worker_stats.snapshot(),
        },
        "services": sample.services,
        "version": VERSION,
    })))
}
