//! Axum app: shared state and the route table.

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use serde_json::json;
use tower::ServiceBuilder;

use archive::health::HealthChecker;
use archive::library::LibraryClient;
use archive::llm::Engines;
use archive::memory::{Embedder, MemoryStore};
use archive::metrics::MetricsCollector;
use archive::persona::PersonaStore;
use archive::sandbox::SandboxClient;
use archive::settings::Settings;
use archive::stream::InputStream;
use archive::worker::WorkerStats;

use crate::routes;

/// Everything the handlers share. One instance per process, built at startup
/// from immutable settings; the stores and clients are the process-global
/// handles the design calls for.
pub struct AppState {
    pub settings: Settings,
    pub engines: Engines,
    pub store: Arc<dyn MemoryStore>,
    pub stream: Arc<dyn InputStream>,
    pub embedder: Arc<dyn Embedder>,
    pub sandbox: Option<Arc<SandboxClient>>,
    pub library: Option<Arc<LibraryClient>>,
    pub personas: PersonaStore,
    pub worker_stats: Arc<WorkerStats>,
    pub metrics: Arc<MetricsCollector>,
    pub health: Arc<HealthChecker>,
}

/// Whole-request deadline; per-call budgets (LLM, tool, sandbox) are tighter
/// and fire first in normal operation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "detail": "request exceeded the 120s deadline; retry with a smaller task or check engine health"
            })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": format!("middleware failure: {err}") })),
        )
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(routes::chat::chat))
        .route("/verify", post(routes::verify::verify))
        .route("/agent", post(routes::agent::agent_basic))
        .route("/agent/advanced", post(routes::agent::agent_advanced))
        .route("/agent/recursive", post(routes::agent::agent_recursive))
        .route("/research", post(routes::research::research))
        .route("/research/multi", post(routes::research::research_multi))
        .route("/code_assist", post(routes::code_assist::code_assist))
        .route("/memories", get(routes::memories::list))
        .route("/memories/search", post(routes::memories::search))
        .route(
            "/memories/:id",
            get(routes::memories::get_one).delete(routes::memories::delete_one),
        )
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics))
        .route(
            "/admin/archive_old_memories",
            post(routes::admin::archive_old_memories),
        )
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(REQUEST_TIMEOUT),
        )
        .with_state(state)
}
