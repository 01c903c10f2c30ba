//! Admin surface: on-demand archival sweep.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use archive::archival::ArchivalWorker;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn archive_old_memories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let worker = ArchivalWorker::new(
        Arc::clone(&state.store),
        &state.settings.data_dir,
        state.settings.archive_policy(),
    );
    let archived_count = worker.run_once().await?;
    Ok(Json(json!({ "archived_count": archived_count })))
}
