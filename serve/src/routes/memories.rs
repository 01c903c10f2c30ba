//! `/memories` surface: list, search, get, delete. Embeddings never leave
//! the store through this API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use archive::memory::MemoryEntry;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct MemoriesResponse {
    pub memories: Vec<serde_json::Value>,
    pub total: usize,
}

fn view(id: &str, entry: &MemoryEntry, similarity: Option<f64>) -> serde_json::Value {
    let mut v = json!({
        "id": id,
        "message": entry.message,
        "perplexity": entry.perplexity,
        "surprise_score": entry.surprise_score,
        "timestamp": entry.timestamp,
        "session_id": entry.session_id,
        "metadata": entry.metadata,
    });
    if let Some(s) = similarity {
        v["similarity"] = json!(s);
    }
    v
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<MemoriesResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0);
    let entries = state.store.list(limit, offset).await?;
    let total = state.store.count().await?;
    Ok(Json(MemoriesResponse {
        memories: entries
            .iter()
            .map(|(id, e)| view(id, e, None))
            .collect(),
        total,
    }))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<MemoriesResponse>, ApiError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::validation(
            "query must not be empty; send {\"query\": \"...\"}",
        ));
    }
    let top_k = req.top_k.unwrap_or(5).clamp(1, 50);
    let hits = state
        .store
        .search(query, top_k, req.session_id.as_deref())
        .await?;
    let total = hits.len();
    Ok(Json(MemoriesResponse {
        memories: hits
            .iter()
            .map(|h| view(&h.id, &h.entry, Some(h.similarity)))
            .collect(),
        total,
    }))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entry = state.store.get(&id).await?;
    Ok(Json(view(&id, &entry, None)))
}

pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete(&id).await?;
    Ok(Json(json!({ "status": "deleted", "id": id })))
}
