//! `/chat`: intent routing, persona injection, stream capture.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use archive::llm::{ChatMessage, ChatOptions};
use archive::router::{route, Intent, HELP_RESPONSE};
use archive::stream::{append_detached, StreamEntry};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub engine: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::validation(
            "message must not be empty; send {\"message\": \"...\"}",
        ));
    }
    let session_id = req.session_id.unwrap_or_else(|| "default".to_string());

    // Capture the turn for the memory worker without delaying the reply.
    append_detached(
        Arc::clone(&state.stream),
        StreamEntry::new(message.clone(), session_id.clone()),
    );

    let (response, engine) = match route(&message) {
        Intent::Help => (HELP_RESPONSE.to_string(), "router".to_string()),
        Intent::SearchMemory { query } => {
            let hits = state.store.search(&query, 3, None).await?;
            let text = if hits.is_empty() {
                format!("I don't have any memories about \"{query}\" yet.")
            } else {
                let lines: Vec<String> = hits
                    .iter()
                    .map(|h| format!("- {}", h.entry.message))
                    .collect();
                format!("Here is what I remember about \"{query}\":\n{}", lines.join("\n"))
            };
            (text, "memory".to_string())
        }
        Intent::Chat => {
            let (llm, engine) = state.engines.reasoning();
            let mut messages = Vec::with_capacity(2);
            // Persona read fresh per call so UI edits apply immediately.
            if let Some(persona) = state.personas.active() {
                messages.push(ChatMessage::system(persona.system_content()));
            }
            messages.push(ChatMessage::user(&message));
            let out = llm
                .chat(
                    &messages,
                    &ChatOptions {
                        max_tokens: Some(state.settings.max_tokens),
                        ..ChatOptions::default()
                    },
                )
                .await?;
            (out.text, engine.as_str().to_string())
        }
    };

    Ok(Json(ChatResponse { response, engine }))
}
