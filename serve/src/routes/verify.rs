//! `/verify`: chain-of-verification over the reasoning engine.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use archive::stream::{append_detached, StreamEntry};
use archive::verify::{VerificationChain, VerificationQa};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub initial_response: String,
    pub verification_questions: Vec<String>,
    pub verification_qa: Vec<VerificationQa>,
    pub final_response: String,
    pub revised: bool,
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::validation(
            "message must not be empty; send {\"message\": \"...\"}",
        ));
    }

    append_detached(
        Arc::clone(&state.stream),
        StreamEntry::new(message.clone(), "default"),
    );

    let (llm, _) = state.engines.reasoning();
    let trace = VerificationChain::new(llm).run(&message).await;
    if trace.initial.is_empty() {
        return Err(ApiError::unavailable(
            "verification draft failed: the LLM engine did not answer. Check the engine container and retry.",
        ));
    }

    Ok(Json(VerifyResponse {
        initial_response: trace.initial,
        verification_questions: trace.questions,
        verification_qa: trace.qa,
        final_response: trace.final_answer,
        revised: trace.revised,
    }))
}
