//! `/research` and `/research/multi`: retrieval + cited synthesis.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use archive::agent::{MultiResearchReport, ResearchAgent, ResearchReport};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub question: String,
    /// Optional source filter: any of "memory", "library". Default both.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Deserialize)]
pub struct MultiResearchRequest {
    #[serde(default)]
    pub questions: Vec<String>,
}

fn build_agent(state: &AppState, sources: Option<&Vec<String>>) -> ResearchAgent {
    let use_library = sources.map_or(true, |s| s.iter().any(|x| x == "library"));
    let library = if use_library {
        state.library.clone()
    } else {
        None
    };
    let (llm, _) = state.engines.reasoning();
    ResearchAgent::new(llm, Arc::clone(&state.store), library)
}

pub async fn research(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResearchRequest>,
) -> Result<Json<ResearchReport>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::validation(
            "question must not be empty; send {\"question\": \"...\"}",
        ));
    }
    let agent = build_agent(&state, req.sources.as_ref());
    let report = agent.run(req.question.trim(), req.top_k).await?;
    Ok(Json(report))
}

pub async fn research_multi(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MultiResearchRequest>,
) -> Result<Json<MultiResearchReport>, ApiError> {
    let questions: Vec<String> = req
        .questions
        .iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if questions.is_empty() {
        return Err(ApiError::validation(
            "questions must contain at least one non-empty question",
        ));
    }
    if questions.len() > 10 {
        return Err(ApiError::validation("at most 10 questions per request"));
    }
    let agent = build_agent(&state, None);
    let report = agent.run_multi(&questions).await?;
    Ok(Json(report))
}
