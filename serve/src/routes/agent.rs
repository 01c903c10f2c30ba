//! `/agent`, `/agent/advanced`, `/agent/recursive`: the ReAct loop over the
//! basic, advanced, and recursive tool registries.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use archive::agent::{AgentStep, ReactAgent};
use archive::agent::prompts::{ADVANCED_AGENT, BASIC_AGENT, RECURSIVE_AGENT};
use archive::stream::{append_detached, StreamEntry};
use archive::tools::{
    CodeExecutionTool, DateTimeTool, JsonTool, MemorySearchTool, RecursiveLmTool, ToolRegistry,
    WebSearchTool,
};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AgentRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// Recursive agent only.
    #[serde(default)]
    pub corpus: Option<String>,
}

#[derive(Serialize)]
pub struct AgentResponse {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    pub total_steps: usize,
    pub success: bool,
}

/// The advanced registry: basic tools plus memory search, datetime, JSON,
/// web-search placeholder, and (when a sandbox is deployed) code execution.
fn advanced_registry(state: &AppState) -> ToolRegistry {
    let mut registry = ToolRegistry::basic()
        .with(Arc::new(MemorySearchTool::new(Arc::clone(&state.store))))
        .with(Arc::new(DateTimeTool))
        .with(Arc::new(JsonTool))
        .with(Arc::new(WebSearchTool));
    if let Some(sandbox) = &state.sandbox {
        registry.register(Arc::new(CodeExecutionTool::new(Arc::clone(sandbox))));
    }
    registry
}

async fn run_agent(
    state: &AppState,
    req: &AgentRequest,
    registry: ToolRegistry,
    system_prompt: &str,
) -> Result<Json<AgentResponse>, ApiError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::validation(
            "question must not be empty; send {\"question\": \"...\"}",
        ));
    }

    append_detached(
        Arc::clone(&state.stream),
        StreamEntry::new(question, "default"),
    );

    let (llm, _) = state.engines.reasoning();
    let max_steps = req
        .max_steps
        .unwrap_or(state.settings.max_agent_steps)
        .min(state.settings.agent_hard_cap);
    let agent = ReactAgent::new(llm, registry, system_prompt)
        .with_max_steps(max_steps)
        .with_timeouts(state.settings.llm_timeout, state.settings.tool_timeout);

    let run = agent.run(question).await?;
    Ok(Json(AgentResponse {
        answer: run.answer,
        total_steps: run.steps.len(),
        steps: run.steps,
        success: run.success,
    }))
}

pub async fn agent_basic(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    run_agent(&state, &req, ToolRegistry::basic(), BASIC_AGENT).await
}

pub async fn agent_advanced(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let registry = advanced_registry(&state);
    run_agent(&state, &req, registry, ADVANCED_AGENT).await
}

pub async fn agent_recursive(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let Some(sandbox) = state.sandbox.clone() else {
        return Err(ApiError::unavailable(
            "the recursive agent needs the code sandbox; set SANDBOX_URL and start the sandbox container",
        ));
    };
    let corpus = req.corpus.clone().unwrap_or_default();
    if corpus.is_empty() {
        return Err(ApiError::validation(
            "corpus must not be empty; send {\"question\": \"...\", \"corpus\": \"...\"}",
        ));
    }

    let (llm, _) = state.engines.reasoning();
    let registry = advanced_registry(&state).with(Arc::new(RecursiveLmTool::new(
        llm,
        sandbox,
        corpus,
    )));
    run_agent(&state, &req, registry, RECURSIVE_AGENT).await
}
