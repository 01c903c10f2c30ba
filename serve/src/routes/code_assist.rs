//! `/code_assist`: generate, sandbox-test, and repair Python for a task.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use archive::agent::{CodeAgent, CodeAssist};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CodeAssistRequest {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Overall wall-clock budget in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

pub async fn code_assist(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CodeAssistRequest>,
) -> Result<Json<CodeAssist>, ApiError> {
    let task = req.task.trim();
    if task.is_empty() {
        return Err(ApiError::validation(
            "task must not be empty; send {\"task\": \"...\"}",
        ));
    }
    let Some(sandbox) = state.sandbox.clone() else {
        return Err(ApiError::unavailable(
            "code assist needs the sandbox; set SANDBOX_URL and start the sandbox container",
        ));
    };

    let (llm, _) = state.engines.reasoning();
    let mut agent = CodeAgent::new(llm, sandbox);
    if let Some(attempts) = req.max_attempts {
        agent = agent.with_max_attempts(attempts);
    }

    let budget = Duration::from_secs(req.timeout.unwrap_or(120).clamp(5, 600));
    match tokio::time::timeout(budget, agent.run(task)).await {
        Ok(result) => Ok(Json(result?)),
        Err(_) => Err(ApiError::unavailable(format!(
            "code assist exceeded its {}s budget; raise `timeout` or simplify the task",
            budget.as_secs()
        ))),
    }
}
