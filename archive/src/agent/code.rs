//! Code agent: generate, test in the sandbox, repair with the error in the
//! prompt, bounded by an attempt budget.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::prompts::CODE_GENERATION;
use super::react::AgentError;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::sandbox::SandboxClient;
use crate::tools::validate::validate_code;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, Serialize)]
pub struct CodeAssist {
    pub code: String,
    pub explanation: String,
    pub test_output: String,
    pub success: bool,
    pub attempts: u32,
}

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:python|py)?\s*\n(.*?)```").unwrap());

/// Splits a model reply into (explanation, code). The first fenced block is
/// the code; everything outside it is the explanation. A reply without a
/// fence is treated as bare code.
fn split_reply(reply: &str) -> (String, String) {
    match CODE_BLOCK_RE.captures(reply) {
        Some(cap) => {
            let code = cap[1].trim().to_string();
            let Some(whole) = cap.get(0) else {
                return (String::new(), code);
            };
            let mut explanation = String::new();
            explanation.push_str(reply[..whole.start()].trim());
            let after = reply[whole.end()..].trim();
            if !after.is_empty() {
                if !explanation.is_empty() {
                    explanation.push('\n');
                }
                explanation.push_str(after);
            }
            (explanation, code)
        }
        None => (String::new(), reply.trim().to_string()),
    }
}

pub struct CodeAgent {
    llm: Arc<dyn LlmClient>,
    sandbox: Arc<SandboxClient>,
    max_attempts: u32,
}

impl CodeAgent {
    pub fn new(llm: Arc<dyn LlmClient>, sandbox: Arc<SandboxClient>) -> Self {
        Self {
            llm,
            sandbox,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.clamp(1, 10);
        self
    }

    pub async fn run(&self, task: &str) -> Result<CodeAssist, AgentError> {
        let mut last_error = String::new();
        let mut last = CodeAssist {
            code: String::new(),
            explanation: String::new(),
            test_output: String::new(),
            success: false,
            attempts: 0,
        };

        for attempt in 1..=self.max_attempts {
            let user = if last_error.is_empty() {
                format!("Task: {task}")
            } else {
                format!(
                    "Task: {task}\n\nYour previous attempt failed with:\n{last_error}\n\nFix the code and reply in the same format."
                )
            };
            let messages = [ChatMessage::system(CODE_GENERATION), ChatMessage::user(user)];
            let reply = self
                .llm
                .chat(&messages, &ChatOptions::with_temperature(0.2))
                .await?
                .text;

            let (explanation, code) = split_reply(&reply);
            last.attempts = attempt;
            last.explanation = explanation;
            last.code = code.clone();

            // Validation failures repair like runtime failures: back into the prompt.
            if let Err(e) = validate_code(&code) {
                tracing::debug!(attempt, error = %e, "generated code failed validation");
                last.test_output = e.clone();
                last_error = e;
                continue;
            }

            match self.sandbox.execute(&code, None).await {
                Ok(outcome) if outcome.is_success() => {
                    last.test_output = outcome.output().to_string();
                    last.success = true;
                    return Ok(last);
                }
                Ok(outcome) => {
                    last.test_output = outcome.output().to_string();
                    last_error = outcome.output().to_string();
                }
                Err(e) => {
                    // Sandbox outage is not something regeneration can fix.
                    last.test_output = format!("Error: {e}");
                    return Ok(last);
                }
            }
        }

        Ok(last)
    }
}
