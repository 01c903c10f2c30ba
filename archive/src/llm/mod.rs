//! LLM client abstraction over the fast and deep inference engines.
//!
//! Both engines expose the OpenAI-compatible HTTP surface
//! (`/v1/chat/completions`, `/v1/completions`); [`HttpLlm`] speaks that wire
//! format over a shared reqwest pool. [`MockLlm`] replays scripted responses
//! for tests. The memory worker uses [`LlmClient::logprobs`] (echo-mode
//! completion) to measure per-token log-probability of a message.

mod engines;
mod http;
mod mock;

pub use engines::{EngineName, Engines};
pub use http::HttpLlm;
pub use mock::MockLlm;

use async_trait::async_trait;
use thiserror::Error;

/// Error from an LLM call. `Unavailable` maps to HTTP 503 at the API surface;
/// `Resource` carries upstream VRAM/context-window failures verbatim.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Engine unreachable, timed out, or returned a non-success status.
    #[error("llm unavailable: {0}")]
    Unavailable(String),

    /// Upstream reported a resource limit (VRAM, context length). Surfaced verbatim.
    #[error("llm resource limit: {0}")]
    Resource(String),

    /// Response body did not match the OpenAI wire shape.
    #[error("invalid llm response: {0}")]
    InvalidResponse(String),
}

/// One chat message on the OpenAI wire: role + content.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Options for one chat call. `model: None` uses the engine's configured
/// served model name.
#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
}

impl ChatOptions {
    /// Options with just a sampling temperature; everything else engine-default.
    pub fn with_temperature(t: f32) -> Self {
        Self {
            temperature: Some(t),
            ..Self::default()
        }
    }
}

/// Options for one completion call. `echo` + `logprobs` together request
/// per-token log-probabilities of the prompt itself.
#[derive(Clone, Debug, Default)]
pub struct CompleteOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub logprobs: Option<u32>,
    pub echo: bool,
}

/// Token usage for one call, when the engine reports it.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a chat call: assistant text plus optional usage.
#[derive(Clone, Debug)]
pub struct ChatOutput {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

/// Result of a completion call: text plus optional per-token logprobs.
#[derive(Clone, Debug)]
pub struct CompleteOutput {
    pub text: String,
    pub logprobs: Option<Vec<f64>>,
}

/// Async client over one inference engine.
///
/// Implementations: [`HttpLlm`] (OpenAI-compatible HTTP) and [`MockLlm`]
/// (scripted, for tests). Shared as `Arc<dyn LlmClient>` between the API
/// handlers, the agents, and the memory worker.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat completion: messages in, assistant text out.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &ChatOptions,
    ) -> Result<ChatOutput, LlmError>;

    /// One text completion, optionally with top-k token logprobs.
    async fn complete(
        &self,
        prompt: &str,
        opts: &CompleteOptions,
    ) -> Result<CompleteOutput, LlmError>;

    /// Per-token log-probabilities of `text` under the model, via echo-mode
    /// completion (`echo=true, max_tokens=0, logprobs=1`). Memory worker only.
    async fn logprobs(&self, text: &str) -> Result<Vec<f64>, LlmError> {
        let opts = CompleteOptions {
            max_tokens: Some(0),
            logprobs: Some(1),
            echo: true,
            ..CompleteOptions::default()
        };
        let out = self.complete(text, &opts).await?;
        out.logprobs
            .ok_or_else(|| LlmError::InvalidResponse("engine returned no logprobs".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }

    #[tokio::test]
    async fn default_logprobs_uses_echo_completion() {
        let llm = MockLlm::new();
        llm.push_logprobs(vec![-0.5, -1.5]);
        let lp = llm.logprobs("two tokens").await.unwrap();
        assert_eq!(lp, vec![-0.5, -1.5]);
    }

    #[test]
    fn llm_error_display_includes_kind() {
        let e = LlmError::Unavailable("connection refused".to_string());
        assert!(e.to_string().contains("llm unavailable"));
        let e = LlmError::Resource("out of VRAM".to_string());
        assert!(e.to_string().contains("resource limit"));
    }
}
