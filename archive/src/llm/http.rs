//! OpenAI-compatible HTTP client for one inference engine.
//!
//! POSTs to `{base}/v1/chat/completions` and `{base}/v1/completions` with the
//! engine's served model name. One shared [`reqwest::Client`] (connection
//! pool) is injected; per-call timeout and a bounded retry with exponential
//! backoff + jitter apply to idempotent calls only (every call this
//! orchestrator makes is side-effect free).

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use super::{
    ChatMessage, ChatOptions, ChatOutput, CompleteOptions, CompleteOutput, LlmClient, LlmError,
    LlmUsage,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Client for one OpenAI-compatible engine (fast or deep).
pub struct HttpLlm {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    max_tokens: u32,
}

impl HttpLlm {
    /// `base_url` without a trailing slash, e.g. `http://localhost:8001`;
    /// `model` must match the engine's served model name.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default completion budget applied when a call does not set `max_tokens`.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path`, retrying transport errors and 429/5xx with
    /// exponential backoff from 500 ms plus jitter.
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = String::new();

        for attempt in 0..RETRY_ATTEMPTS {
            if attempt > 0 {
                let backoff = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
            }

            let sent = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(body)
                .send()
                .await;

            let resp = match sent {
                Ok(r) => r,
                Err(e) => {
                    last_err = format!("transport error: {e}");
                    tracing::warn!(url = %url, attempt, error = %e, "llm request failed");
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                return resp
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| LlmError::InvalidResponse(e.to_string()));
            }

            let text = resp.text().await.unwrap_or_default();
            if is_resource_exhausted(&text) {
                return Err(LlmError::Resource(text));
            }
            last_err = format!("upstream status {status}: {text}");
            if !(status.is_server_error() || status.as_u16() == 429) {
                break; // 4xx other than 429 will not improve on retry
            }
            tracing::warn!(url = %url, attempt, %status, "llm returned retryable status");
        }

        Err(LlmError::Unavailable(last_err))
    }
}

/// Upstream messages that indicate VRAM/context exhaustion rather than an
/// outage; these surface verbatim as `LlmError::Resource`.
fn is_resource_exhausted(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("context length")
        || lower.contains("maximum context")
        || lower.contains("out of memory")
        || lower.contains("vram")
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for LlmUsage {
    fn from(u: WireUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlm {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &ChatOptions,
    ) -> Result<ChatOutput, LlmError> {
        let mut body = json!({
            "model": opts.model.as_deref().unwrap_or(&self.model),
            "messages": messages,
            "max_tokens": opts.max_tokens.unwrap_or(self.max_tokens),
            "stream": false,
        });
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(stop) = &opts.stop {
            body["stop"] = json!(stop);
        }

        let v = self.post_json("/v1/chat/completions", &body).await?;
        let text = v["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))?
            .to_string();
        let usage = serde_json::from_value::<WireUsage>(v["usage"].clone())
            .ok()
            .map(LlmUsage::from);
        Ok(ChatOutput { text, usage })
    }

    async fn complete(
        &self,
        prompt: &str,
        opts: &CompleteOptions,
    ) -> Result<CompleteOutput, LlmError> {
        let mut body = json!({
            "model": opts.model.as_deref().unwrap_or(&self.model),
            "prompt": prompt,
            "max_tokens": opts.max_tokens.unwrap_or(self.max_tokens),
        });
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(k) = opts.logprobs {
            body["logprobs"] = json!(k);
        }
        if opts.echo {
            body["echo"] = json!(true);
        }

        let v = self.post_json("/v1/completions", &body).await?;
        let choice = &v["choices"][0];
        let text = choice["text"].as_str().unwrap_or_default().to_string();
        let logprobs = choice["logprobs"]["token_logprobs"].as_array().map(|arr| {
            // First token of an echoed prompt has no conditional probability
            // and comes back as null; drop nulls rather than failing.
            arr.iter().filter_map(|x| x.as_f64()).collect::<Vec<f64>>()
        });
        Ok(CompleteOutput { text, logprobs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let llm = HttpLlm::new(reqwest::Client::new(), "http://localhost:8001/", "fast");
        assert_eq!(llm.base_url(), "http://localhost:8001");
    }

    #[test]
    fn resource_exhaustion_is_detected_case_insensitively() {
        assert!(is_resource_exhausted("CUDA out of memory"));
        assert!(is_resource_exhausted(
            "This model's maximum context length is 4096 tokens"
        ));
        assert!(is_resource_exhausted("insufficient VRAM for request"));
        assert!(!is_resource_exhausted("internal server error"));
    }
}
