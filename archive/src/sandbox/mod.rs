//! Client for the code-execution sandbox collaborator.
//!
//! `POST {base}/execute` with the code and an optional injected variable map;
//! the sandbox answers `{status: "success"|"error", result?, error?}`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

/// Sandbox verdict on one execution.
#[derive(Clone, Debug, Deserialize)]
pub struct ExecOutcome {
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Result text on success, error text otherwise.
    pub fn output(&self) -> &str {
        if self.is_success() {
            self.result.as_deref().unwrap_or("")
        } else {
            self.error.as_deref().unwrap_or("unknown sandbox error")
        }
    }
}

pub struct SandboxClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SandboxClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executes `code` with `context` injected into the sandbox namespace.
    pub async fn execute(
        &self,
        code: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<ExecOutcome, SandboxError> {
        let mut body = json!({ "code": code });
        if let Some(ctx) = context {
            body["context"] = ctx.clone();
        }
        let resp = self
            .client
            .post(format!("{}/execute", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SandboxError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SandboxError::Unavailable(format!(
                "sandbox returned {status}: {text}"
            )));
        }
        resp.json::<ExecOutcome>()
            .await
            .map_err(|e| SandboxError::Unavailable(format!("sandbox response: {e}")))
    }

    /// Bounded liveness probe.
    pub async fn healthy(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_output_prefers_result_on_success() {
        let ok = ExecOutcome {
            status: "success".into(),
            result: Some("42\n".into()),
            error: None,
        };
        assert!(ok.is_success());
        assert_eq!(ok.output(), "42\n");

        let err = ExecOutcome {
            status: "error".into(),
            result: None,
            error: Some("NameError: x".into()),
        };
        assert!(!err.is_success());
        assert_eq!(err.output(), "NameError: x");
    }
}
