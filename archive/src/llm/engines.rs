//! Fast/deep engine pair with single-engine degradation.
//!
//! The deep engine is optional at deploy time. When it is absent every chat
//! routes to the fast engine and `/health` reports the deployment as
//! degraded rather than broken.

use std::sync::Arc;

use super::LlmClient;

/// Which engine served a response; echoed in the `/chat` payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineName {
    Fast,
    Deep,
}

impl EngineName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineName::Fast => "fast",
            EngineName::Deep => "deep",
        }
    }
}

/// The orchestrator's engine pair. Fast is mandatory; deep is optional.
#[derive(Clone)]
pub struct Engines {
    fast: Arc<dyn LlmClient>,
    deep: Option<Arc<dyn LlmClient>>,
}

impl Engines {
    pub fn new(fast: Arc<dyn LlmClient>, deep: Option<Arc<dyn LlmClient>>) -> Self {
        Self { fast, deep }
    }

    /// Fast engine: intent-adjacent work and the memory worker's logprob calls.
    pub fn fast(&self) -> Arc<dyn LlmClient> {
        Arc::clone(&self.fast)
    }

    pub fn has_deep(&self) -> bool {
        self.deep.is_some()
    }

    /// Engine for conversational and reasoning calls: deep when deployed,
    /// otherwise fast.
    pub fn reasoning(&self) -> (Arc<dyn LlmClient>, EngineName) {
        match &self.deep {
            Some(d) => (Arc::clone(d), EngineName::Deep),
            None => (Arc::clone(&self.fast), EngineName::Fast),
        }
    }
}
