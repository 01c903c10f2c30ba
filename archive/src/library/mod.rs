//! Client for the librarian's chunk search (peer service or sibling process).
//!
//! The librarian ingests documents out of core; the orchestrator only
//! consumes its `/library/search` and `/library/stats` surface. A missing
//! librarian degrades research to memory-only.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library unavailable: {0}")]
    Unavailable(String),
}

/// One indexed document chunk.
#[derive(Clone, Debug, Deserialize)]
pub struct LibraryChunk {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    chunks: Vec<LibraryChunk>,
}

pub struct LibraryClient {
    client: reqwest::Client,
    base_url: String,
}

impl LibraryClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<LibraryChunk>, LibraryError> {
        let resp = self
            .client
            .post(format!("{}/library/search", self.base_url))
            .timeout(Duration::from_secs(10))
            .json(&json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|e| LibraryError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LibraryError::Unavailable(format!(
                "library returned {status}"
            )));
        }
        let reply: SearchReply = resp
            .json()
            .await
            .map_err(|e| LibraryError::Unavailable(format!("library response: {e}")))?;
        Ok(reply.chunks)
    }

    pub async fn stats(&self) -> Result<serde_json::Value, LibraryError> {
        let resp = self
            .client
            .get(format!("{}/library/stats", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| LibraryError::Unavailable(e.to_string()))?;
        resp.json()
            .await
            .map_err(|e| LibraryError::Unavailable(format!("library response: {e}")))
    }
}
