//! Embedder over an OpenAI-compatible `/v1/embeddings` endpoint.
//!
//! The local sentence-embedding model is served next to the fast engine;
//! dimension is fixed per deployment (`EMBED_DIM`) and validated on every
//! response.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Embedder, StoreError};

pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct WireEmbeddings {
    data: Vec<WireEmbedding>,
}

#[derive(Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({ "model": self.model, "input": texts });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Embedding(format!("embeddings request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Embedding(format!(
                "embeddings endpoint returned {status}: {text}"
            )));
        }

        let wire: WireEmbeddings = resp
            .json()
            .await
            .map_err(|e| StoreError::Embedding(format!("embeddings response: {e}")))?;

        let vectors: Vec<Vec<f32>> = wire.data.into_iter().map(|d| d.embedding).collect();
        if vectors.len() != texts.len() {
            return Err(StoreError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for v in &vectors {
            if v.len() != self.dimension {
                return Err(StoreError::Embedding(format!(
                    "embedding dimension {} != configured {}",
                    v.len(),
                    self.dimension
                )));
            }
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
