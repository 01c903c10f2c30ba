//! Embedder seam: stores are agnostic to how vectors are produced.

use async_trait::async_trait;

use super::StoreError;

/// Produces fixed-size float vectors from text. Injected into every
/// [`MemoryStore`](super::MemoryStore) backend so the store never knows which
/// model (or hash) is behind it.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text into a vector of [`Embedder::dimension`] floats,
    /// one per input, in order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError>;

    /// Convenience for a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let mut vs = self.embed(&[text]).await?;
        vs.pop()
            .ok_or_else(|| StoreError::Embedding("embedder returned no vector".to_string()))
    }

    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashing embedder.
///
/// Tokenizes on non-alphanumeric boundaries, hashes each lowercased token
/// (with positional bigrams for a little word-order signal) into a fixed-size
/// bucket vector, then L2-normalizes. Identical text always produces an
/// identical unit vector, which makes vector round-trip tests exact; unrelated
/// text lands far away. Default embedder for tests and offline deployments;
/// production wires [`HttpEmbedder`](super::HttpEmbedder) instead.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        // FNV-1a; stable across platforms, unlike DefaultHasher.
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in token.bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        let idx = (hash % self.dimension as u64) as usize;
        // Sign bit from the hash spreads mass over both directions.
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.dimension];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        for (i, tok) in tokens.iter().enumerate() {
            let (idx, sign) = self.bucket(tok);
            v[idx] += sign;
            if let Some(next) = tokens.get(i + 1) {
                let (idx, sign) = self.bucket(&format!("{tok} {next}"));
                v[idx] += 0.5 * sign;
            }
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::codec::cosine_similarity;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let e = HashEmbedder::new(64);
        let a = e.embed_one("the quick brown fox").await.unwrap();
        let b = e.embed_one("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn vectors_are_unit_norm() {
        let e = HashEmbedder::new(128);
        let v = e.embed_one("hello world").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn related_text_is_closer_than_unrelated() {
        let e = HashEmbedder::new(384);
        let a = e.embed_one("I like drinking coffee in the morning").await.unwrap();
        let b = e.embed_one("drinking coffee every morning").await.unwrap();
        let c = e.embed_one("quantum flibbertigibbet zamboni").await.unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let e = HashEmbedder::new(16);
        let v = e.embed_one("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
