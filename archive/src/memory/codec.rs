//! Embedding codec: raw little-endian f32 bytes for hash storage, hex for
//! cold-archive files.

use super::StoreError;

/// Serializes a vector as raw little-endian f32 bytes (the index's storage
/// format for the `embedding` field).
pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

/// Decodes little-endian f32 bytes back into a vector. Length must be a
/// multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Serialization(format!(
            "embedding byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Hex encoding of the raw bytes, used when embeddings are carried inside
/// cold-archive JSON.
pub fn embedding_to_hex(v: &[f32]) -> String {
    encode_embedding(v)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x * y) as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (x * x) as f64).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (x * x) as f64).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let v = vec![0.0_f32, -1.5, 3.25, f32::MIN_POSITIVE];
        let bytes = encode_embedding(&v);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_embedding(&bytes).unwrap(), v);
    }

    #[test]
    fn decode_rejects_truncated_bytes() {
        assert!(matches!(
            decode_embedding(&[1, 2, 3]),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn hex_is_two_chars_per_byte() {
        let hex = embedding_to_hex(&[1.0, 2.0]);
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3_f32, -0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
