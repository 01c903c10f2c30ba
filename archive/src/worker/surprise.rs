//! Surprise scoring: perplexity from logprobs, normalization, and the
//! weighted blend with vector novelty.

/// Knobs for the surprise gate. The weights are initial estimates and come
/// from configuration, never from constants baked into call sites.
#[derive(Clone, Copy, Debug)]
pub struct SurpriseConfig {
    /// Weight of normalized perplexity; novelty gets `1 - alpha`.
    pub alpha: f64,
    /// Entries scoring at or above this are stored.
    pub threshold: f64,
    /// Divisor of `ln(perplexity + 1)` in normalization.
    pub norm_divisor: f64,
}

impl Default for SurpriseConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            threshold: 0.7,
            norm_divisor: 5.0,
        }
    }
}

/// `exp(-mean(logprobs))`. Empty input means the engine saw no tokens; treat
/// as perplexity 1 (no information either way).
pub fn perplexity(logprobs: &[f64]) -> f64 {
    if logprobs.is_empty() {
        return 1.0;
    }
    let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
    (-mean).exp()
}

/// `min(1, ln(p + 1) / divisor)`, clamped into [0, 1].
pub fn normalize_perplexity(p: f64, divisor: f64) -> f64 {
    ((p.max(0.0) + 1.0).ln() / divisor).clamp(0.0, 1.0)
}

/// `alpha * p_hat + (1 - alpha) * novelty`.
pub fn surprise_score(p_hat: f64, novelty: f64, alpha: f64) -> f64 {
    alpha * p_hat + (1.0 - alpha) * novelty
}
