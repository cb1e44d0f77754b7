//! Token estimation
//!
//! The ledger never tokenizes for real. It asks a [`TokenEstimator`] for a
//! number, so a model-specific tokenizer can replace the default heuristic
//! without touching ledger code.

/// Characters per token blended across English, code and Spanish text
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Estimates how many tokens a piece of text costs
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Fixed characters-per-token ratio.
///
/// An approximation, not a guarantee: real tokenizers can differ by a wide
/// margin on unusual text. Empty text costs nothing; any other text costs
/// at least one token.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: f64,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        ((chars / self.chars_per_token) as usize).max(1)
    }
}
