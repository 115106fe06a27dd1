//! Character-based token estimation
//!
//! Counts here are an approximation of real tokenizer output, not a substitute
//! for it. The budget constants elsewhere (safety buffer, per-memory cost) are
//! tuned against this heuristic, so it stays a heuristic.

use serde::{Deserialize, Serialize};

/// Average characters per token across the supported model families
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Estimates token counts from character length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(CHARS_PER_TOKEN)
    }
}

impl TokenEstimator {
    /// Non-positive or non-finite ratios fall back to [`CHARS_PER_TOKEN`]
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// `ceil(chars / chars_per_token)`, counting Unicode scalar values
    pub fn text_tokens(&self, text: &str) -> usize {
        let chars = text.chars().count();
        (chars as f64 / self.chars_per_token).ceil() as usize
    }

    /// Estimated cost of one message including its framing overhead
    pub fn message_tokens(&self, content: &str, per_message_overhead: usize) -> usize {
        self.text_tokens(content) + per_message_overhead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_up() {
        let estimator = TokenEstimator::default();
        assert_eq!(estimator.text_tokens(""), 0);
        assert_eq!(estimator.text_tokens("a"), 1);
        assert_eq!(estimator.text_tokens("abcdefg"), 2);
        assert_eq!(estimator.text_tokens("abcdefgh"), 3);
    }

    #[test]
    fn test_message_overhead() {
        let estimator = TokenEstimator::default();
        let content = "x".repeat(4000);
        // 4000 / 3.5 = 1142.86 -> 1143, plus 4 overhead
        assert_eq!(estimator.message_tokens(&content, 4), 1147);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let estimator = TokenEstimator::new(1.0);
        assert_eq!(estimator.text_tokens("héllo"), 5);
    }

    #[test]
    fn test_invalid_ratio_uses_default() {
        assert_eq!(TokenEstimator::new(0.0).chars_per_token(), CHARS_PER_TOKEN);
        assert_eq!(TokenEstimator::new(f64::NAN).chars_per_token(), CHARS_PER_TOKEN);
    }
}
