use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Pipeline configuration. Loading from files or the environment is the
/// caller's job; this crate only consumes the deserialized struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Embedding model identifier passed to the embedder.
    pub embed_model: String,
    /// Chat model used for both drafting and judging.
    pub chat_model: String,
    /// Reranker model identifier. `None` disables reranking entirely.
    pub rerank_model: Option<String>,
    /// Answers scoring below this are abstained. Comparison is strict:
    /// a score passes only when `score >= min_faithfulness`.
    pub min_faithfulness: f64,
    /// RRF smoothing constant K in `1 / (K + rank)`.
    pub rrf_k: f64,
    /// Additive fused-score boost for candidates matching the ticker hint.
    pub ticker_boost: f64,
    /// Candidates requested from the dense index before fusion.
    pub topk_dense: usize,
    /// Candidates requested from the lexical index before fusion.
    pub topk_lexical: usize,
    /// Evidence chunks kept after fusion and handed to the generator.
    pub final_k: usize,
    /// How deep into the fused list the reranker rescoring reaches.
    pub rerank_depth: usize,
    /// Per-chunk quote budget (chars) in prompts and text citations.
    pub quote_max_chars: usize,
    /// Row cap for query-result previews embedded in citations.
    pub preview_rows: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3.1".to_string(),
            rerank_model: None,
            min_faithfulness: 0.58,
            rrf_k: 60.0,
            ticker_boost: 0.05,
            topk_dense: 30,
            topk_lexical: 30,
            final_k: 10,
            rerank_depth: 12,
            quote_max_chars: 450,
            preview_rows: 50,
        }
    }
}

impl QaConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&self.min_faithfulness) {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "min_faithfulness must be within [0, 1]",
            )
            .with_details(format!("min_faithfulness={}", self.min_faithfulness)));
        }
        if self.rrf_k <= 0.0 {
            return Err(AppError::new("CONFIG_INVALID", "rrf_k must be positive")
                .with_details(format!("rrf_k={}", self.rrf_k)));
        }
        if self.ticker_boost < 0.0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "ticker_boost must not be negative",
            )
            .with_details(format!("ticker_boost={}", self.ticker_boost)));
        }
        if self.final_k == 0 {
            return Err(AppError::new("CONFIG_INVALID", "final_k must be at least 1"));
        }
        Ok(())
    }
}
