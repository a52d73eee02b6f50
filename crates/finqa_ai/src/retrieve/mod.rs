pub mod fusion;
pub mod rerank;
pub mod similarity;

pub use fusion::{fuse, ScoredCandidate};
pub use rerank::{rerank_head, LlmRelevanceScorer, RelevanceScorer};
