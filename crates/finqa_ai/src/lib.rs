pub mod answer;
pub mod corpus;
pub mod embeddings;
pub mod guardrails;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod pipeline;
pub mod plan;
pub mod retrieve;
pub mod verify;

pub use pipeline::{answer_question, QaContext, QaResponse, ABSTAIN_MESSAGE};
