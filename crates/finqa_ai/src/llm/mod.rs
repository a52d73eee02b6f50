use finqa_core::error::AppError;

/// Single blocking completion call, used identically for drafting answers
/// and judging faithfulness. No retries beyond what the transport provides.
pub trait Llm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;
}

pub mod ollama_llm;
