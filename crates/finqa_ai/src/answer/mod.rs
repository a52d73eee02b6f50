use finqa_core::config::QaConfig;
use finqa_core::error::AppError;

use crate::corpus::store::truncate_quote;
use crate::corpus::Chunk;
use crate::guardrails::{extract_markers, MarkerSets};
use crate::llm::Llm;
use crate::plan::ExecutedQuery;

mod prompts;

/// Unverified draft from the generator: not returned to the user until it
/// passes guardrails and verification.
#[derive(Debug, Clone)]
pub struct AnswerDraft {
    pub markdown: String,
    pub markers: MarkerSets,
}

/// Render the selected evidence chunks the way the generator and judge see
/// them: marker line with metadata, then a bounded quote.
pub fn evidence_blocks(chunks: &[&Chunk], cfg: &QaConfig) -> String {
    let mut blocks = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        blocks.push(format!(
            "[[chunk:{}]] ticker={} form={} period={}\n{}",
            chunk.chunk_id,
            chunk.ticker,
            chunk.form,
            chunk.fiscal_period,
            truncate_quote(&chunk.text, cfg.quote_max_chars),
        ));
    }
    if blocks.is_empty() {
        "(none)".to_string()
    } else {
        blocks.join("\n\n---\n\n")
    }
}

/// Render executed queries for the prompt: the verbatim SQL plus its CSV
/// preview, with errored queries flagged so the model avoids them.
pub fn query_blocks(queries: &[ExecutedQuery]) -> String {
    let mut blocks = Vec::with_capacity(queries.len());
    for q in queries {
        let status = if q.errored { "error" } else { "ok" };
        blocks.push(format!(
            "[[query:{}]] status={}\nSQL:\n{}\nResult preview (CSV):\n{}",
            q.query_id, status, q.sql, q.preview_csv,
        ));
    }
    if blocks.is_empty() {
        "(none)".to_string()
    } else {
        blocks.join("\n\n---\n\n")
    }
}

/// One blocking model call producing a draft answer with inline markers.
///
/// `numeric_allowed` is false when planning failed or every query errored;
/// the prompt then forbids numeric claims outright.
pub fn generate_draft(
    llm: &dyn Llm,
    model: &str,
    question: &str,
    chunks: &[&Chunk],
    queries: &[ExecutedQuery],
    cfg: &QaConfig,
) -> Result<AnswerDraft, AppError> {
    if chunks.is_empty() && queries.iter().all(|q| q.errored) {
        return Err(AppError::new(
            "ANSWER_NO_EVIDENCE",
            "No evidence available to ground an answer",
        ));
    }

    let numeric_allowed = queries.iter().any(|q| q.is_healthy());
    let prompt = prompts::grounded_answer_prompt(
        question,
        &evidence_blocks(chunks, cfg),
        &query_blocks(queries),
        numeric_allowed,
    );

    let markdown = llm.generate(model, &prompt)?;
    let markers = extract_markers(&markdown);
    Ok(AnswerDraft { markdown, markers })
}
