use finqa_core::error::AppError;
use serde::Deserialize;

use crate::corpus::CorpusStore;
use crate::llm::Llm;
use crate::retrieve::fusion::ScoredCandidate;
use crate::verify::{extract_json_object, extract_named_number};

/// Pointwise relevance model: scores one (question, passage) pair in [0, 1]
/// independently of the fusion score.
pub trait RelevanceScorer {
    fn score(&self, model: &str, question: &str, passage: &str) -> Result<f32, AppError>;
}

/// Rescore the head of the fused list with a relevance model.
///
/// Without a scorer or model this is a transparent pass-through, and any
/// scoring failure falls back to the fused order unchanged — reranking is
/// an upgrade, never a new failure mode. Candidates beyond `depth` keep
/// their fused positions behind the reranked head.
pub fn rerank_head(
    question: &str,
    candidates: Vec<ScoredCandidate>,
    corpus: &CorpusStore,
    scorer: Option<&dyn RelevanceScorer>,
    model: Option<&str>,
    depth: usize,
) -> Vec<ScoredCandidate> {
    let (scorer, model) = match (scorer, model) {
        (Some(s), Some(m)) => (s, m),
        _ => return candidates,
    };
    let head_len = depth.min(candidates.len());
    if head_len < 2 {
        return candidates;
    }

    let mut scored: Vec<(f32, ScoredCandidate)> = Vec::with_capacity(head_len);
    for cand in candidates[..head_len].iter() {
        let chunk = match corpus.get(&cand.chunk_id) {
            Ok(c) => c,
            Err(_) => return candidates,
        };
        match scorer.score(model, question, &chunk.text) {
            Ok(s) => scored.push((s, cand.clone())),
            Err(_) => return candidates,
        }
    }

    // Stable sort: equal relevance keeps the fused order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<ScoredCandidate> = scored.into_iter().map(|(_, c)| c).collect();
    out.extend(candidates.into_iter().skip(head_len));
    out
}

/// Relevance scoring via the chat model: ask for a strict JSON judgment and
/// parse it leniently, the same strategy the verifier uses.
pub struct LlmRelevanceScorer<'a> {
    llm: &'a dyn Llm,
}

impl<'a> LlmRelevanceScorer<'a> {
    pub fn new(llm: &'a dyn Llm) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Deserialize)]
struct RelevanceJudgment {
    relevant: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

fn relevance_prompt(question: &str, passage: &str) -> String {
    format!(
        r#"Judge whether the passage is relevant to the finance question.
Return ONLY a JSON object: {{"relevant": true|false, "confidence": 0.0-1.0}}

Question: {question}

Passage:
{passage}
"#
    )
}

impl RelevanceScorer for LlmRelevanceScorer<'_> {
    fn score(&self, model: &str, question: &str, passage: &str) -> Result<f32, AppError> {
        let raw = self.llm.generate(model, &relevance_prompt(question, passage))?;

        if let Some(value) = extract_json_object(&raw) {
            if let Ok(j) = serde_json::from_value::<RelevanceJudgment>(value) {
                let base = if j.relevant { 0.5 } else { 0.0 };
                return Ok((base + j.confidence.clamp(0.0, 1.0) * 0.5).clamp(0.0, 1.0));
            }
        }
        if let Some(c) = extract_named_number(&raw, "confidence") {
            return Ok((c as f32).clamp(0.0, 1.0));
        }
        Err(AppError::new(
            "RERANK_PARSE_FAILED",
            "Relevance judgment was unparsable",
        )
        .with_details(crate::verify::detail_snippet(&raw)))
    }
}
