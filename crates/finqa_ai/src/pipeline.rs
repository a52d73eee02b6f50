use std::collections::BTreeSet;

use finqa_core::config::QaConfig;
use finqa_core::error::AppError;
use finqa_core::store::SqlStore;
use serde::{Deserialize, Serialize};

use crate::answer::{evidence_blocks, generate_draft, query_blocks};
use crate::corpus::{Chunk, Citation, CorpusStore};
use crate::embeddings::Embedder;
use crate::guardrails::enforce_grounding;
use crate::index::{query_passage, DenseIndex, LexicalIndex};
use crate::llm::Llm;
use crate::plan::{plan_and_execute, ExecutedQuery, PlanOutcome};
use crate::retrieve::{fuse, rerank_head, RelevanceScorer};
use crate::verify::{verify_answer, Verdict};

/// Fixed message substituted for any draft that fails the trust gate.
pub const ABSTAIN_MESSAGE: &str = "Not enough evidence to answer faithfully.";

/// Everything a question needs, handed in explicitly: indexes built
/// elsewhere and treated as read-only here, the analytical store, and the
/// model seams. No ambient global state.
pub struct QaContext<'a> {
    pub corpus: &'a CorpusStore,
    pub dense: &'a DenseIndex,
    pub lexical: Option<&'a LexicalIndex>,
    pub store: Option<&'a SqlStore>,
    pub embedder: &'a dyn Embedder,
    pub llm: &'a dyn Llm,
    pub scorer: Option<&'a dyn RelevanceScorer>,
    pub cfg: &'a QaConfig,
}

/// Response contract to the caller: a complete cited answer with a passing
/// faithfulness score, or an explicit abstention. Never anything between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaResponse {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub faithfulness_score: f64,
    pub abstained: bool,
    pub verifier_notes: String,
}

fn abstained_response(score: f64, notes: impl Into<String>) -> QaResponse {
    QaResponse {
        answer_text: ABSTAIN_MESSAGE.to_string(),
        citations: Vec::new(),
        faithfulness_score: score,
        abstained: true,
        verifier_notes: notes.into(),
    }
}

/// Run one question through the full pipeline: retrieve from both indexes,
/// fuse, optionally rerank, plan and execute a structured query, draft a
/// cited answer, then verify it and decide whether to release.
///
/// Failures that amount to "less evidence" (an unbuilt index, an embedding
/// failure, a failed query, planning with no table) degrade the evidence
/// set instead of aborting; only transport-level failures return an error.
pub fn answer_question(
    ctx: &QaContext,
    question: &str,
    ticker_hint: Option<&str>,
) -> Result<QaResponse, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::new("QUESTION_INVALID", "Question must not be empty"));
    }
    ctx.cfg.validate()?;
    let hint = ticker_hint
        .map(str::trim)
        .filter(|h| !h.is_empty());

    // Text retrieval. The dense and lexical lookups are independent of each
    // other; fusion below is the join point.
    let dense_hits = match ctx
        .embedder
        .embed(&ctx.cfg.embed_model, &query_passage(question, hint))
    {
        Ok(qv) => match ctx.dense.search(ctx.corpus, &qv, ctx.cfg.topk_dense) {
            Ok(hits) => hits,
            Err(e) if e.is_code("RETRIEVAL_UNAVAILABLE") => Vec::new(),
            Err(e) => return Err(e),
        },
        // Embedding failure degrades to lexical-only retrieval.
        Err(_) => Vec::new(),
    };

    let lexical_hits = match ctx.lexical {
        Some(idx) if !idx.is_empty() => idx.search(question, ctx.cfg.topk_lexical),
        _ => Vec::new(),
    };

    let fused = fuse(&dense_hits, &lexical_hits, hint, ctx.corpus, ctx.cfg);
    let reranked = rerank_head(
        question,
        fused,
        ctx.corpus,
        ctx.scorer,
        ctx.cfg.rerank_model.as_deref(),
        ctx.cfg.rerank_depth,
    );
    let top_chunks: Vec<&Chunk> = reranked
        .iter()
        .take(ctx.cfg.final_k)
        .filter_map(|c| ctx.corpus.get(&c.chunk_id).ok())
        .collect();

    // Structured evidence. A planning failure means no queries, which the
    // generator prompt turns into a no-numbers instruction.
    let queries: Vec<ExecutedQuery> = match ctx.store {
        Some(store) => match plan_and_execute(question, hint, store, ctx.cfg)? {
            PlanOutcome::Planned(qs) => qs,
            PlanOutcome::PlanningFailure => Vec::new(),
        },
        None => Vec::new(),
    };

    let draft = match generate_draft(
        ctx.llm,
        &ctx.cfg.chat_model,
        question,
        &top_chunks,
        &queries,
        ctx.cfg,
    ) {
        Ok(d) => d,
        Err(e) if e.is_code("ANSWER_NO_EVIDENCE") => {
            return Ok(abstained_response(0.0, e.message));
        }
        Err(e) => return Err(e),
    };

    // Grounding contract. A violating draft is suppressed, not surfaced.
    let allowed_chunks: BTreeSet<String> =
        top_chunks.iter().map(|c| c.chunk_id.clone()).collect();
    let allowed_queries: BTreeSet<String> =
        queries.iter().map(|q| q.query_id.clone()).collect();
    let healthy_queries: BTreeSet<String> = queries
        .iter()
        .filter(|q| q.is_healthy())
        .map(|q| q.query_id.clone())
        .collect();
    if let Err(e) = enforce_grounding(
        &draft.markdown,
        &allowed_chunks,
        &allowed_queries,
        &healthy_queries,
    ) {
        return Ok(abstained_response(0.0, format!("grounding: {e}")));
    }

    // Judge the draft. An unparsable verdict is an explicit zero, which the
    // strict threshold below turns into an abstention.
    let verdict = match verify_answer(
        ctx.llm,
        &ctx.cfg.chat_model,
        question,
        &draft.markdown,
        &evidence_blocks(&top_chunks, ctx.cfg),
        &query_blocks(&queries),
    ) {
        Ok(v) => v,
        Err(e) if e.is_code("VERIFIER_PARSE_FAILED") => Verdict {
            score: 0.0,
            notes: format!("verifier: {}", e.message),
        },
        Err(e) => return Err(e),
    };

    let declined = draft.markdown.to_ascii_lowercase().contains("not enough evidence");
    if verdict.score < ctx.cfg.min_faithfulness || declined {
        return Ok(abstained_response(verdict.score, verdict.notes));
    }

    // Release: citations for what the draft actually cited, text evidence
    // in retrieval order first, then query citations.
    let mut citations = Vec::new();
    for chunk in top_chunks.iter() {
        if draft.markers.chunks.contains(&chunk.chunk_id) {
            citations.push(ctx.corpus.text_citation(chunk, ctx.cfg.quote_max_chars));
        }
    }
    for q in queries.iter() {
        if draft.markers.queries.contains(&q.query_id) {
            citations.push(Citation::Query {
                query_id: q.query_id.clone(),
                sql: q.sql.clone(),
                preview_csv: q.preview_csv.clone(),
                errored: q.errored,
            });
        }
    }

    Ok(QaResponse {
        answer_text: draft.markdown,
        citations,
        faithfulness_score: verdict.score,
        abstained: false,
        verifier_notes: verdict.notes,
    })
}
