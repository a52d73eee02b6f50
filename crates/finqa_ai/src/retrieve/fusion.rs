use std::collections::BTreeMap;

use finqa_core::config::QaConfig;

use crate::corpus::CorpusStore;

/// A chunk after rank fusion: fused score plus the rank it held in each
/// contributing list. Built per query, discarded after use.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk_id: String,
    pub score: f64,
    /// 1-based rank in the dense list, when present there.
    pub dense_rank: Option<usize>,
    /// 1-based rank in the lexical list, when present there.
    pub lexical_rank: Option<usize>,
    /// Whether the chunk's ticker matched the query's ticker hint.
    pub ticker_match: bool,
}

impl ScoredCandidate {
    /// Best (lowest) rank across the contributing lists; tie-break key.
    pub fn best_rank(&self) -> usize {
        match (self.dense_rank, self.lexical_rank) {
            (Some(d), Some(l)) => d.min(l),
            (Some(d), None) => d,
            (None, Some(l)) => l,
            (None, None) => usize::MAX,
        }
    }
}

/// Reciprocal rank fusion of the dense and lexical lists.
///
/// Each chunk scores `Σ 1/(K + rank)` over the lists it appears in, with
/// 1-based ranks; a chunk absent from a list contributes nothing from it.
/// Candidates matching the ticker hint get an additive `ticker_boost` —
/// a constant addition cannot invert the order of two boosted candidates,
/// nor reorder unboosted candidates among themselves.
///
/// Output is deduplicated by chunk id and sorted descending by fused
/// score; ties break by best rank across the inputs, then by chunk id.
pub fn fuse(
    dense: &[(String, f32)],
    lexical: &[(String, f32)],
    ticker_hint: Option<&str>,
    corpus: &CorpusStore,
    cfg: &QaConfig,
) -> Vec<ScoredCandidate> {
    let mut by_id: BTreeMap<String, ScoredCandidate> = BTreeMap::new();

    for (rank0, (chunk_id, _)) in dense.iter().enumerate() {
        let rank = rank0 + 1;
        let entry = by_id
            .entry(chunk_id.clone())
            .or_insert_with(|| blank_candidate(chunk_id));
        entry.score += 1.0 / (cfg.rrf_k + rank as f64);
        entry.dense_rank = Some(rank);
    }

    for (rank0, (chunk_id, _)) in lexical.iter().enumerate() {
        let rank = rank0 + 1;
        let entry = by_id
            .entry(chunk_id.clone())
            .or_insert_with(|| blank_candidate(chunk_id));
        entry.score += 1.0 / (cfg.rrf_k + rank as f64);
        entry.lexical_rank = Some(rank);
    }

    if let Some(hint) = ticker_hint {
        let hint = hint.trim();
        if !hint.is_empty() {
            for cand in by_id.values_mut() {
                let matches = corpus
                    .get(&cand.chunk_id)
                    .map(|c| c.ticker.eq_ignore_ascii_case(hint))
                    .unwrap_or(false);
                if matches {
                    cand.ticker_match = true;
                    cand.score += cfg.ticker_boost;
                }
            }
        }
    }

    let mut out: Vec<ScoredCandidate> = by_id.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.best_rank().cmp(&b.best_rank()))
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    out
}

fn blank_candidate(chunk_id: &str) -> ScoredCandidate {
    ScoredCandidate {
        chunk_id: chunk_id.to_string(),
        score: 0.0,
        dense_rank: None,
        lexical_rank: None,
        ticker_match: false,
    }
}
