use std::collections::BTreeSet;

use pretty_assertions::assert_eq;

use finqa_ai::corpus::{ChunkRecord, CorpusStore};
use finqa_ai::retrieve::fuse;
use finqa_core::config::QaConfig;

fn corpus() -> CorpusStore {
    let records = [
        ("c_a", "apple services revenue commentary", "AAPL"),
        ("c_b", "microsoft cloud margin commentary", "MSFT"),
        ("c_c", "microsoft office segment commentary", "MSFT"),
        ("c_d", "apple iphone segment commentary", "AAPL"),
    ]
    .into_iter()
    .map(|(id, text, ticker)| ChunkRecord {
        id: id.to_string(),
        text: text.to_string(),
        ticker: ticker.to_string(),
        form: "10-K".to_string(),
        fiscal_period: "FY2024".to_string(),
        source_ref: String::new(),
        table_ref: None,
    })
    .collect();
    CorpusStore::from_records(records).expect("corpus")
}

fn hits(ids: &[&str]) -> Vec<(String, f32)> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), 1.0 - i as f32 * 0.1))
        .collect()
}

#[test]
fn no_duplicates_and_every_input_chunk_appears_once() {
    let c = corpus();
    let cfg = QaConfig::default();
    let fused = fuse(&hits(&["c_a", "c_b"]), &hits(&["c_b", "c_c"]), None, &c, &cfg);

    let ids: Vec<&str> = fused.iter().map(|s| s.chunk_id.as_str()).collect();
    let unique: BTreeSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "no duplicate chunk ids");
    assert_eq!(unique, BTreeSet::from(["c_a", "c_b", "c_c"]));
}

#[test]
fn rank_one_in_both_lists_beats_rank_one_in_a_single_list() {
    let c = corpus();
    let cfg = QaConfig::default();

    let both = fuse(&hits(&["c_a"]), &hits(&["c_a"]), None, &c, &cfg);
    let single = fuse(&hits(&["c_b"]), &[], None, &c, &cfg);

    assert!(both[0].score > single[0].score);
}

#[test]
fn dense_only_fusion_preserves_order_with_rrf_scores() {
    let c = corpus();
    let cfg = QaConfig::default();
    let fused = fuse(&hits(&["c_b", "c_a", "c_c"]), &[], None, &c, &cfg);

    let ids: Vec<&str> = fused.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["c_b", "c_a", "c_c"]);
    for (i, cand) in fused.iter().enumerate() {
        let expected = 1.0 / (cfg.rrf_k + (i + 1) as f64);
        assert!((cand.score - expected).abs() < 1e-12);
    }
}

#[test]
fn ticker_bias_lifts_matches_without_reordering_the_rest() {
    let c = corpus();
    let cfg = QaConfig::default();

    // c_b and c_c (MSFT) ahead of the AAPL chunks without a hint.
    let dense = hits(&["c_b", "c_c", "c_a", "c_d"]);
    let unbiased = fuse(&dense, &[], None, &c, &cfg);
    let unbiased_ids: Vec<&str> = unbiased.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(unbiased_ids, vec!["c_b", "c_c", "c_a", "c_d"]);

    let biased = fuse(&dense, &[], Some("AAPL"), &c, &cfg);
    let biased_ids: Vec<&str> = biased.iter().map(|s| s.chunk_id.as_str()).collect();
    // AAPL candidates move up, in their original relative order.
    assert_eq!(biased_ids, vec!["c_a", "c_d", "c_b", "c_c"]);

    // Non-matching candidates keep their relative order.
    let b_pos = biased_ids.iter().position(|&id| id == "c_b").unwrap();
    let c_pos = biased_ids.iter().position(|&id| id == "c_c").unwrap();
    assert!(b_pos < c_pos);

    // Matching candidates keep their relative order too.
    let a_pos = biased_ids.iter().position(|&id| id == "c_a").unwrap();
    let d_pos = biased_ids.iter().position(|&id| id == "c_d").unwrap();
    assert!(a_pos < d_pos);

    for cand in biased.iter() {
        assert_eq!(cand.ticker_match, cand.chunk_id == "c_a" || cand.chunk_id == "c_d");
    }
}

#[test]
fn equal_scores_tie_break_by_best_rank_then_chunk_id() {
    let c = corpus();
    let cfg = QaConfig::default();

    // c_a rank 1 dense only; c_b rank 1 lexical only: identical scores and
    // best ranks, so the chunk id decides.
    let fused = fuse(&hits(&["c_b"]), &hits(&["c_a"]), None, &c, &cfg);
    let ids: Vec<&str> = fused.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["c_a", "c_b"]);
}
