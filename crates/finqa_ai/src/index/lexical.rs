use std::collections::BTreeMap;

use crate::corpus::CorpusStore;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// Term-overlap index over the corpus using BM25 (Okapi) ranking.
///
/// No semantic generalization: exact token matches only. This is what
/// catches rare tickers, bare numbers, and proper nouns the dense index
/// may blur. Deterministic for a fixed corpus and tokenizer.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    doc_ids: Vec<String>,
    term_freqs: Vec<BTreeMap<String, u32>>,
    doc_lens: Vec<u32>,
    doc_freq: BTreeMap<String, u32>,
    avg_len: f64,
}

/// Lowercased alphanumeric tokens; everything else is a separator.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

impl LexicalIndex {
    /// Build over the full corpus in insertion order. Ticker and form are
    /// indexed alongside the chunk text so they match lexically.
    pub fn build(corpus: &CorpusStore) -> Self {
        let mut doc_ids = Vec::with_capacity(corpus.len());
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut doc_freq: BTreeMap<String, u32> = BTreeMap::new();

        for chunk in corpus.iter() {
            let doc_text = format!("{} {} {}", chunk.ticker, chunk.form, chunk.text);
            let tokens = tokenize(&doc_text);
            let mut tf: BTreeMap<String, u32> = BTreeMap::new();
            for t in &tokens {
                *tf.entry(t.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_ids.push(chunk.chunk_id.clone());
            doc_lens.push(tokens.len() as u32);
            term_freqs.push(tf);
        }

        let avg_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().map(|&l| l as f64).sum::<f64>() / doc_lens.len() as f64
        };

        Self {
            doc_ids,
            term_freqs,
            doc_lens,
            doc_freq,
            avg_len,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// BM25-ranked search. Zero-score documents are dropped; ties break by
    /// insertion order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        if self.doc_ids.is_empty() {
            return Vec::new();
        }
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let n = self.doc_ids.len() as f64;
        let mut scored: Vec<(usize, f64)> = Vec::new();

        for (i, tf) in self.term_freqs.iter().enumerate() {
            let dl = self.doc_lens[i] as f64;
            let len_norm = 1.0 - BM25_B + BM25_B * dl / self.avg_len.max(1.0);
            let mut score = 0.0f64;
            for term in &query_terms {
                let f = match tf.get(term) {
                    Some(&f) => f as f64,
                    None => continue,
                };
                let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
                let idf = (((n - df + 0.5) / (df + 0.5)) + 1.0).ln();
                score += idf * f * (BM25_K1 + 1.0) / (f + BM25_K1 * len_norm);
            }
            if score > 0.0 {
                scored.push((i, score));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(i, s)| (self.doc_ids[i].clone(), s as f32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ChunkRecord;

    fn corpus(records: Vec<(&str, &str, &str)>) -> CorpusStore {
        CorpusStore::from_records(
            records
                .into_iter()
                .map(|(id, text, ticker)| ChunkRecord {
                    id: id.to_string(),
                    text: text.to_string(),
                    ticker: ticker.to_string(),
                    form: "10-K".to_string(),
                    fiscal_period: String::new(),
                    source_ref: String::new(),
                    table_ref: None,
                })
                .collect(),
        )
        .expect("corpus")
    }

    #[test]
    fn ranks_exact_term_match_first() {
        let c = corpus(vec![
            ("c1", "gross margin improved on services mix", "AAPL"),
            ("c2", "data center revenue drove growth", "NVDA"),
            ("c3", "weather was mild this quarter", "AAPL"),
        ]);
        let idx = LexicalIndex::build(&c);
        let hits = idx.search("data center growth", 3);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].0, "c2");
    }

    #[test]
    fn rare_ticker_token_matches() {
        let c = corpus(vec![
            ("c1", "revenue discussion", "AAPL"),
            ("c2", "revenue discussion", "NVDA"),
        ]);
        let idx = LexicalIndex::build(&c);
        let hits = idx.search("NVDA revenue", 2);
        assert_eq!(hits[0].0, "c2");
    }

    #[test]
    fn drops_zero_score_documents() {
        let c = corpus(vec![("c1", "alpha beta", "AAPL"), ("c2", "gamma delta", "MSFT")]);
        let idx = LexicalIndex::build(&c);
        let hits = idx.search("unrelated words entirely", 10);
        assert!(hits.is_empty());
    }

    #[test]
    fn deterministic_tie_break_by_insertion_order() {
        let c = corpus(vec![
            ("z-late", "identical text here", "AAPL"),
            ("a-early", "identical text here", "AAPL"),
        ]);
        let idx = LexicalIndex::build(&c);
        let hits = idx.search("identical text", 2);
        assert_eq!(hits.len(), 2);
        // Equal scores: first inserted wins, regardless of id ordering.
        assert_eq!(hits[0].0, "z-late");
    }
}
