use std::cell::RefCell;

use finqa_ai::answer::{generate_draft, query_blocks};
use finqa_ai::corpus::{ChunkRecord, CorpusStore};
use finqa_ai::llm::Llm;
use finqa_ai::plan::ExecutedQuery;
use finqa_core::config::QaConfig;
use finqa_core::error::AppError;

struct RecordingLlm {
    out: String,
    last_prompt: RefCell<String>,
}

impl RecordingLlm {
    fn new(out: &str) -> Self {
        Self {
            out: out.to_string(),
            last_prompt: RefCell::new(String::new()),
        }
    }
}

impl Llm for RecordingLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, AppError> {
        *self.last_prompt.borrow_mut() = prompt.to_string();
        Ok(self.out.clone())
    }
}

fn corpus() -> CorpusStore {
    CorpusStore::from_records(vec![ChunkRecord {
        id: "c1".to_string(),
        text: "iPhone revenue grew from 205000 to 212000".to_string(),
        ticker: "AAPL".to_string(),
        form: "10-K".to_string(),
        fiscal_period: "FY2024".to_string(),
        source_ref: "acc-1".to_string(),
        table_ref: Some("aapl_10k_segments".to_string()),
    }])
    .expect("corpus")
}

fn healthy_query() -> ExecutedQuery {
    ExecutedQuery {
        query_id: "S1".to_string(),
        sql: "SELECT 1".to_string(),
        preview_csv: "one\n1\n".to_string(),
        errored: false,
    }
}

fn errored_query() -> ExecutedQuery {
    ExecutedQuery {
        query_id: "S1".to_string(),
        sql: "SELECT nope".to_string(),
        preview_csv: "ERROR: [QUERY_EXEC_FAILED] Failed to prepare query".to_string(),
        errored: true,
    }
}

#[test]
fn draft_embeds_evidence_and_extracts_markers() {
    let corpus = corpus();
    let chunk = corpus.get("c1").unwrap();
    let cfg = QaConfig::default();
    let llm = RecordingLlm::new("Growth was solid [[query:S1]] per the filing [[chunk:c1]].");

    let draft = generate_draft(
        &llm,
        &cfg.chat_model,
        "How did iPhone revenue change?",
        &[chunk],
        &[healthy_query()],
        &cfg,
    )
    .expect("draft");

    assert!(draft.markers.chunks.contains("c1"));
    assert!(draft.markers.queries.contains("S1"));

    let prompt = llm.last_prompt.borrow();
    assert!(prompt.contains("[[chunk:c1]]"));
    assert!(prompt.contains("ticker=AAPL form=10-K"));
    assert!(prompt.contains("[[query:S1]] status=ok"));
    assert!(prompt.contains("Every number you state MUST carry"));
}

#[test]
fn prompt_forbids_numbers_when_no_query_succeeded() {
    let corpus = corpus();
    let chunk = corpus.get("c1").unwrap();
    let cfg = QaConfig::default();
    let llm = RecordingLlm::new("Direction was positive [[chunk:c1]].");

    generate_draft(
        &llm,
        &cfg.chat_model,
        "How did iPhone revenue change?",
        &[chunk],
        &[errored_query()],
        &cfg,
    )
    .expect("draft");

    let prompt = llm.last_prompt.borrow();
    assert!(prompt.contains("do NOT state any numbers"));
    assert!(prompt.contains("[[query:S1]] status=error"));
}

#[test]
fn no_evidence_at_all_is_an_error() {
    let cfg = QaConfig::default();
    let llm = RecordingLlm::new("anything");

    let err = generate_draft(
        &llm,
        &cfg.chat_model,
        "How did iPhone revenue change?",
        &[],
        &[errored_query()],
        &cfg,
    )
    .expect_err("no evidence");
    assert_eq!(err.code, "ANSWER_NO_EVIDENCE");
}

#[test]
fn query_blocks_render_sql_and_preview() {
    let blocks = query_blocks(&[healthy_query(), errored_query()]);
    assert!(blocks.contains("SQL:\nSELECT 1"));
    assert!(blocks.contains("Result preview (CSV):\none"));
    assert!(blocks.contains("status=error"));
    assert_eq!(query_blocks(&[]), "(none)");
}
