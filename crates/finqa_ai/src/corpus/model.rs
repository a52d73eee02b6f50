use serde::{Deserialize, Serialize};

/// One immutable unit of filing text, produced by ingestion. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub text_sha256: String,
    /// Company ticker this chunk belongs to (uppercased at load).
    pub ticker: String,
    /// Filing form type, e.g. "10-K".
    pub form: String,
    /// Fiscal period label, e.g. "FY2024".
    pub fiscal_period: String,
    /// Reference to the source document (accession number or path).
    pub source_ref: String,
    /// Name of a structured table extracted from the same filing, if any.
    pub table_ref: Option<String>,
    /// Position in corpus insertion order; the deterministic tie-breaker
    /// for equal retrieval scores.
    pub ordinal: u32,
}

/// Wire format of one corpus record (one JSONL line from ingestion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub ticker: String,
    pub form: String,
    #[serde(default)]
    pub fiscal_period: String,
    #[serde(default)]
    pub source_ref: String,
    #[serde(default)]
    pub table_ref: Option<String>,
}

/// Where a quoted span came from, for audit display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextLocator {
    pub ticker: String,
    pub form: String,
    pub fiscal_period: String,
    pub source_ref: String,
}

/// A single piece of supporting evidence attached to an answer.
///
/// Query citations carry the exact SQL that produced them; re-running that
/// text verbatim against the store reproduces the cited rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Citation {
    Text {
        chunk_id: String,
        quote: String,
        locator: TextLocator,
    },
    Query {
        query_id: String,
        sql: String,
        preview_csv: String,
        errored: bool,
    },
}

impl Citation {
    pub fn is_query(&self) -> bool {
        matches!(self, Citation::Query { .. })
    }
}
