use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use finqa_core::error::AppError;
use sha2::{Digest, Sha256};

use super::model::{Chunk, ChunkRecord, Citation, TextLocator};

/// In-memory view of the ingested text corpus. Built once, then read-only
/// for the lifetime of the process; a fresh load replaces it wholesale.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    chunks: Vec<Chunk>,
    by_id: BTreeMap<String, usize>,
}

impl CorpusStore {
    /// Build from ingestion records, preserving their order as the corpus
    /// insertion order. Ids must be non-empty and unique.
    pub fn from_records(records: Vec<ChunkRecord>) -> Result<Self, AppError> {
        let mut chunks = Vec::with_capacity(records.len());
        let mut by_id = BTreeMap::new();

        for (i, rec) in records.into_iter().enumerate() {
            let id = rec.id.trim().to_string();
            if id.is_empty() {
                return Err(AppError::new("CORPUS_INVALID", "Chunk id must not be empty")
                    .with_details(format!("record={i}")));
            }
            if by_id.contains_key(&id) {
                return Err(AppError::new("CORPUS_INVALID", "Duplicate chunk id")
                    .with_details(format!("chunk_id={id}")));
            }
            let text = rec.text.trim().to_string();
            if text.is_empty() {
                return Err(AppError::new("CORPUS_INVALID", "Chunk text must not be empty")
                    .with_details(format!("chunk_id={id}")));
            }

            let chunk = Chunk {
                text_sha256: sha256_hex(text.as_bytes()),
                chunk_id: id.clone(),
                text,
                ticker: rec.ticker.trim().to_ascii_uppercase(),
                form: rec.form.trim().to_string(),
                fiscal_period: rec.fiscal_period.trim().to_string(),
                source_ref: rec.source_ref.trim().to_string(),
                table_ref: rec.table_ref,
                ordinal: i as u32,
            };
            by_id.insert(id, chunks.len());
            chunks.push(chunk);
        }

        Ok(Self { chunks, by_id })
    }

    /// Load a corpus.jsonl produced by ingestion: one chunk record per line,
    /// blank lines skipped.
    pub fn load_jsonl(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CORPUS_READ_FAILED", "Failed to read corpus file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;

        let mut records = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let rec: ChunkRecord = serde_json::from_str(line).map_err(|e| {
                AppError::new("CORPUS_READ_FAILED", "Failed to decode corpus record")
                    .with_details(format!("line={}; err={}", lineno + 1, e))
            })?;
            records.push(rec);
        }
        Self::from_records(records)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn get(&self, chunk_id: &str) -> Result<&Chunk, AppError> {
        self.by_id
            .get(chunk_id)
            .map(|&i| &self.chunks[i])
            .ok_or_else(|| {
                AppError::new("CORPUS_CHUNK_NOT_FOUND", "Chunk id not in corpus")
                    .with_details(format!("chunk_id={chunk_id}"))
            })
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.by_id.contains_key(chunk_id)
    }

    /// Insertion position of a chunk, used as the retrieval tie-breaker.
    pub fn ordinal_of(&self, chunk_id: &str) -> Option<u32> {
        self.by_id.get(chunk_id).map(|&i| self.chunks[i].ordinal)
    }

    /// Canonical text citation for a chunk, quoting at most `quote_max_chars`.
    pub fn text_citation(&self, chunk: &Chunk, quote_max_chars: usize) -> Citation {
        Citation::Text {
            chunk_id: chunk.chunk_id.clone(),
            quote: truncate_quote(&chunk.text, quote_max_chars),
            locator: TextLocator {
                ticker: chunk.ticker.clone(),
                form: chunk.form.clone(),
                fiscal_period: chunk.fiscal_period.clone(),
                source_ref: chunk.source_ref.clone(),
            },
        }
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

pub(crate) fn truncate_quote(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    if t.chars().count() <= max_chars {
        return t.to_string();
    }
    let mut s: String = t.chars().take(max_chars).collect();
    s.push_str("...");
    s
}
