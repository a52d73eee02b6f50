use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use finqa_core::error::AppError;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::corpus::{Chunk, CorpusStore};
use crate::embeddings::Embedder;
use crate::retrieve::similarity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseIndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub chunk_count: u32,
    pub updated_at: Option<String>,
}

/// Dense semantic index over the corpus. State lives as JSON files under
/// `root/index/`; every write goes through tmp + rename so a rebuild swaps
/// in atomically and a query never observes a half-built index.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    root: PathBuf,
}

/// Passage-side encoding: prefix the chunk text with its metadata so
/// questions about different companies land in distinguishable regions of
/// the embedding space.
pub fn meta_passage(chunk: &Chunk) -> String {
    format!(
        "passage: [TICKER: {}] [FORM: {}] {}",
        chunk.ticker, chunk.form, chunk.text
    )
}

/// Query-side encoding, mirroring `meta_passage`.
pub fn query_passage(question: &str, ticker_hint: Option<&str>) -> String {
    match ticker_hint {
        Some(t) => format!("query: {} [TICKER: {}]", question, t.to_ascii_uppercase()),
        None => format!("query: {question}"),
    }
}

impl DenseIndex {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn status_path(&self) -> PathBuf {
        self.index_dir().join("dense_status.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.index_dir().join("dense_vectors.json")
    }

    fn hashes_path(&self) -> PathBuf {
        self.index_dir().join("dense_hashes.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.index_dir()).map_err(|e| {
            AppError::new("INDEX_BUILD_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.index_dir().display(), e))
        })
    }

    pub fn status(&self) -> Result<DenseIndexStatus, AppError> {
        self.ensure_dirs()?;
        let path = self.status_path();
        if !path.exists() {
            return Ok(DenseIndexStatus {
                ready: false,
                model: None,
                dims: None,
                chunk_count: 0,
                updated_at: None,
            });
        }
        let bytes = fs::read(&path).map_err(|e| {
            AppError::new("INDEX_READ_FAILED", "Failed to read index status")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new("INDEX_READ_FAILED", "Failed to decode index status")
                .with_details(format!("path={}; err={}", path.display(), e))
        })
    }

    pub fn read_vectors(&self) -> Result<BTreeMap<String, Vec<f32>>, AppError> {
        self.ensure_dirs()?;
        read_json_map(self.vectors_path())
    }

    fn read_hashes(&self) -> Result<BTreeMap<String, String>, AppError> {
        self.ensure_dirs()?;
        read_json_map(self.hashes_path())
    }

    /// Batch build over the full corpus. Re-embeds only chunks whose text
    /// hash changed since the last compatible build; an incompatible model
    /// starts from scratch. Vectors are written before status, so `ready`
    /// is only ever observed alongside complete vector state.
    pub fn build_with_embedder(
        &self,
        corpus: &CorpusStore,
        embedder: &dyn Embedder,
        model: &str,
    ) -> Result<DenseIndexStatus, AppError> {
        self.ensure_dirs()?;
        if corpus.is_empty() {
            return Err(AppError::new(
                "INDEX_BUILD_FAILED",
                "Corpus is empty; ingest chunks before building the index",
            ));
        }

        let current = self.status()?;
        let compatible = current.ready && current.model.as_deref() == Some(model);

        let mut vectors: BTreeMap<String, Vec<f32>> = if compatible {
            self.read_vectors()?
        } else {
            BTreeMap::new()
        };
        let mut hashes: BTreeMap<String, String> = if compatible {
            self.read_hashes()?
        } else {
            BTreeMap::new()
        };

        // Drop state for chunks no longer in the corpus.
        vectors.retain(|id, _| corpus.contains(id));
        hashes.retain(|id, _| corpus.contains(id));

        let mut dims: Option<u32> = if compatible { current.dims } else { None };

        for chunk in corpus.iter() {
            let fresh = hashes.get(&chunk.chunk_id) == Some(&chunk.text_sha256)
                && vectors.contains_key(&chunk.chunk_id);
            if fresh {
                continue;
            }
            let v = embedder.embed(model, &meta_passage(chunk)).map_err(|e| {
                AppError::new("INDEX_BUILD_FAILED", "Failed to embed corpus chunk")
                    .with_details(format!("chunk_id={}; err={}", chunk.chunk_id, e))
                    .with_retryable(e.retryable)
            })?;
            let this_dims = v.len() as u32;
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        "INDEX_BUILD_FAILED",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!(
                        "expected={}; got={}; chunk_id={}",
                        d, this_dims, chunk.chunk_id
                    )));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
            vectors.insert(chunk.chunk_id.clone(), v);
            hashes.insert(chunk.chunk_id.clone(), chunk.text_sha256.clone());
        }

        write_json_atomic(self.vectors_path(), &vectors)?;
        write_json_atomic(self.hashes_path(), &hashes)?;

        let updated_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
            AppError::new("INDEX_BUILD_FAILED", "Failed to format build timestamp")
                .with_details(e.to_string())
        })?;
        let status = DenseIndexStatus {
            ready: true,
            model: Some(model.to_string()),
            dims,
            chunk_count: vectors.len() as u32,
            updated_at: Some(updated_at),
        };
        write_json_atomic(self.status_path(), &status)?;
        Ok(status)
    }

    /// Nearest neighbors by cosine similarity. Ties break by corpus
    /// insertion order. Read-only and side-effect-free.
    pub fn search(
        &self,
        corpus: &CorpusStore,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<(String, f32)>, AppError> {
        let st = self.status()?;
        if !st.ready {
            return Err(AppError::new(
                "RETRIEVAL_UNAVAILABLE",
                "Dense index not built",
            ));
        }
        if let Some(dims) = st.dims {
            if query_vec.len() as u32 != dims {
                return Err(AppError::new(
                    "RETRIEVAL_FAILED",
                    "Query embedding dims do not match index dims",
                )
                .with_details(format!("index_dims={dims}; query_dims={}", query_vec.len())));
            }
        }

        let qnorm = similarity::l2_norm(query_vec);
        if qnorm == 0.0 {
            return Err(AppError::new(
                "RETRIEVAL_FAILED",
                "Query embedding norm is zero",
            ));
        }

        let vectors = self.read_vectors()?;
        let mut hits: Vec<(String, f32, u32)> = Vec::new();
        for (chunk_id, v) in vectors.iter() {
            // Stale vectors for chunks gone from the corpus are skipped.
            let ordinal = match corpus.ordinal_of(chunk_id) {
                Some(o) => o,
                None => continue,
            };
            let vnorm = similarity::l2_norm(v);
            if vnorm == 0.0 {
                continue;
            }
            let score = similarity::cosine_similarity(query_vec, v, qnorm, vnorm);
            hits.push((chunk_id.clone(), score, ordinal));
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        hits.truncate(k);
        Ok(hits.into_iter().map(|(id, score, _)| (id, score)).collect())
    }
}

fn read_json_map<T: serde::de::DeserializeOwned + Default>(path: PathBuf) -> Result<T, AppError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(&path).map_err(|e| {
        AppError::new("INDEX_READ_FAILED", "Failed to read index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("INDEX_READ_FAILED", "Failed to decode index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: Serialize>(path: PathBuf, value: &T) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", "Failed to encode index file")
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", "Failed to write index file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, &path).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", "Failed to finalize index file write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}
