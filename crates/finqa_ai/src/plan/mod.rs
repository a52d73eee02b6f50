use finqa_core::config::QaConfig;
use finqa_core::error::AppError;
use finqa_core::store::{preview_csv, quote_ident, SqlStore};
use serde::{Deserialize, Serialize};

mod intents;

use intents::INTENTS;

/// An executed, auditable query: the exact SQL (re-runnable verbatim) plus
/// a CSV preview of its rows. Execution failures are captured here as
/// `errored: true` rather than aborting the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutedQuery {
    pub query_id: String,
    pub sql: String,
    pub preview_csv: String,
    pub errored: bool,
}

impl ExecutedQuery {
    pub fn is_healthy(&self) -> bool {
        !self.errored
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanOutcome {
    Planned(Vec<ExecutedQuery>),
    /// No intent matched and no usable table exists for the ticker. The
    /// generator must be told to avoid numeric claims.
    PlanningFailure,
}

/// Plan a structured query for the question and run it.
///
/// Matching is deterministic: intents are tried in their fixed order
/// against tables scoped to the ticker hint (sorted by name); the first
/// intent whose capability check and schema check both pass wins. When no
/// intent matches, a safe preview of the ticker's default table is
/// synthesized; when the ticker has no table at all, planning fails.
pub fn plan_and_execute(
    question: &str,
    ticker_hint: Option<&str>,
    store: &SqlStore,
    cfg: &QaConfig,
) -> Result<PlanOutcome, AppError> {
    let tables = candidate_tables(store, ticker_hint)?;
    if tables.is_empty() {
        return Ok(PlanOutcome::PlanningFailure);
    }

    for intent in INTENTS.iter() {
        if !intent.matches(question) {
            continue;
        }
        for table in tables.iter() {
            let schema = store.schema_of(table)?;
            if let Some(sql) = intent.build(question, &schema) {
                let executed = run_query("S1", sql, store, cfg);
                return Ok(PlanOutcome::Planned(vec![executed]));
            }
        }
    }

    // Fallback: a bounded preview of the default table always runs.
    let default_table = &tables[0];
    let sql = format!(
        "SELECT * FROM {} LIMIT {}",
        quote_ident(default_table),
        cfg.preview_rows
    );
    let executed = run_query("S1", sql, store, cfg);
    Ok(PlanOutcome::Planned(vec![executed]))
}

/// Tables scoped to the ticker hint (name contains the ticker,
/// case-insensitive), or every table when no hint is given. Sorted by name
/// so the "default table" choice is deterministic.
fn candidate_tables(store: &SqlStore, ticker_hint: Option<&str>) -> Result<Vec<String>, AppError> {
    let all = store.tables()?;
    let hint = ticker_hint.map(|t| t.trim().to_ascii_lowercase());
    match hint.as_deref() {
        Some(h) if !h.is_empty() => Ok(all
            .into_iter()
            .filter(|t| t.to_ascii_lowercase().contains(h))
            .collect()),
        _ => Ok(all),
    }
}

fn run_query(query_id: &str, sql: String, store: &SqlStore, cfg: &QaConfig) -> ExecutedQuery {
    match store.execute_readonly(&sql) {
        Ok(rows) => match preview_csv(&rows, cfg.preview_rows) {
            Ok(preview) => ExecutedQuery {
                query_id: query_id.to_string(),
                sql,
                preview_csv: preview,
                errored: false,
            },
            Err(e) => errored_query(query_id, sql, &e),
        },
        Err(e) => errored_query(query_id, sql, &e),
    }
}

fn errored_query(query_id: &str, sql: String, err: &AppError) -> ExecutedQuery {
    ExecutedQuery {
        query_id: query_id.to_string(),
        sql,
        preview_csv: format!("ERROR: {err}"),
        errored: true,
    }
}
