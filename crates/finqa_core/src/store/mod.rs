use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One column of a discovered table schema. `decl_type` is the declared
/// SQLite type, uppercased (empty when the column was declared untyped).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub decl_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Case-insensitive column lookup, returning the declared name.
    pub fn column_named(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Result of a read-only query: column names plus rows with every value
/// rendered to text. Row order is whatever the statement produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Handle on the analytical store. The tables themselves are owned by the
/// ingestion side; this core only discovers schemas and runs read-only
/// queries against them.
pub struct SqlStore {
    conn: Connection,
}

impl SqlStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = Connection::open(path).map_err(|e| {
            AppError::new("STORE_OPEN_FAILED", "Failed to open analytical store")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::new(
                "STORE_OPEN_FAILED",
                "Failed to open in-memory analytical store",
            )
            .with_details(e.to_string())
        })?;
        Ok(Self { conn })
    }

    /// Ingestion seam: create/populate tables. Not used on the query path.
    pub fn execute_batch(&self, sql: &str) -> Result<(), AppError> {
        self.conn.execute_batch(sql).map_err(|e| {
            AppError::new("STORE_INGEST_FAILED", "Failed to execute ingest batch")
                .with_details(e.to_string())
        })
    }

    /// All user tables, sorted by name for deterministic iteration.
    pub fn tables(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| {
                AppError::new("STORE_SCHEMA_FAILED", "Failed to list tables")
                    .with_details(e.to_string())
            })?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| {
                AppError::new("STORE_SCHEMA_FAILED", "Failed to read table names")
                    .with_details(e.to_string())
            })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| {
                AppError::new("STORE_SCHEMA_FAILED", "Failed to read table name row")
                    .with_details(e.to_string())
            })?);
        }
        Ok(out)
    }

    pub fn schema_of(&self, table: &str) -> Result<TableSchema, AppError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql).map_err(|e| {
            AppError::new("STORE_SCHEMA_FAILED", "Failed to inspect table schema")
                .with_details(format!("table={table}; err={e}"))
        })?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let decl_type: String = row.get(2)?;
                Ok(ColumnSchema {
                    name,
                    decl_type: decl_type.to_ascii_uppercase(),
                })
            })
            .map_err(|e| {
                AppError::new("STORE_SCHEMA_FAILED", "Failed to read table schema")
                    .with_details(format!("table={table}; err={e}"))
            })?;
        let mut columns = Vec::new();
        for r in rows {
            columns.push(r.map_err(|e| {
                AppError::new("STORE_SCHEMA_FAILED", "Failed to read schema row")
                    .with_details(format!("table={table}; err={e}"))
            })?);
        }
        if columns.is_empty() {
            return Err(AppError::new("STORE_TABLE_NOT_FOUND", "Table does not exist")
                .with_details(format!("table={table}")));
        }
        Ok(TableSchema {
            name: table.to_string(),
            columns,
        })
    }

    /// Table name -> column names, optionally filtered by a case-insensitive
    /// substring of the table name (used to scope planning to a ticker).
    pub fn table_summaries(
        &self,
        like: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<String>>, AppError> {
        let needle = like.map(|s| s.to_ascii_lowercase());
        let mut out = BTreeMap::new();
        for table in self.tables()? {
            if let Some(n) = needle.as_deref() {
                if !table.to_ascii_lowercase().contains(n) {
                    continue;
                }
            }
            let schema = self.schema_of(&table)?;
            out.insert(
                table,
                schema.columns.into_iter().map(|c| c.name).collect(),
            );
        }
        Ok(out)
    }

    /// Execute a single read-only SELECT/WITH statement and capture its rows.
    ///
    /// Rejection happens before execution: write and DDL statements, and
    /// anything that is not exactly one statement, never reach SQLite.
    pub fn execute_readonly(&self, sql: &str) -> Result<QueryRows, AppError> {
        assert_readonly_shape(sql)?;

        let mut stmt = self.conn.prepare(sql).map_err(|e| {
            AppError::new("QUERY_EXEC_FAILED", "Failed to prepare query")
                .with_details(e.to_string())
        })?;
        if !stmt.readonly() {
            return Err(AppError::new(
                "STORE_QUERY_REJECTED",
                "Statement is not read-only",
            ));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let ncols = columns.len();

        let mapped = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(ncols);
                for i in 0..ncols {
                    values.push(render_value(row.get::<_, Value>(i)?));
                }
                Ok(values)
            })
            .map_err(|e| {
                AppError::new("QUERY_EXEC_FAILED", "Failed to execute query")
                    .with_details(e.to_string())
            })?;

        let mut rows = Vec::new();
        for r in mapped {
            rows.push(r.map_err(|e| {
                AppError::new("QUERY_EXEC_FAILED", "Failed to read query row")
                    .with_details(e.to_string())
            })?);
        }
        Ok(QueryRows { columns, rows })
    }
}

/// Render a result preview as CSV (header + up to `max_rows` rows), the form
/// embedded into query citations.
pub fn preview_csv(result: &QueryRows, max_rows: usize) -> Result<String, AppError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(&result.columns).map_err(|e| {
        AppError::new("STORE_PREVIEW_FAILED", "Failed to write preview header")
            .with_details(e.to_string())
    })?;
    for row in result.rows.iter().take(max_rows) {
        w.write_record(row).map_err(|e| {
            AppError::new("STORE_PREVIEW_FAILED", "Failed to write preview row")
                .with_details(e.to_string())
        })?;
    }
    let bytes = w.into_inner().map_err(|e| {
        AppError::new("STORE_PREVIEW_FAILED", "Failed to finalize preview")
            .with_details(e.to_string())
    })?;
    String::from_utf8(bytes).map_err(|e| {
        AppError::new("STORE_PREVIEW_FAILED", "Preview was not valid UTF-8")
            .with_details(e.to_string())
    })
}

/// Double-quote an identifier for embedding into SQL text.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn assert_readonly_shape(sql: &str) -> Result<(), AppError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(AppError::new("STORE_QUERY_REJECTED", "Query is empty"));
    }

    // Exactly one statement: a semicolon is only allowed as the trailer.
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(AppError::new(
            "STORE_QUERY_REJECTED",
            "Multi-statement input is not allowed",
        ));
    }

    let first = body
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if first != "select" && first != "with" {
        return Err(AppError::new(
            "STORE_QUERY_REJECTED",
            "Only SELECT/WITH statements are allowed",
        )
        .with_details(format!("leading_keyword={first}")));
    }
    Ok(())
}

fn render_value(v: Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => format!("<blob:{} bytes>", b.len()),
    }
}
