//! Read-only access to a run's SQLite dataset.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Page size used when the caller gives none.
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Largest page a single request may ask for.
pub const MAX_PAGE_LIMIT: i64 = 1000;

const MAX_CONNECTIONS: u32 = 4;

static READ_STATEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*(select|with)\b").expect("valid regex"));

/// A table as listed by the index and `/api/tables`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: i64,
}

/// Column names plus rows rendered as JSON objects.
#[derive(Debug, Clone, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// Pool over one dataset file, opened read-only.
#[derive(Debug, Clone)]
pub struct Dataset {
    pool: SqlitePool,
    path: PathBuf,
}

impl Dataset {
    /// Open `path` read-only. A missing file is an error, never created.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        tracing::debug!(path = %path.display(), "Opened dataset");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// User tables in name order.
    pub async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn has_table(&self, name: &str) -> Result<bool, sqlx::Error> {
        Ok(self.table_names().await?.iter().any(|t| t == name))
    }

    pub async fn tables(&self) -> Result<Vec<TableSummary>, sqlx::Error> {
        let mut summaries = Vec::new();
        for name in self.table_names().await? {
            let columns = self.columns(&name).await?;
            let row_count = self.row_count(&name).await?;
            summaries.push(TableSummary {
                name,
                columns,
                row_count,
            });
        }
        Ok(summaries)
    }

    pub async fn columns(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn row_count(&self, table: &str) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
    }

    /// One page of `table`. Callers check the table exists first.
    pub async fn page(&self, table: &str, limit: i64, offset: i64) -> Result<RowSet, sqlx::Error> {
        let columns = self.columns(table).await?;
        let sql = format!("SELECT * FROM {} LIMIT ?1 OFFSET ?2", quote_ident(table));
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(RowSet {
            columns,
            rows: rows.iter().map(row_to_object).collect(),
        })
    }

    /// Run a statement already accepted by [`read_only_statement`].
    pub async fn select(&self, sql: &str) -> Result<RowSet, sqlx::Error> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        // An empty result carries no column metadata.
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        Ok(RowSet {
            columns,
            rows: rows.iter().map(row_to_object).collect(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Accept a single `SELECT` or `WITH` statement, returning it without its
/// trailing semicolons.
pub fn read_only_statement(sql: &str) -> Result<&str, String> {
    let sql = sql.trim();
    let statement = match statement_end(sql) {
        Some(end) => {
            let rest = sql[end..].trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            if !rest.is_empty() {
                return Err("only a single statement is allowed".to_string());
            }
            sql[..end].trim_end()
        }
        None => sql,
    };
    if statement.is_empty() {
        return Err("query is empty".to_string());
    }
    if !READ_STATEMENT_RE.is_match(statement) {
        return Err("only SELECT and WITH statements are allowed".to_string());
    }
    Ok(statement)
}

/// Byte offset of the first `;` outside literals, quoted identifiers and
/// comments.
fn statement_end(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
            }
            b'[' => {
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b';' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Clamp paging parameters to `1..=MAX_PAGE_LIMIT` and a non-negative
/// offset.
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_to_object(row: &SqliteRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), decode_value(row, column.ordinal())))
        .collect()
}

/// Decode by the stored value's own type; SQLite columns are loosely typed.
fn decode_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index).map(Value::from),
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index).map(Value::from),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::from(format!("<{} bytes>", bytes.len()))),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::from),
    };
    decoded.unwrap_or(Value::Null)
}
