//! HTTP surface of the query application.

use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use super::dataset::{self, Dataset, RowSet, TableSummary};
use crate::error::{ApiError, ApiResult};

/// Bytes left as-is when a table name becomes a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// GET /health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dataset: String,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub dataset: String,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Serialize)]
pub struct TablePageResponse {
    pub table: String,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    #[serde(flatten)]
    pub rows: RowSet,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub row_count: usize,
    #[serde(flatten)]
    pub rows: RowSet,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub sql: Option<String>,
}

/// Build the query application over `dataset`.
pub fn router(dataset: Dataset) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/tables", get(list_tables))
        .route("/api/tables/{name}", get(table_page))
        .route("/api/query", get(run_query))
        .with_state(dataset)
}

/// GET /health -- readiness probe target.
async fn health(State(dataset): State<Dataset>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        dataset: dataset.file_name(),
    })
}

/// GET / -- table index as HTML.
async fn index(State(dataset): State<Dataset>) -> ApiResult<Html<String>> {
    let tables = dataset.tables().await?;
    let title = escape_html(&dataset.file_name());

    let mut body = format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body><h1>{title}</h1>\n"
    );
    if tables.is_empty() {
        body.push_str("<p>This dataset has no tables.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for table in &tables {
            let name = escape_html(&table.name);
            let href = utf8_percent_encode(&table.name, PATH_SEGMENT);
            body.push_str(&format!(
                "<li><a href=\"/api/tables/{href}\">{name}</a> ({} rows)</li>\n",
                table.row_count
            ));
        }
        body.push_str("</ul>\n");
    }
    body.push_str("<p>Ad hoc queries: <code>/api/query?sql=SELECT ...</code></p>\n</body></html>\n");
    Ok(Html(body))
}

/// GET /api/tables
async fn list_tables(State(dataset): State<Dataset>) -> ApiResult<Json<TableListResponse>> {
    Ok(Json(TableListResponse {
        dataset: dataset.file_name(),
        tables: dataset.tables().await?,
    }))
}

/// GET /api/tables/{name}?limit&offset
async fn table_page(
    State(dataset): State<Dataset>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<TablePageResponse>> {
    if !dataset.has_table(&name).await? {
        return Err(ApiError::NotFound(format!("table {name} does not exist")));
    }
    let (limit, offset) = dataset::clamp_page(params.limit, params.offset);
    let total = dataset.row_count(&name).await?;
    let rows = dataset.page(&name, limit, offset).await?;
    Ok(Json(TablePageResponse {
        table: name,
        limit,
        offset,
        total,
        rows,
    }))
}

/// GET /api/query?sql=
async fn run_query(
    State(dataset): State<Dataset>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<QueryResponse>> {
    let sql = params
        .sql
        .ok_or_else(|| ApiError::BadRequest("missing sql parameter".to_string()))?;
    let statement = dataset::read_only_statement(&sql).map_err(ApiError::BadRequest)?;
    let rows = dataset.select(statement).await?;
    Ok(Json(QueryResponse {
        row_count: rows.rows.len(),
        rows,
    }))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
