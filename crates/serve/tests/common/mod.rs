#![allow(dead_code)]

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower::ServiceExt;

/// Number of rows seeded into the `efficiency` table.
pub const EFFICIENCY_ROWS: i64 = 150;

/// Write a small results database: `efficiency` with
/// [`EFFICIENCY_ROWS`] rows and `commodities` with a NULL cell.
pub async fn seed_dataset(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("create dataset");

    for statement in [
        "CREATE TABLE efficiency (region TEXT, tech TEXT, value REAL, vintage INTEGER)",
        "WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 150) \
         INSERT INTO efficiency SELECT 'R1', 'E' || x, x * 0.5, 2000 + x FROM seq",
        "CREATE TABLE commodities (name TEXT, flag TEXT)",
        "INSERT INTO commodities VALUES ('electricity', 'd'), ('ethos', NULL)",
    ] {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("seed statement");
    }
    pool.close().await;
}

/// Run one extra statement against an existing dataset file.
pub async fn execute(path: &Path, statement: &str) {
    let options = SqliteConnectOptions::new().filename(path);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("open dataset");
    sqlx::query(statement)
        .execute(&pool)
        .await
        .expect("extra statement");
    pool.close().await;
}

/// Send a GET through the router without binding a socket.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}
