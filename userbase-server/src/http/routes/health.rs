//! Pool health endpoint
//!
//! Reports whether each database client holds the pool its role needs:
//! the reader a read-only or read-write pool, the writer a read-write pool.
//! Answers 503 while either is missing or the clients are shut down.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use userbase_core::DatabaseClient;

use crate::context::AppContext;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClientHealth {
    pub mode: String,
    pub read_pool: bool,
    pub write_pool: bool,
    pub closed: bool,
}

impl ClientHealth {
    fn of(client: &DatabaseClient) -> Self {
        Self {
            mode: client.mode().to_string(),
            read_pool: client.has_read_pool(),
            write_pool: client.has_write_pool(),
            closed: client.is_closed(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub reader: ClientHealth,
    pub writer: ClientHealth,
}

/// GET /health
async fn health(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<HealthResponse>) {
    let reader = ClientHealth::of(ctx.read_client());
    let writer = ClientHealth::of(ctx.write_client());

    let serving = !reader.closed
        && !writer.closed
        && (reader.read_pool || reader.write_pool)
        && writer.write_pool;
    let (code, status) = if serving {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        reader,
        writer,
    };
    (code, Json(body))
}

pub fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/health", get(health))
}
