//! API status endpoint

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::http::Envelope;

/// GET /status
async fn status() -> Json<Envelope<Value>> {
    Json(Envelope {
        status: true,
        message: vec!["API is up and running".to_owned()],
        response: json!({}),
    })
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/status", get(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_is_up() {
        let Json(body) = status().await;
        assert!(body.status);
        assert_eq!(body.message, vec!["API is up and running"]);
    }
}
