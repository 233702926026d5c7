//! Response envelope
//!
//! Every endpoint answers `{ "status": bool, "message": [..], "response": .. }`.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: bool,
    pub message: Vec<String>,
    pub response: T,
}

impl<T> Envelope<T> {
    /// Successful response with no messages.
    pub fn ok(response: T) -> Self {
        Self {
            status: true,
            message: Vec::new(),
            response,
        }
    }
}

impl Envelope<serde_json::Value> {
    /// Failed response carrying one message and an empty object.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: vec![message.into()],
            response: serde_json::json!({}),
        }
    }
}
