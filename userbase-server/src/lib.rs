//! userbase-server: user store and HTTP API
//!
//! Builds on `userbase-core`:
//! - [`UserStore`]: the five user operations over a [`userbase_core::DatabaseClient`]
//! - [`AppContext`]: the read/write client pair and its lifecycle
//! - `http`: axum routes returning `{status, message, response}` envelopes

pub mod context;
pub mod db;
pub mod http;
pub mod models;

pub use context::AppContext;
pub use db::{StoreError, UserStore};
pub use http::{build_router, run_server, ApiError, Envelope, ServerConfig, ServerError};
