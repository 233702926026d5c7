//! userbase-core: database client with read/write pool routing
//!
//! A [`DatabaseClient`] owns up to two connection pools (read-only and
//! read-write) selected by its [`AccessMode`]. Reads prefer the read-only
//! pool and fall back to the read-write one; writes always use the
//! read-write pool.

pub mod client;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod pool;
pub mod value;

pub use client::{AccessMode, DatabaseClient, WriteOutcome};
pub use config::{DatabaseSettings, SslMode};
pub use error::{DbError, Result};
pub use pool::{PgConnector, PoolConnector, PoolKind, PoolOptions, StatementPool};
pub use value::{Row, SqlValue};
