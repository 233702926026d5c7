/// Structured error types for the database client.
///
/// Every failure the client surfaces falls into one of three kinds so
/// callers can branch on cause instead of matching message strings.
use thiserror::Error;

use crate::pool::PoolKind;

/// Main error type for database client operations
#[derive(Error, Debug)]
pub enum DbError {
    /// No pool is available for the requested operation, or the client
    /// was configured inconsistently. Fatal to the call, not the process.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A pool could not be established during `connect()`
    #[error("failed to open {kind} pool: {source}")]
    Connection {
        kind: PoolKind,
        #[source]
        source: sqlx::Error,
    },

    /// A statement failed against an established pool
    #[error("statement failed: {source}")]
    Database {
        #[source]
        source: sqlx::Error,
    },
}

/// Result type alias for database client operations
pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a connection error for the given pool kind
    pub fn connection(kind: PoolKind, source: sqlx::Error) -> Self {
        Self::Connection { kind, source }
    }

    /// Wrap a driver error raised while running a statement
    pub fn database(source: sqlx::Error) -> Self {
        Self::Database { source }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database { .. })
    }
}
