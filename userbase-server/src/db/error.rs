//! Store error type

use userbase_core::DbError;

/// Failure of a user store operation.
///
/// Carries the operation that failed and the client error that caused it;
/// raw driver errors never escape the store unwrapped.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: DbError,
    },

    #[error("failed to {operation}: {reason}")]
    UnexpectedResult {
        operation: &'static str,
        reason: &'static str,
    },
}

impl StoreError {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Query { operation, .. } | Self::UnexpectedResult { operation, .. } => operation,
        }
    }

    /// The underlying client error, if the failure came from the client.
    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            Self::Query { source, .. } => Some(source),
            Self::UnexpectedResult { .. } => None,
        }
    }
}

/// Attach the operation name to a client error.
pub(crate) fn context(operation: &'static str) -> impl FnOnce(DbError) -> StoreError {
    move |source| StoreError::Query { operation, source }
}
