//! Request validation failures
//!
//! Every variant maps to a 400 envelope at the HTTP layer.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Value present but not in the accepted shape (username charset, email syntax, UUID)
    #[error("{field}: {reason}")]
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Query string or body the extractor could not decode
    #[error("malformed {part}: {detail}")]
    Malformed { part: &'static str, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        let err = ValidationError::TooLong {
            field: "username",
            max: 64,
        };
        assert_eq!(err.to_string(), "username exceeds maximum length of 64 characters");

        let err = ValidationError::InvalidFormat {
            field: "email_address",
            reason: "must look like name@example.com",
        };
        assert_eq!(err.to_string(), "email_address: must look like name@example.com");
    }

    #[test]
    fn malformed_carries_detail() {
        let err = ValidationError::Malformed {
            part: "query string",
            detail: "limit: invalid digit found in string".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed query string: limit: invalid digit found in string"
        );
    }
}
