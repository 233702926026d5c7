//! User input validation
//!
//! Usernames are alphanumeric; email addresses get a syntax check only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::ValidationError;

/// Maximum length for usernames
const MAX_USERNAME_LEN: usize = 64;

/// Maximum length for email addresses (RFC 5321 path limit)
const MAX_EMAIL_LEN: usize = 254;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("invalid username regex"));

/// local@domain.tld, no whitespace, exactly one @
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("invalid email regex")
});

/// Validated username
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Create a username, validating it is 1-64 ASCII letters or digits.
    ///
    /// # Example
    /// ```
    /// use userbase_server::models::Username;
    ///
    /// assert!(Username::new("alice42").is_ok());
    /// assert!(Username::new("alice_42").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }

        if s.len() > MAX_USERNAME_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: MAX_USERNAME_LEN,
            });
        }

        if !USERNAME_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "must contain only letters and digits",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty {
                field: "email_address",
            });
        }

        if s.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email_address",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "email_address",
                reason: "must be a valid email address",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn default_active() -> bool {
    true
}

/// Body of POST /users
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email_address: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Body of PUT /users/{id}
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email_address: String,
}
