//! Database configuration loaded from environment variables
//!
//! - `DATABASE_RO_DSN`: read-only (replica) connection string
//! - `DATABASE_RW_DSN`: read-write (primary) connection string
//! - `DB_POOL_MIN_SIZE`: minimum idle connections per pool (default: 1)
//! - `DB_POOL_MAX_SIZE`: maximum connections per pool (default: 15)
//! - `DATABASE_SSL_MODE`: transport security override (default: from DSN)
//! - `DB_POOL_ACQUIRE_TIMEOUT_SECS`: wait bound for a free connection (default: 30)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgSslMode;

use crate::error::{DbError, Result};
use crate::pool::PoolOptions;

pub const DB_RO_VAR: &str = "DATABASE_RO_DSN";
pub const DB_RW_VAR: &str = "DATABASE_RW_DSN";
pub const DB_POOL_MIN_SIZE_VAR: &str = "DB_POOL_MIN_SIZE";
pub const DB_POOL_MAX_SIZE_VAR: &str = "DB_POOL_MAX_SIZE";
pub const DB_SSL_MODE_VAR: &str = "DATABASE_SSL_MODE";
pub const DB_ACQUIRE_TIMEOUT_VAR: &str = "DB_POOL_ACQUIRE_TIMEOUT_SECS";
pub const DB_STATEMENT_TIMEOUT_VAR: &str = "DB_STATEMENT_TIMEOUT_SECS";

pub const DEFAULT_MIN_SIZE: u32 = 1;
pub const DEFAULT_MAX_SIZE: u32 = 15;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport security setting applied to every pool a client opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl FromStr for SslMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(DbError::configuration(format!(
                "invalid ssl mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        };
        f.write_str(s)
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Connection strings and pool sizing shared by the read and write clients
#[derive(Clone)]
pub struct DatabaseSettings {
    pub read_only_url: Option<String>,
    pub read_write_url: Option<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub ssl_mode: Option<SslMode>,
    pub acquire_timeout: Duration,
    /// Unset or zero means statements are not bounded client-side
    pub statement_timeout: Option<Duration>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            read_only_url: None,
            read_write_url: None,
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            ssl_mode: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            statement_timeout: None,
        }
    }
}

// Connection strings carry credentials; keep them out of logs.
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("read_only_url", &self.read_only_url.as_ref().map(|_| "<redacted>"))
            .field("read_write_url", &self.read_write_url.as_ref().map(|_| "<redacted>"))
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("ssl_mode", &self.ssl_mode)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl DatabaseSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup (for testing).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let min_size = match non_empty(DB_POOL_MIN_SIZE_VAR) {
            Some(raw) => parse_number(DB_POOL_MIN_SIZE_VAR, &raw)?,
            None => DEFAULT_MIN_SIZE,
        };
        let max_size = match non_empty(DB_POOL_MAX_SIZE_VAR) {
            Some(raw) => parse_number(DB_POOL_MAX_SIZE_VAR, &raw)?,
            None => DEFAULT_MAX_SIZE,
        };
        let ssl_mode = non_empty(DB_SSL_MODE_VAR)
            .map(|raw| raw.parse::<SslMode>())
            .transpose()?;
        let acquire_timeout = match non_empty(DB_ACQUIRE_TIMEOUT_VAR) {
            Some(raw) => Duration::from_secs(u64::from(parse_number(DB_ACQUIRE_TIMEOUT_VAR, &raw)?)),
            None => DEFAULT_ACQUIRE_TIMEOUT,
        };
        let statement_timeout = match non_empty(DB_STATEMENT_TIMEOUT_VAR) {
            Some(raw) => match parse_number(DB_STATEMENT_TIMEOUT_VAR, &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(u64::from(secs))),
            },
            None => None,
        };

        let settings = Self {
            read_only_url: non_empty(DB_RO_VAR),
            read_write_url: non_empty(DB_RW_VAR),
            min_size,
            max_size,
            ssl_mode,
            acquire_timeout,
            statement_timeout,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check pool bounds are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(DbError::configuration("pool max size must be at least 1"));
        }
        if self.min_size > self.max_size {
            return Err(DbError::configuration(format!(
                "pool min size {} exceeds max size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            min_size: self.min_size,
            max_size: self.max_size,
            ssl_mode: self.ssl_mode,
            acquire_timeout: self.acquire_timeout,
            statement_timeout: self.statement_timeout,
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .map_err(|_| DbError::configuration(format!("{key} must be a non-negative integer, got '{raw}'")))
}
