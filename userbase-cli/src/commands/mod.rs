//! Command implementations for the userbase CLI

pub mod check;
pub mod serve;

use std::time::Duration;

use clap::Args;
use userbase_core::{DatabaseSettings, SslMode};

pub use check::run_check;
pub use serve::run_serve;

/// Connection inputs shared by every command that talks to the database
#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// Read-only (replica) connection string
    #[arg(long, env = "DATABASE_RO_DSN", hide_env_values = true)]
    pub ro_dsn: Option<String>,

    /// Read-write (primary) connection string
    #[arg(long, env = "DATABASE_RW_DSN", hide_env_values = true)]
    pub rw_dsn: Option<String>,

    /// Minimum connections per pool
    #[arg(long, env = "DB_POOL_MIN_SIZE", default_value_t = userbase_core::config::DEFAULT_MIN_SIZE)]
    pub pool_min_size: u32,

    /// Maximum connections per pool
    #[arg(long, env = "DB_POOL_MAX_SIZE", default_value_t = userbase_core::config::DEFAULT_MAX_SIZE)]
    pub pool_max_size: u32,

    /// Transport security (disable, allow, prefer, require, verify-ca, verify-full)
    #[arg(long, env = "DATABASE_SSL_MODE")]
    pub ssl_mode: Option<SslMode>,

    /// Seconds to wait for a free pooled connection
    #[arg(long, env = "DB_POOL_ACQUIRE_TIMEOUT_SECS", default_value_t = 30)]
    pub acquire_timeout_secs: u64,

    /// Seconds a single statement may run (0 = no limit)
    #[arg(long, env = "DB_STATEMENT_TIMEOUT_SECS", default_value_t = 0)]
    pub statement_timeout_secs: u64,
}

impl DatabaseArgs {
    pub fn settings(&self) -> userbase_core::Result<DatabaseSettings> {
        let non_empty = |dsn: &Option<String>| dsn.clone().filter(|v| !v.trim().is_empty());

        let settings = DatabaseSettings {
            read_only_url: non_empty(&self.ro_dsn),
            read_write_url: non_empty(&self.rw_dsn),
            min_size: self.pool_min_size,
            max_size: self.pool_max_size,
            ssl_mode: self.ssl_mode,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            statement_timeout: (self.statement_timeout_secs > 0)
                .then(|| Duration::from_secs(self.statement_timeout_secs)),
        };
        settings.validate()?;
        Ok(settings)
    }
}
