//! Connection pool seam
//!
//! [`StatementPool`] is the capability the client needs from a pooled
//! driver: run a parameterized statement on a pooled connection and close.
//! [`PgConnector`] opens sqlx `PgPool`s (CockroachDB speaks the Postgres
//! wire protocol); tests swap in the in-memory connector from `mock`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::config::SslMode;
use crate::value::{Row, SqlValue};

/// Which of the two pools a client owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => f.write_str("read-only"),
            Self::ReadWrite => f.write_str("read-write"),
        }
    }
}

/// Sizing and transport settings applied when a pool is opened
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    pub min_size: u32,
    pub max_size: u32,
    pub ssl_mode: Option<SslMode>,
    pub acquire_timeout: Duration,
    /// Upper bound on one statement; `None` leaves it to the server
    pub statement_timeout: Option<Duration>,
}

/// A bounded pool of connections that can run parameterized statements.
///
/// Each call holds one connection for the duration of one statement and
/// releases it on every exit path. Callers beyond `max_size` wait for a
/// free connection.
#[async_trait]
pub trait StatementPool: Send + Sync {
    /// Run a row-producing statement.
    async fn fetch(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, sqlx::Error>;

    /// Run a statement for its side effect, returning rows affected.
    async fn execute(&self, query: &str, args: &[SqlValue]) -> Result<u64, sqlx::Error>;

    /// Close the pool, waiting for checked-out connections to return.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Opens pools for a [`crate::DatabaseClient`]
#[async_trait]
pub trait PoolConnector: Send + Sync {
    async fn open(
        &self,
        kind: PoolKind,
        dsn: &str,
        options: &PoolOptions,
    ) -> Result<Arc<dyn StatementPool>, sqlx::Error>;
}

/// Production connector backed by sqlx Postgres pools
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

#[async_trait]
impl PoolConnector for PgConnector {
    async fn open(
        &self,
        kind: PoolKind,
        dsn: &str,
        options: &PoolOptions,
    ) -> Result<Arc<dyn StatementPool>, sqlx::Error> {
        let mut connect = PgConnectOptions::from_str(dsn)?;
        if let Some(mode) = options.ssl_mode {
            connect = connect.ssl_mode(mode.into());
        }
        if let Some(limit) = options.statement_timeout {
            // Server-side cancel, so abandoned statements stop running too
            connect = connect.options([("statement_timeout", limit.as_millis().to_string())]);
        }

        let pool = PgPoolOptions::new()
            .min_connections(options.min_size)
            .max_connections(options.max_size)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect)
            .await?;

        tracing::debug!(
            pool = %kind,
            min = options.min_size,
            max = options.max_size,
            "opened connection pool"
        );
        Ok(Arc::new(PgStatementPool { pool }))
    }
}

/// [`StatementPool`] over a sqlx `PgPool`
#[derive(Debug, Clone)]
pub struct PgStatementPool {
    pool: PgPool,
}

impl PgStatementPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatementPool for PgStatementPool {
    async fn fetch(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, sqlx::Error> {
        let rows = bind_all(sqlx::query(query), args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, query: &str, args: &[SqlValue]) -> Result<u64, sqlx::Error> {
        let result = bind_all(sqlx::query(query), args)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// Convert a driver row into column-name/value pairs.
///
/// Only the column types the user schema uses are decoded; anything else
/// is a decode error rather than a silent lossy conversion.
fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            let name = column.name().to_owned();

            if row.try_get_raw(index)?.is_null() {
                return Ok((name, SqlValue::Null));
            }

            let value = match column.type_info().name() {
                "BOOL" => SqlValue::Bool(row.try_get(index)?),
                "INT2" => SqlValue::Int(row.try_get::<i16, _>(index)?.into()),
                "INT4" => SqlValue::Int(row.try_get::<i32, _>(index)?.into()),
                "INT8" => SqlValue::Int(row.try_get(index)?),
                "UUID" => SqlValue::Uuid(row.try_get::<Uuid, _>(index)?),
                "TIMESTAMPTZ" => SqlValue::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
                "TIMESTAMP" => SqlValue::Timestamp(row.try_get::<NaiveDateTime, _>(index)?.and_utc()),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => SqlValue::Text(row.try_get(index)?),
                other => {
                    return Err(sqlx::Error::ColumnDecode {
                        index: name,
                        source: format!("unsupported column type {other}").into(),
                    })
                }
            };
            Ok((name, value))
        })
        .collect()
}
