//! Database client with read/write pool routing
//!
//! # Lifecycle
//!
//! ```text
//! new() ──> connect() ──> execute_read / execute_write ──> disconnect()
//!  idle      connected                                       closed
//! ```
//!
//! A closed client fails every statement with a configuration error.
//! Pools are shared by every caller holding the client; each statement
//! borrows one connection and waits when the pool is at `max_size`.

use std::fmt;
use std::future::Future;
use std::io;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::DatabaseSettings;
use crate::error::{DbError, Result};
use crate::pool::{PgConnector, PoolConnector, PoolKind, PoolOptions, StatementPool};
use crate::value::{Row, SqlValue};

/// Matches a RETURNING clause anywhere in the statement, any case
static RETURNING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\breturning\b").expect("invalid returning regex"));

/// Which pools a client may open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Both,
}

impl AccessMode {
    /// Whether this mode allows opening a pool of the given kind.
    pub fn permits(self, kind: PoolKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Read, PoolKind::ReadOnly) | (Self::Write, PoolKind::ReadWrite)
        )
    }
}

impl FromStr for AccessMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "both" => Ok(Self::Both),
            other => Err(DbError::configuration(format!(
                "invalid access mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Both => f.write_str("both"),
        }
    }
}

/// Result of [`DatabaseClient::execute_write`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The statement had a RETURNING clause
    Rows(Vec<Row>),
    /// Plain write: number of rows affected
    Affected(u64),
}

impl WriteOutcome {
    /// Returned rows; empty for plain writes.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) => Vec::new(),
        }
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Affected(count) => *count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Connecting,
    Connected,
    Closed,
}

struct Pools {
    state: Lifecycle,
    read_only: Option<Arc<dyn StatementPool>>,
    read_write: Option<Arc<dyn StatementPool>>,
}

/// Client owning an optional read-only and an optional read-write pool
pub struct DatabaseClient {
    mode: AccessMode,
    read_only_url: Option<String>,
    read_write_url: Option<String>,
    options: PoolOptions,
    connector: Arc<dyn PoolConnector>,
    pools: RwLock<Pools>,
}

impl fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("DatabaseClient")
            .field("mode", &self.mode)
            .field("state", &pools.state)
            .field("read_only", &pools.read_only.is_some())
            .field("read_write", &pools.read_write.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl DatabaseClient {
    /// Create a client backed by Postgres-protocol pools. Nothing connects
    /// until [`connect`](Self::connect).
    pub fn new(mode: AccessMode, settings: &DatabaseSettings) -> Self {
        Self::with_connector(mode, settings, Arc::new(PgConnector))
    }

    /// Create a client that opens pools through a custom connector.
    pub fn with_connector(
        mode: AccessMode,
        settings: &DatabaseSettings,
        connector: Arc<dyn PoolConnector>,
    ) -> Self {
        Self {
            mode,
            read_only_url: settings.read_only_url.clone(),
            read_write_url: settings.read_write_url.clone(),
            options: settings.pool_options(),
            connector,
            pools: RwLock::new(Pools {
                state: Lifecycle::Idle,
                read_only: None,
                read_write: None,
            }),
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn has_read_pool(&self) -> bool {
        self.pools().read_only.is_some()
    }

    pub fn has_write_pool(&self) -> bool {
        self.pools().read_write.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.pools().state == Lifecycle::Closed
    }

    /// Open every pool the access mode permits and has a connection string for.
    ///
    /// Must be called once per lifecycle; a second call, or a call after
    /// `disconnect()`, is a configuration error. If the second pool fails
    /// to open the first is closed again before the error is returned.
    /// A `disconnect()` that lands while pools are still opening wins: the
    /// new pools are closed and this call fails with a configuration error.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut pools = self.pools_mut();
            match pools.state {
                Lifecycle::Idle => pools.state = Lifecycle::Connecting,
                Lifecycle::Connecting | Lifecycle::Connected => {
                    return Err(DbError::configuration("client is already connected"))
                }
                Lifecycle::Closed => {
                    return Err(DbError::configuration("client has been disconnected"))
                }
            }
        }

        let read_only = match self.open(PoolKind::ReadOnly).await {
            Ok(pool) => pool,
            Err(err) => {
                self.abandon_connect();
                return Err(err);
            }
        };
        let read_write = match self.open(PoolKind::ReadWrite).await {
            Ok(pool) => pool,
            Err(err) => {
                if let Some(pool) = &read_only {
                    pool.close().await;
                }
                self.abandon_connect();
                return Err(err);
            }
        };

        let disconnected = {
            let mut pools = self.pools_mut();
            if pools.state == Lifecycle::Closed {
                true
            } else {
                pools.read_only = read_only.clone();
                pools.read_write = read_write.clone();
                pools.state = Lifecycle::Connected;
                false
            }
        };

        // disconnect() ran while the pools were opening; it found nothing
        // to close, so these pools must not outlive this call
        if disconnected {
            for pool in read_only.iter().chain(read_write.iter()) {
                pool.close().await;
            }
            return Err(DbError::configuration("client has been disconnected"));
        }

        info!(
            mode = %self.mode,
            read_only = read_only.is_some(),
            read_write = read_write.is_some(),
            "database client connected"
        );
        Ok(())
    }

    /// Back out of a failed connect without undoing a concurrent disconnect.
    fn abandon_connect(&self) {
        let mut pools = self.pools_mut();
        if pools.state == Lifecycle::Connecting {
            pools.state = Lifecycle::Idle;
        }
    }

    /// Close every open pool. Safe to call repeatedly or before `connect()`.
    pub async fn disconnect(&self) {
        let (read_only, read_write) = {
            let mut pools = self.pools_mut();
            pools.state = Lifecycle::Closed;
            (pools.read_only.take(), pools.read_write.take())
        };

        let had_pools = read_only.is_some() || read_write.is_some();
        if let Some(pool) = read_only {
            pool.close().await;
        }
        if let Some(pool) = read_write {
            pool.close().await;
        }
        if had_pools {
            info!(mode = %self.mode, "database client disconnected");
        }
    }

    /// Run a row-producing statement.
    ///
    /// Uses the read-only pool when open, otherwise the read-write pool.
    pub async fn execute_read(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        let (kind, pool) = self.read_pool()?;
        debug!(pool = %kind, "executing read statement");
        self.bounded(pool.fetch(query, args)).await
    }

    /// Run a write statement on the read-write pool.
    ///
    /// Statements containing a RETURNING clause produce rows; all others
    /// produce an affected-row count.
    pub async fn execute_write(&self, query: &str, args: &[SqlValue]) -> Result<WriteOutcome> {
        let pool = self.write_pool()?;
        if has_returning_clause(query) {
            debug!(pool = %PoolKind::ReadWrite, "executing returning write statement");
            let rows = self.bounded(pool.fetch(query, args)).await?;
            Ok(WriteOutcome::Rows(rows))
        } else {
            debug!(pool = %PoolKind::ReadWrite, "executing write statement");
            let count = self.bounded(pool.execute(query, args)).await?;
            Ok(WriteOutcome::Affected(count))
        }
    }

    /// Await a statement, giving up after the configured statement timeout.
    ///
    /// Dropping the statement future returns its connection to the pool.
    async fn bounded<T, F>(&self, statement: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let Some(limit) = self.options.statement_timeout else {
            return statement.await.map_err(DbError::database);
        };

        match tokio::time::timeout(limit, statement).await {
            Ok(result) => result.map_err(DbError::database),
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "statement timed out");
                Err(DbError::database(sqlx::Error::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("statement exceeded {}ms", limit.as_millis()),
                ))))
            }
        }
    }

    async fn open(&self, kind: PoolKind) -> Result<Option<Arc<dyn StatementPool>>> {
        let dsn = match kind {
            PoolKind::ReadOnly => self.read_only_url.as_deref(),
            PoolKind::ReadWrite => self.read_write_url.as_deref(),
        };
        let dsn = match dsn {
            Some(dsn) if self.mode.permits(kind) && !dsn.trim().is_empty() => dsn,
            _ => return Ok(None),
        };

        self.connector
            .open(kind, dsn, &self.options)
            .await
            .map(Some)
            .map_err(|source| DbError::connection(kind, source))
    }

    fn read_pool(&self) -> Result<(PoolKind, Arc<dyn StatementPool>)> {
        let pools = self.pools();
        if pools.state == Lifecycle::Closed {
            return Err(DbError::configuration("client has been disconnected"));
        }
        if let Some(pool) = &pools.read_only {
            return Ok((PoolKind::ReadOnly, Arc::clone(pool)));
        }
        if let Some(pool) = &pools.read_write {
            return Ok((PoolKind::ReadWrite, Arc::clone(pool)));
        }
        Err(DbError::configuration(
            "no connection pool (read-only or read-write) is initialized",
        ))
    }

    fn write_pool(&self) -> Result<Arc<dyn StatementPool>> {
        let pools = self.pools();
        if pools.state == Lifecycle::Closed {
            return Err(DbError::configuration("client has been disconnected"));
        }
        pools
            .read_write
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| DbError::configuration("write pool not initialized"))
    }

    fn pools(&self) -> std::sync::RwLockReadGuard<'_, Pools> {
        self.pools.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn pools_mut(&self) -> std::sync::RwLockWriteGuard<'_, Pools> {
        self.pools.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether a statement returns rows via a RETURNING clause.
pub fn has_returning_clause(query: &str) -> bool {
    RETURNING_RE.is_match(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockReply};
    use std::time::Duration;

    fn settings(ro: Option<&str>, rw: Option<&str>) -> DatabaseSettings {
        DatabaseSettings {
            read_only_url: ro.map(str::to_owned),
            read_write_url: rw.map(str::to_owned),
            min_size: 1,
            max_size: 3,
            ..Default::default()
        }
    }

    fn test_client(
        mode: AccessMode,
        ro: Option<&str>,
        rw: Option<&str>,
    ) -> (DatabaseClient, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::new());
        let client = DatabaseClient::with_connector(mode, &settings(ro, rw), connector.clone());
        (client, connector)
    }

    const RO: &str = "postgres://replica/users";
    const RW: &str = "postgres://primary/users";

    #[tokio::test]
    async fn connect_opens_only_permitted_pools() {
        let cases = [
            (AccessMode::Read, Some(RO), Some(RW), true, false),
            (AccessMode::Write, Some(RO), Some(RW), false, true),
            (AccessMode::Both, Some(RO), Some(RW), true, true),
            (AccessMode::Both, Some(RO), None, true, false),
            (AccessMode::Both, None, Some(RW), false, true),
            (AccessMode::Both, Some(""), Some(RW), false, true),
            (AccessMode::Read, None, Some(RW), false, false),
        ];

        for (mode, ro, rw, want_ro, want_rw) in cases {
            let (client, connector) = test_client(mode, ro, rw);
            client.connect().await.unwrap();

            assert_eq!(client.has_read_pool(), want_ro, "{mode} ro={ro:?} rw={rw:?}");
            assert_eq!(client.has_write_pool(), want_rw, "{mode} ro={ro:?} rw={rw:?}");
            assert_eq!(connector.pool(PoolKind::ReadOnly).is_some(), want_ro);
            assert_eq!(connector.pool(PoolKind::ReadWrite).is_some(), want_rw);

            client.disconnect().await;
            assert!(!client.has_read_pool());
            assert!(!client.has_write_pool());
            assert!(connector.opened().iter().all(|pool| pool.is_closed()));
        }
    }

    #[tokio::test]
    async fn pools_receive_sizing_and_dsn() {
        let (client, connector) = test_client(AccessMode::Read, Some(RO), None);
        client.connect().await.unwrap();

        let pool = connector.pool(PoolKind::ReadOnly).unwrap();
        assert_eq!(pool.dsn, RO);
        assert_eq!(pool.options.min_size, 1);
        assert_eq!(pool.options.max_size, 3);
    }

    #[tokio::test]
    async fn connect_failure_is_connection_error() {
        let connector = Arc::new(MockConnector::new().failing_for(PoolKind::ReadWrite));
        let client = DatabaseClient::with_connector(
            AccessMode::Both,
            &settings(Some(RO), Some(RW)),
            connector.clone(),
        );

        let err = client.connect().await.unwrap_err();
        assert!(err.is_connection());
        assert!(!client.has_read_pool());
        // The read-only pool that did open was closed again
        assert!(connector.pool(PoolKind::ReadOnly).unwrap().is_closed());
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (client, connector) = test_client(AccessMode::Read, Some(RO), None);
        client.connect().await.unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(connector.opened().len(), 1);
    }

    #[tokio::test]
    async fn read_prefers_read_only_pool() {
        let (client, connector) = test_client(AccessMode::Both, Some(RO), Some(RW));
        client.connect().await.unwrap();

        client.execute_read("SELECT 1", &[]).await.unwrap();

        assert_eq!(connector.pool(PoolKind::ReadOnly).unwrap().statements().len(), 1);
        assert!(connector.pool(PoolKind::ReadWrite).unwrap().statements().is_empty());
    }

    #[tokio::test]
    async fn read_falls_back_to_write_pool() {
        let (client, connector) = test_client(AccessMode::Write, None, Some(RW));
        client.connect().await.unwrap();

        let pool = connector.pool(PoolKind::ReadWrite).unwrap();
        pool.push_rows(vec![Row::new().with("n", 1i64)]);

        let rows = client.execute_read("SELECT 1 AS n", &[]).await.unwrap();
        assert_eq!(rows, vec![Row::new().with("n", 1i64)]);
        assert_eq!(pool.statements().len(), 1);
    }

    #[tokio::test]
    async fn read_without_pools_is_configuration_error() {
        let (client, _) = test_client(AccessMode::Both, None, None);
        client.connect().await.unwrap();

        let err = client.execute_read("SELECT 1", &[]).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no connection pool"));
    }

    #[tokio::test]
    async fn write_requires_write_pool() {
        let (client, connector) = test_client(AccessMode::Read, Some(RO), Some(RW));
        client.connect().await.unwrap();

        let err = client
            .execute_write("UPDATE users SET active = $1", &[true.into()])
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(connector.pool(PoolKind::ReadOnly).unwrap().statements().is_empty());
    }

    #[tokio::test]
    async fn returning_clause_yields_rows() {
        let (client, connector) = test_client(AccessMode::Write, None, Some(RW));
        client.connect().await.unwrap();
        let pool = connector.pool(PoolKind::ReadWrite).unwrap();
        pool.push_rows(vec![Row::new().with("id", "abc")]);

        let outcome = client
            .execute_write("INSERT INTO users (username) VALUES ($1) returning id", &["bob".into()])
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Rows(vec![Row::new().with("id", "abc")]));
        assert!(pool.last_statement().unwrap().fetched);
    }

    #[tokio::test]
    async fn plain_write_yields_count_never_rows() {
        let (client, connector) = test_client(AccessMode::Write, None, Some(RW));
        client.connect().await.unwrap();
        let pool = connector.pool(PoolKind::ReadWrite).unwrap();
        pool.push_affected(2);

        let outcome = client
            .execute_write("UPDATE users SET active = $1", &[false.into()])
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Affected(2));
        let statement = pool.last_statement().unwrap();
        assert!(!statement.fetched);
        assert_eq!(statement.args, vec![SqlValue::Bool(false)]);
    }

    #[tokio::test]
    async fn driver_errors_become_database_errors() {
        let (client, connector) = test_client(AccessMode::Both, Some(RO), Some(RW));
        client.connect().await.unwrap();
        connector
            .pool(PoolKind::ReadOnly)
            .unwrap()
            .push_reply(MockReply::Fail("relation \"users\" does not exist".into()));

        let err = client.execute_read("SELECT * FROM users", &[]).await.unwrap_err();
        assert!(err.is_database());

        // The pool is still usable afterwards
        client.execute_read("SELECT 1", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_fails_fast_afterwards() {
        let (client, _) = test_client(AccessMode::Both, Some(RO), Some(RW));
        client.connect().await.unwrap();

        client.disconnect().await;
        client.disconnect().await;

        assert!(client.is_closed());
        assert!(client.execute_read("SELECT 1", &[]).await.unwrap_err().is_configuration());
        assert!(client
            .execute_write("DELETE FROM users", &[])
            .await
            .unwrap_err()
            .is_configuration());
        assert!(client.connect().await.unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_safe() {
        let (client, connector) = test_client(AccessMode::Both, Some(RO), Some(RW));
        client.disconnect().await;
        assert!(connector.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_pool_queues_instead_of_failing() {
        let latency = Duration::from_millis(100);
        let connector = Arc::new(MockConnector::new().with_latency(latency));
        let client = Arc::new(DatabaseClient::with_connector(
            AccessMode::Read,
            &settings(Some(RO), None),
            connector.clone(),
        ));
        client.connect().await.unwrap();

        let max_size = 3;
        let started = tokio::time::Instant::now();
        let handles: Vec<_> = (0..=max_size)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client.execute_read("SELECT $1::INT8", &[SqlValue::Int(i)]).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.expect("task panicked").expect("read failed");
        }

        let pool = connector.pool(PoolKind::ReadOnly).unwrap();
        assert_eq!(pool.statements().len(), max_size as usize + 1);
        assert_eq!(pool.peak_in_flight(), max_size as usize);
        // The extra request waited for a slot: two rounds of latency
        assert!(started.elapsed() >= latency * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_connect_wins() {
        let connector = Arc::new(MockConnector::new().with_open_latency(Duration::from_millis(50)));
        let client = Arc::new(DatabaseClient::with_connector(
            AccessMode::Both,
            &settings(Some(RO), Some(RW)),
            connector.clone(),
        ));

        let connecting = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.disconnect().await;

        let err = connecting.await.expect("task panicked").unwrap_err();
        assert!(err.is_configuration());
        assert!(client.is_closed());
        assert!(!client.has_read_pool());
        assert!(!client.has_write_pool());
        assert!(client.execute_read("SELECT 1", &[]).await.unwrap_err().is_configuration());
        assert_eq!(connector.opened().len(), 2);
        assert!(connector.opened().iter().all(|pool| pool.is_closed()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_after_disconnect_stays_closed() {
        let connector = Arc::new(
            MockConnector::new()
                .with_open_latency(Duration::from_millis(50))
                .failing_for(PoolKind::ReadWrite),
        );
        let client = Arc::new(DatabaseClient::with_connector(
            AccessMode::Both,
            &settings(Some(RO), Some(RW)),
            connector.clone(),
        ));

        let connecting = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.disconnect().await;

        assert!(connecting.await.expect("task panicked").unwrap_err().is_connection());
        assert!(client.is_closed());
        assert!(client.connect().await.unwrap_err().is_configuration());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_statement_times_out() {
        let connector = Arc::new(MockConnector::new().with_latency(Duration::from_secs(10)));
        let settings = DatabaseSettings {
            statement_timeout: Some(Duration::from_secs(2)),
            ..settings(Some(RO), None)
        };
        let client = DatabaseClient::with_connector(AccessMode::Read, &settings, connector.clone());
        client.connect().await.unwrap();

        let started = tokio::time::Instant::now();
        let err = client.execute_read("SELECT pg_sleep(10)", &[]).await.unwrap_err();

        assert!(err.is_database());
        assert!(err.to_string().contains("statement exceeded 2000ms"));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(
            connector.pool(PoolKind::ReadOnly).unwrap().options.statement_timeout,
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn returning_detection() {
        assert!(has_returning_clause("INSERT INTO t VALUES ($1) RETURNING id"));
        assert!(has_returning_clause("insert into t values ($1)\n returning id"));
        assert!(!has_returning_clause("UPDATE t SET a = $1"));
        assert!(!has_returning_clause("UPDATE t SET returning_user = $1"));
    }

    #[test]
    fn access_mode_permits() {
        assert!(AccessMode::Read.permits(PoolKind::ReadOnly));
        assert!(!AccessMode::Read.permits(PoolKind::ReadWrite));
        assert!(AccessMode::Write.permits(PoolKind::ReadWrite));
        assert!(!AccessMode::Write.permits(PoolKind::ReadOnly));
        assert!(AccessMode::Both.permits(PoolKind::ReadOnly));
        assert!(AccessMode::Both.permits(PoolKind::ReadWrite));
        assert_eq!("WRITE".parse::<AccessMode>().unwrap(), AccessMode::Write);
        assert!("sometimes".parse::<AccessMode>().is_err());
    }
}
