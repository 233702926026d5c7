//! In-memory pool connector for tests
//!
//! Pools opened by [`MockConnector`] record every statement, enforce the
//! `max_size` bound with a semaphore, and answer from a FIFO of scripted
//! replies (empty rows / zero affected when the script runs dry).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::pool::{PoolConnector, PoolKind, PoolOptions, StatementPool};
use crate::value::{Row, SqlValue};

/// Scripted reply for the next statement on a pool
#[derive(Debug, Clone)]
pub enum MockReply {
    Rows(Vec<Row>),
    Affected(u64),
    /// Fails the statement with a protocol error carrying this message
    Fail(String),
}

/// A statement a mock pool received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub query: String,
    pub args: Vec<SqlValue>,
    /// `true` for `fetch`, `false` for `execute`
    pub fetched: bool,
}

/// Mock connector handing out [`MockPool`]s
#[derive(Default)]
pub struct MockConnector {
    opened: Mutex<Vec<Arc<MockPool>>>,
    fail_kind: Option<PoolKind>,
    latency: Duration,
    open_latency: Duration,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail for one pool kind.
    pub fn failing_for(mut self, kind: PoolKind) -> Self {
        self.fail_kind = Some(kind);
        self
    }

    /// Hold each statement for `latency` while it owns a connection.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay every `open` by `latency`, as a slow handshake would.
    pub fn with_open_latency(mut self, latency: Duration) -> Self {
        self.open_latency = latency;
        self
    }

    /// All pools opened so far, in order.
    pub fn opened(&self) -> Vec<Arc<MockPool>> {
        self.opened.lock().unwrap().clone()
    }

    /// Most recently opened pool of the given kind.
    pub fn pool(&self, kind: PoolKind) -> Option<Arc<MockPool>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|pool| pool.kind == kind)
            .cloned()
    }
}

#[async_trait]
impl PoolConnector for MockConnector {
    async fn open(
        &self,
        kind: PoolKind,
        dsn: &str,
        options: &PoolOptions,
    ) -> Result<Arc<dyn StatementPool>, sqlx::Error> {
        if !self.open_latency.is_zero() {
            tokio::time::sleep(self.open_latency).await;
        }
        if self.fail_kind == Some(kind) {
            return Err(sqlx::Error::Protocol(format!("{kind} server unreachable")));
        }

        let pool = Arc::new(MockPool {
            kind,
            dsn: dsn.to_owned(),
            options: options.clone(),
            slots: Semaphore::new(options.max_size as usize),
            latency: self.latency,
            replies: Mutex::new(VecDeque::new()),
            statements: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.opened.lock().unwrap().push(Arc::clone(&pool));
        Ok(pool)
    }
}

/// Pool that records statements instead of talking to a server
pub struct MockPool {
    pub kind: PoolKind,
    pub dsn: String,
    pub options: PoolOptions,
    slots: Semaphore,
    latency: Duration,
    replies: Mutex<VecDeque<MockReply>>,
    statements: Mutex<Vec<RecordedStatement>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    closed: AtomicBool,
}

impl MockPool {
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push_reply(MockReply::Rows(rows));
    }

    pub fn push_affected(&self, count: u64) {
        self.push_reply(MockReply::Affected(count));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.push_reply(MockReply::Fail(message.into()));
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last_statement(&self) -> Option<RecordedStatement> {
        self.statements.lock().unwrap().last().cloned()
    }

    /// Highest number of statements that held a connection at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn run(&self, query: &str, args: &[SqlValue], fetched: bool) -> Result<MockReply, sqlx::Error> {
        if self.is_closed() {
            return Err(sqlx::Error::PoolClosed);
        }
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| sqlx::Error::PoolClosed)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.statements.lock().unwrap().push(RecordedStatement {
            query: query.to_owned(),
            args: args.to_vec(),
            fetched,
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(MockReply::Fail(message)) => Err(sqlx::Error::Protocol(message)),
            Some(reply) => Ok(reply),
            None if fetched => Ok(MockReply::Rows(Vec::new())),
            None => Ok(MockReply::Affected(0)),
        }
    }
}

#[async_trait]
impl StatementPool for MockPool {
    async fn fetch(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, sqlx::Error> {
        match self.run(query, args, true).await? {
            MockReply::Rows(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }

    async fn execute(&self, query: &str, args: &[SqlValue]) -> Result<u64, sqlx::Error> {
        match self.run(query, args, false).await? {
            MockReply::Affected(count) => Ok(count),
            MockReply::Rows(rows) => Ok(rows.len() as u64),
            MockReply::Fail(message) => Err(sqlx::Error::Protocol(message)),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.slots.close();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
