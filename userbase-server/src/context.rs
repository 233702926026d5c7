//! Application context shared across handlers
//!
//! Holds the process-wide pair of database clients: a read-mode client
//! for the replica and a write-mode client for the primary. Handlers ask
//! for a fresh [`UserStore`] per request; stores share the clients' pools.

use std::future::Future;
use std::sync::Arc;

use userbase_core::{AccessMode, DatabaseClient, DatabaseSettings, DbError, PoolConnector};

use crate::db::UserStore;

/// Shared application context
#[derive(Debug, Clone)]
pub struct AppContext {
    reader: Arc<DatabaseClient>,
    writer: Arc<DatabaseClient>,
}

impl AppContext {
    /// Build both clients from settings. Nothing connects yet.
    pub fn new(settings: &DatabaseSettings) -> Self {
        Self::from_clients(
            DatabaseClient::new(AccessMode::Read, settings),
            DatabaseClient::new(AccessMode::Write, settings),
        )
    }

    /// Build both clients over a custom pool connector.
    pub fn with_connector(settings: &DatabaseSettings, connector: Arc<dyn PoolConnector>) -> Self {
        Self::from_clients(
            DatabaseClient::with_connector(AccessMode::Read, settings, Arc::clone(&connector)),
            DatabaseClient::with_connector(AccessMode::Write, settings, connector),
        )
    }

    pub fn from_clients(reader: DatabaseClient, writer: DatabaseClient) -> Self {
        Self {
            reader: Arc::new(reader),
            writer: Arc::new(writer),
        }
    }

    /// Connect the read client, then the write client.
    ///
    /// If the write client fails the read client is disconnected again.
    pub async fn connect(&self) -> Result<(), DbError> {
        self.reader.connect().await?;
        if let Err(err) = self.writer.connect().await {
            self.reader.disconnect().await;
            return Err(err);
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.reader.disconnect().await;
        self.writer.disconnect().await;
    }

    /// Connect, run `work`, and disconnect whatever `work` returned.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        self.connect().await?;
        let result = work.await;
        self.disconnect().await;
        if result.is_err() {
            tracing::warn!("shut down after error; database clients disconnected");
        }
        result
    }

    /// Store bound to the read client (replica).
    pub fn reader(&self) -> UserStore<'_> {
        UserStore::new(&self.reader)
    }

    /// Store bound to the write client (primary). Also used for
    /// read-after-write so a fresh row is visible immediately.
    pub fn writer(&self) -> UserStore<'_> {
        UserStore::new(&self.writer)
    }

    pub fn read_client(&self) -> &DatabaseClient {
        &self.reader
    }

    pub fn write_client(&self) -> &DatabaseClient {
        &self.writer
    }
}
