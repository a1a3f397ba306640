//! SQLite persistence for the person, court, playing and waiting relations.

/// Parameterized row access used by the engine, auditor and roster.
pub mod rows;
/// Table creation and removal with bounded visibility polling.
pub mod schema;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;

use crate::{
    clock::{Clock, SystemClock},
    config::StoreConfig,
    error::CoreResult,
};

/// Owner of one SQLite connection plus the clock used for queue timestamps.
pub struct Store {
    conn: Connection,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl Store {
    /// Opens the database described by `config`, creating tables if needed.
    ///
    /// File-backed databases use WAL mode with `synchronous=NORMAL`.
    pub fn open(config: StoreConfig) -> CoreResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Self::init_connection(conn, config)
    }

    /// Opens or creates a file-backed store at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open(StoreConfig {
            path: Some(path.as_ref().to_path_buf()),
            ..StoreConfig::default()
        })
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(StoreConfig::default())
    }

    /// Replaces the clock used for queue timestamps and schema polling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the bcrypt work factor used for new credential hashes.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.config.hash_cost = cost;
        self
    }

    fn init_connection(conn: Connection, config: StoreConfig) -> CoreResult<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if config.path.is_some() {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(Self {
            conn,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// Read access to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Clock used for queue timestamps.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Settings the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn split_mut(&mut self) -> (&mut Connection, &dyn Clock) {
        (&mut self.conn, self.clock.as_ref())
    }

    /// Creates any missing tables and waits until all are visible.
    pub fn create_tables(&self) -> CoreResult<()> {
        schema::create_tables(&self.conn, self.clock(), &self.config.schema_retry)
    }

    /// Drops all tables and waits until none remain visible.
    pub fn drop_tables(&self) -> CoreResult<()> {
        schema::drop_tables(&self.conn, self.clock(), &self.config.schema_retry)
    }
}
