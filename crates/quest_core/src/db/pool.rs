//! Bounded connection pool and per-use-case transaction scope.
//!
//! # Responsibility
//! - Own every SQLite connection used by the services.
//! - Run one use-case inside one transaction on one checked-out connection.
//!
//! # Invariants
//! - At most `max_size` connections are open at once.
//! - In-memory stores hold exactly one connection; every caller shares it.
//! - Waiting for a connection is bounded by the busy timeout.

use super::open::{open_db_in_memory, open_db_with_timeout, DEFAULT_BUSY_TIMEOUT};
use super::{DbError, DbResult};
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Pool sizing and lock wait settings for file-backed stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_size: usize,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_size: 4,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
enum StoreSource {
    File(PathBuf),
    Memory,
}

struct PoolState {
    idle: Vec<Connection>,
    opened: usize,
}

/// Shared handle to the authoritative quest database.
pub struct Store {
    source: StoreSource,
    options: StoreOptions,
    state: Mutex<PoolState>,
    returned: Condvar,
}

impl Store {
    /// Opens a file-backed store. The first connection is opened eagerly so
    /// migrations run once, before any concurrent caller.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let first = open_db_with_timeout(&path, options.busy_timeout)?;
        Ok(Self::with_first_connection(
            StoreSource::File(path),
            StoreOptions {
                max_size: options.max_size.max(1),
                ..options
            },
            first,
        ))
    }

    /// Opens a private in-memory store backed by a single connection.
    pub fn open_in_memory() -> DbResult<Self> {
        let first = open_db_in_memory()?;
        Ok(Self::with_first_connection(
            StoreSource::Memory,
            StoreOptions {
                max_size: 1,
                busy_timeout: DEFAULT_BUSY_TIMEOUT,
            },
            first,
        ))
    }

    fn with_first_connection(source: StoreSource, options: StoreOptions, first: Connection) -> Self {
        Self {
            source,
            options,
            state: Mutex::new(PoolState {
                idle: vec![first],
                opened: 1,
            }),
            returned: Condvar::new(),
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Checks out one connection, opening a new one while under capacity.
    ///
    /// # Errors
    /// - `PoolTimeout` when every connection stays busy past the busy timeout.
    /// - `Sqlite` when opening a new file connection fails.
    pub fn acquire(&self) -> DbResult<PooledConnection<'_>> {
        let deadline = Instant::now() + self.options.busy_timeout;
        let mut state = self.state.lock().map_err(|_| DbError::PoolPoisoned)?;

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(self, conn));
            }

            if state.opened < self.options.max_size {
                state.opened += 1;
                drop(state);
                return match self.open_connection() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn)),
                    Err(err) => {
                        if let Ok(mut state) = self.state.lock() {
                            state.opened -= 1;
                        }
                        self.returned.notify_one();
                        Err(err)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "event=pool_acquire module=db status=timeout max_size={}",
                    self.options.max_size
                );
                return Err(DbError::PoolTimeout(self.options.busy_timeout));
            }

            let (next, _) = self
                .returned
                .wait_timeout(state, deadline - now)
                .map_err(|_| DbError::PoolPoisoned)?;
            state = next;
        }
    }

    /// Runs `work` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so check-then-write sequences inside
    /// `work` cannot interleave with another writer. Commits on `Ok`, rolls
    /// back on `Err`.
    pub fn write<T, E>(&self, work: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        self.run(TransactionBehavior::Immediate, work)
    }

    /// Runs `work` inside one deferred transaction for a consistent read.
    pub fn read<T, E>(&self, work: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        self.run(TransactionBehavior::Deferred, work)
    }

    fn run<T, E>(
        &self,
        behavior: TransactionBehavior,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(DbError::from)?;
        let value = work(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    fn open_connection(&self) -> DbResult<Connection> {
        match &self.source {
            StoreSource::File(path) => {
                debug!("event=pool_grow module=db status=start");
                open_db_with_timeout(path, self.options.busy_timeout)
            }
            // Capacity is pinned to one, so a second memory connection is
            // never requested.
            StoreSource::Memory => open_db_in_memory(),
        }
    }

    fn give_back(&self, conn: Connection) {
        match self.state.lock() {
            Ok(mut state) => state.idle.push(conn),
            Err(_) => {
                warn!("event=pool_release module=db status=error error_code=pool_poisoned");
                return;
            }
        }
        self.returned.notify_one();
    }
}

/// Connection checked out of a [`Store`]; returned to the pool on drop.
pub struct PooledConnection<'store> {
    store: &'store Store,
    conn: Option<Connection>,
}

impl<'store> PooledConnection<'store> {
    fn new(store: &'store Store, conn: Connection) -> Self {
        Self {
            store,
            conn: Some(conn),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is only taken in drop"))
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is only taken in drop"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.give_back(conn);
        }
    }
}
