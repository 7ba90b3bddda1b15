//! SQLite storage bootstrap, connection pooling and schema migrations.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the quest ledger.
//! - Apply schema migrations in deterministic order.
//! - Hand out pooled connections scoped to one use-case transaction.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write event data before migrations succeed.
//! - A checked-out connection always returns to its pool, on every exit path.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod migrations;
mod open;
mod pool;

pub use open::{open_db, open_db_in_memory, open_db_with_timeout, DEFAULT_BUSY_TIMEOUT};
pub use pool::{PooledConnection, Store, StoreOptions};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// No pooled connection became available before the wait limit.
    PoolTimeout(Duration),
    /// A thread panicked while holding the pool lock.
    PoolPoisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::PoolTimeout(waited) => write!(
                f,
                "no database connection available after {} ms",
                waited.as_millis()
            ),
            Self::PoolPoisoned => write!(f, "connection pool lock is poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::PoolTimeout(_) => None,
            Self::PoolPoisoned => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
