//! Phase flag storage over the `settings` key/value table.
//!
//! # Invariants
//! - A flag without a row reads as `false`.
//! - Values are stored as the literal text `true` / `false`.

use super::{RepoError, RepoResult};
use crate::model::phase::{PhaseFlag, PhaseState};
use rusqlite::{params, Connection, OptionalExtension};

pub trait PhaseRepository {
    fn get_flag(&self, flag: PhaseFlag) -> RepoResult<bool>;
    fn set_flag(&self, flag: PhaseFlag, value: bool) -> RepoResult<()>;
    fn load_state(&self) -> RepoResult<PhaseState>;
}

pub struct SqlitePhaseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePhaseRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PhaseRepository for SqlitePhaseRepository<'_> {
    fn get_flag(&self, flag: PhaseFlag) -> RepoResult<bool> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                [flag.key()],
                |row| row.get(0),
            )
            .optional()?;

        match value.as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(RepoError::InvalidData(format!(
                "invalid flag value `{other}` for settings key `{}`",
                flag.key()
            ))),
        }
    }

    fn set_flag(&self, flag: PhaseFlag, value: bool) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value)
             VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value;",
            params![flag.key(), if value { "true" } else { "false" }],
        )?;
        Ok(())
    }

    fn load_state(&self) -> RepoResult<PhaseState> {
        let mut state = PhaseState::default();
        for flag in PhaseFlag::ALL {
            state.set(flag, self.get_flag(flag)?);
        }
        Ok(state)
    }
}
