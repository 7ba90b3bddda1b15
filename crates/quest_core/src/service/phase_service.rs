//! Phase controller: the three event-wide flags.
//!
//! # Invariants
//! - Last write wins; no ordering beyond that.
//! - Unknown flag names are rejected with `InvalidInput`.

use super::{outcome, QuestError, QuestResult};
use crate::db::Store;
use crate::model::phase::{PhaseFlag, PhaseState};
use crate::repo::phase_repo::{PhaseRepository, SqlitePhaseRepository};
use log::info;

pub struct PhaseController<'store> {
    store: &'store Store,
}

impl<'store> PhaseController<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self { store }
    }

    /// Sets a flag by its settings name (`quest_started`, ...).
    pub fn set_flag(&self, name: &str, value: bool) -> QuestResult<()> {
        self.set(parse_flag_name(name)?, value)
    }

    /// Reads a flag by name; unset flags read as `false`.
    pub fn get_flag(&self, name: &str) -> QuestResult<bool> {
        self.get(parse_flag_name(name)?)
    }

    pub fn set(&self, flag: PhaseFlag, value: bool) -> QuestResult<()> {
        let result = self.store.write(|tx| -> QuestResult<()> {
            SqlitePhaseRepository::new(tx).set_flag(flag, value)?;
            Ok(())
        });
        let (status, error_code) = outcome(&result);
        info!(
            "event=phase_set module=phase status={} flag={} value={} error_code={}",
            status,
            flag.key(),
            value,
            error_code
        );
        result
    }

    pub fn get(&self, flag: PhaseFlag) -> QuestResult<bool> {
        self.store
            .read(|tx| -> QuestResult<bool> { Ok(SqlitePhaseRepository::new(tx).get_flag(flag)?) })
    }

    /// Snapshot of all three flags.
    pub fn state(&self) -> QuestResult<PhaseState> {
        self.store.read(|tx| -> QuestResult<PhaseState> {
            Ok(SqlitePhaseRepository::new(tx).load_state()?)
        })
    }

    pub fn open_registration(&self) -> QuestResult<()> {
        self.set(PhaseFlag::RegistrationOpen, true)
    }

    pub fn close_registration(&self) -> QuestResult<()> {
        self.set(PhaseFlag::RegistrationOpen, false)
    }

    /// Starts the quest and clears a previous end marker in one write.
    pub fn begin_quest(&self) -> QuestResult<()> {
        let result = self.store.write(|tx| -> QuestResult<()> {
            let phases = SqlitePhaseRepository::new(tx);
            phases.set_flag(PhaseFlag::QuestStarted, true)?;
            phases.set_flag(PhaseFlag::QuestEnded, false)?;
            Ok(())
        });
        let (status, error_code) = outcome(&result);
        info!(
            "event=quest_begin module=phase status={} error_code={}",
            status, error_code
        );
        result
    }

    pub fn end_quest(&self) -> QuestResult<()> {
        self.set(PhaseFlag::QuestEnded, true)
    }
}

fn parse_flag_name(name: &str) -> QuestResult<PhaseFlag> {
    PhaseFlag::parse(name)
        .ok_or_else(|| QuestError::InvalidInput(format!("unknown phase flag `{}`", name.trim())))
}
