//! Station reservation: take and release.
//!
//! # Responsibility
//! - Grant a free station to the caller's group as one indivisible step.
//! - Clear occupancy on release.
//!
//! # Invariants
//! - Under concurrent takes of one station exactly one caller succeeds; the
//!   others get `AlreadyOccupied`. The take runs in an immediate transaction
//!   and the flip itself is conditional on `is_free = 1`.
//! - A group may hold several stations at once; nothing here prevents it.
//! - Release has no ownership check and is idempotent.

use super::role_service::find_with_role;
use super::{outcome, validate_station_number, Missing, QuestError, QuestResult};
use crate::db::Store;
use crate::model::participant::{Identity, Role};
use crate::model::station::{StationId, StationNumber};
use crate::repo::phase_repo::{PhaseRepository, SqlitePhaseRepository};
use crate::repo::station_repo::{SqliteStationRepository, StationRepository};
use log::info;
use std::time::Instant;

pub struct ReservationService<'store> {
    store: &'store Store,
}

impl<'store> ReservationService<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self { store }
    }

    /// Reserves station `station_number` for the caller's group.
    ///
    /// # Errors
    /// Checked in this order:
    /// - `NotRegistered` when the caller is not a curator with a group.
    /// - `PhaseViolation` before quest start or after quest end.
    /// - `NotFound` for an unknown station.
    /// - `AlreadyOccupied` when the station is taken.
    pub fn take(&self, curator: Identity, station_number: StationNumber) -> QuestResult<StationId> {
        let started_at = Instant::now();
        let result = validate_station_number(station_number).and_then(|number| {
            self.store.write(|tx| -> QuestResult<StationId> {
                let group_id = find_with_role(tx, curator, Role::Curator)?
                    .and_then(|participant| participant.group_id)
                    .ok_or(QuestError::NotRegistered {
                        identity: curator,
                        required: Role::Curator,
                    })?;

                let phase = SqlitePhaseRepository::new(tx).load_state()?;
                if let Some(flag) = phase.take_blocker() {
                    return Err(QuestError::PhaseViolation(flag));
                }

                let stations = SqliteStationRepository::new(tx);
                let station = stations
                    .find_by_number(number)?
                    .ok_or(QuestError::NotFound(Missing::Station(number)))?;
                if !stations.try_occupy(station.id, group_id)? {
                    return Err(QuestError::AlreadyOccupied(number));
                }
                Ok(station.id)
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=station_take module=reservation status={} identity={} station={} duration_ms={} error_code={}",
            status,
            curator,
            station_number,
            started_at.elapsed().as_millis(),
            error_code
        );
        result
    }

    /// Frees station `station_number`. Releasing a free station succeeds.
    ///
    /// An unknown station number is not treated as an already-free station:
    /// it is reported so a mistyped number does not look like a release.
    ///
    /// # Errors
    /// - `NotFound` for an unknown station.
    pub fn release(&self, station_number: StationNumber) -> QuestResult<()> {
        let result = validate_station_number(station_number).and_then(|number| {
            self.store.write(|tx| -> QuestResult<()> {
                if !SqliteStationRepository::new(tx).release_by_number(number)? {
                    return Err(QuestError::NotFound(Missing::Station(number)));
                }
                Ok(())
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=station_release module=reservation status={} station={} error_code={}",
            status, station_number, error_code
        );
        result
    }
}
