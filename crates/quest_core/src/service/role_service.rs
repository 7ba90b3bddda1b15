//! Role registry: curators, organizers and admins.
//!
//! # Responsibility
//! - Register curators (creating groups on first sight) and organizers.
//! - Resolve a caller's role and association for the other services.
//!
//! # Invariants
//! - At most one curator per group and one organizer per station. The check
//!   and the upsert share one immediate transaction, and the unique indexes
//!   back it up.
//! - Re-registering an identity overwrites its role and association.

use super::{
    outcome, validate_group_number, validate_station_number, Missing, QuestError, QuestResult,
    RoleSlot,
};
use crate::db::Store;
use crate::model::group::{Group, GroupId};
use crate::model::participant::{Identity, Participant, ParticipantId, Role};
use crate::model::phase::PhaseFlag;
use crate::model::station::{Station, StationId, StationNumber};
use crate::repo::ledger_repo::{LedgerRepository, SqliteLedgerRepository};
use crate::repo::participant_repo::{ParticipantRepository, SqliteParticipantRepository};
use crate::repo::phase_repo::{PhaseRepository, SqlitePhaseRepository};
use crate::repo::station_repo::{SqliteStationRepository, StationRepository};
use crate::repo::RepoError;
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuratorRegistration {
    pub group_id: GroupId,
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizerRegistration {
    pub station_id: StationId,
    pub participant_id: ParticipantId,
}

pub struct RoleRegistry<'store> {
    store: &'store Store,
}

impl<'store> RoleRegistry<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self { store }
    }

    /// Registers `identity` as curator of the group numbered `group_number`.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed group number.
    /// - `AlreadyRegistered` when another identity curates that group.
    pub fn register_curator(
        &self,
        identity: Identity,
        group_number: &str,
    ) -> QuestResult<CuratorRegistration> {
        let result = validate_group_number(group_number).and_then(|number| {
            self.store.write(|tx| -> QuestResult<CuratorRegistration> {
                let group = SqliteLedgerRepository::new(tx).get_or_create_group(number)?;
                let participants = SqliteParticipantRepository::new(tx);
                if let Some(holder) = participants.curator_of_group(group.id)? {
                    if holder.identity != identity {
                        return Err(curator_slot_taken(number));
                    }
                }
                let participant_id = participants
                    .upsert_curator(identity, group.id)
                    .map_err(|err| slot_conflict(err, || curator_slot_taken(number)))?;
                Ok(CuratorRegistration {
                    group_id: group.id,
                    participant_id,
                })
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=register_curator module=roles status={} identity={} group={} error_code={}",
            status,
            identity,
            group_number.trim(),
            error_code
        );
        result
    }

    /// Registers `identity` as organizer of station `station_number`.
    ///
    /// # Errors
    /// - `PhaseViolation` unless organizer registration is open.
    /// - `NotFound` for an unknown station.
    /// - `AlreadyRegistered` when another identity runs that station.
    pub fn register_organizer(
        &self,
        identity: Identity,
        station_number: StationNumber,
    ) -> QuestResult<OrganizerRegistration> {
        let result = validate_station_number(station_number).and_then(|number| {
            self.store.write(|tx| -> QuestResult<OrganizerRegistration> {
                if !SqlitePhaseRepository::new(tx).get_flag(PhaseFlag::RegistrationOpen)? {
                    return Err(QuestError::PhaseViolation(PhaseFlag::RegistrationOpen));
                }
                let station = SqliteStationRepository::new(tx)
                    .find_by_number(number)?
                    .ok_or(QuestError::NotFound(Missing::Station(number)))?;
                let participants = SqliteParticipantRepository::new(tx);
                if let Some(holder) = participants.organizer_of_station(station.id)? {
                    if holder.identity != identity {
                        return Err(organizer_slot_taken(number));
                    }
                }
                let participant_id = participants
                    .upsert_organizer(identity, station.id)
                    .map_err(|err| slot_conflict(err, || organizer_slot_taken(number)))?;
                Ok(OrganizerRegistration {
                    station_id: station.id,
                    participant_id,
                })
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=register_organizer module=roles status={} identity={} station={} error_code={}",
            status, identity, station_number, error_code
        );
        result
    }

    /// Grants the admin role, dropping any previous association.
    pub fn grant_admin(&self, identity: Identity) -> QuestResult<ParticipantId> {
        let result = self.store.write(|tx| -> QuestResult<ParticipantId> {
            Ok(SqliteParticipantRepository::new(tx).upsert_admin(identity)?)
        });
        let (status, error_code) = outcome(&result);
        info!(
            "event=grant_admin module=roles status={} identity={} error_code={}",
            status, identity, error_code
        );
        result
    }

    pub fn participant(&self, identity: Identity) -> QuestResult<Option<Participant>> {
        self.store.read(|tx| -> QuestResult<Option<Participant>> {
            Ok(SqliteParticipantRepository::new(tx).find_by_identity(identity)?)
        })
    }

    /// `None` when the identity never registered.
    pub fn role_of(&self, identity: Identity) -> QuestResult<Option<Role>> {
        Ok(self.participant(identity)?.map(|participant| participant.role))
    }

    /// Group curated by `identity`, if it is a curator.
    pub fn group_of(&self, identity: Identity) -> QuestResult<Option<Group>> {
        self.store.read(|tx| -> QuestResult<Option<Group>> {
            match find_with_role(tx, identity, Role::Curator)?.and_then(|p| p.group_id) {
                Some(group_id) => Ok(SqliteLedgerRepository::new(tx).find_group_by_id(group_id)?),
                None => Ok(None),
            }
        })
    }

    /// Station run by `identity`, if it is an organizer.
    pub fn station_of(&self, identity: Identity) -> QuestResult<Option<Station>> {
        self.store.read(|tx| -> QuestResult<Option<Station>> {
            match find_with_role(tx, identity, Role::Organizer)?.and_then(|p| p.station_id) {
                Some(station_id) => Ok(SqliteStationRepository::new(tx).find_by_id(station_id)?),
                None => Ok(None),
            }
        })
    }

    /// Identity of the curator of `group_id`, for notifications.
    pub fn curator_of_group(&self, group_id: GroupId) -> QuestResult<Option<Identity>> {
        self.store.read(|tx| -> QuestResult<Option<Identity>> {
            Ok(SqliteParticipantRepository::new(tx)
                .curator_of_group(group_id)?
                .map(|participant| participant.identity))
        })
    }

    /// Every registered identity, for broadcast fan-out by callers.
    pub fn registered_identities(&self) -> QuestResult<Vec<Identity>> {
        self.store.read(|tx| -> QuestResult<Vec<Identity>> {
            Ok(SqliteParticipantRepository::new(tx).list_identities()?)
        })
    }

    /// Resolves the caller once and checks it holds one of `allowed`.
    ///
    /// The first entry of `allowed` is reported as the required role.
    pub fn require_role(&self, identity: Identity, allowed: &[Role]) -> QuestResult<Participant> {
        let required = allowed.first().copied().unwrap_or(Role::Admin);
        match self.participant(identity)? {
            Some(participant) if allowed.contains(&participant.role) => Ok(participant),
            _ => Err(QuestError::NotRegistered { identity, required }),
        }
    }
}

/// Loads the participant only when it holds `role`.
pub(crate) fn find_with_role(
    conn: &Connection,
    identity: Identity,
    role: Role,
) -> QuestResult<Option<Participant>> {
    Ok(SqliteParticipantRepository::new(conn)
        .find_by_identity(identity)?
        .filter(|participant| participant.role == role))
}

fn curator_slot_taken(number: &str) -> QuestError {
    QuestError::AlreadyRegistered(RoleSlot::GroupCurator(number.to_string()))
}

fn organizer_slot_taken(number: StationNumber) -> QuestError {
    QuestError::AlreadyRegistered(RoleSlot::StationOrganizer(number))
}

fn slot_conflict(err: RepoError, taken: impl FnOnce() -> QuestError) -> QuestError {
    if err.is_unique_violation() {
        taken()
    } else {
        QuestError::StorageUnavailable(err)
    }
}
