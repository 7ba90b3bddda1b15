//! Station registry: the fixed station set and its occupancy view.

use super::role_service::find_with_role;
use super::{outcome, validate_station_number, Missing, QuestError, QuestResult};
use crate::db::Store;
use crate::model::participant::{Identity, Role};
use crate::model::station::{FreeStation, OrganizerStation, Station, StationNumber, StationSeed};
use crate::repo::ledger_repo::{LedgerRepository, SqliteLedgerRepository};
use crate::repo::station_repo::{SqliteStationRepository, StationRepository};
use log::info;
use std::collections::HashSet;

pub struct StationRegistry<'store> {
    store: &'store Store,
}

impl<'store> StationRegistry<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self { store }
    }

    /// Inserts the provisioning list when no station exists yet.
    ///
    /// Returns how many stations were inserted; `0` when stations were
    /// already provisioned.
    pub fn seed(&self, seeds: &[StationSeed]) -> QuestResult<u32> {
        let result = validate_seeds(seeds).and_then(|()| {
            self.store.write(|tx| -> QuestResult<u32> {
                let stations = SqliteStationRepository::new(tx);
                if stations.count()? > 0 {
                    return Ok(0);
                }
                for seed in seeds {
                    stations.insert(seed)?;
                }
                Ok(seeds.len() as u32)
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=station_seed module=stations status={} inserted={} error_code={}",
            status,
            result.as_ref().copied().unwrap_or(0),
            error_code
        );
        result
    }

    /// Free stations as `(number, location)`, ordered by number.
    pub fn list_free(&self) -> QuestResult<Vec<FreeStation>> {
        self.store.read(|tx| -> QuestResult<Vec<FreeStation>> {
            Ok(SqliteStationRepository::new(tx).list_free()?)
        })
    }

    pub fn list_all(&self) -> QuestResult<Vec<Station>> {
        self.store.read(|tx| -> QuestResult<Vec<Station>> {
            Ok(SqliteStationRepository::new(tx).list_all()?)
        })
    }

    pub fn find_by_number(&self, number: StationNumber) -> QuestResult<Station> {
        let number = validate_station_number(number)?;
        self.store.read(|tx| -> QuestResult<Station> {
            SqliteStationRepository::new(tx)
                .find_by_number(number)?
                .ok_or(QuestError::NotFound(Missing::Station(number)))
        })
    }

    /// The organizer's station and the number of the group standing at it.
    ///
    /// `None` when `identity` is not an organizer.
    pub fn station_of_organizer(&self, identity: Identity) -> QuestResult<Option<OrganizerStation>> {
        self.store.read(|tx| -> QuestResult<Option<OrganizerStation>> {
            let Some(station_id) =
                find_with_role(tx, identity, Role::Organizer)?.and_then(|p| p.station_id)
            else {
                return Ok(None);
            };
            let Some(station) = SqliteStationRepository::new(tx).find_by_id(station_id)? else {
                return Ok(None);
            };
            let group_number = match station.current_group_id {
                Some(group_id) => SqliteLedgerRepository::new(tx)
                    .find_group_by_id(group_id)?
                    .map(|group| group.number),
                None => None,
            };
            Ok(Some(OrganizerStation {
                station,
                group_number,
            }))
        })
    }
}

fn validate_seeds(seeds: &[StationSeed]) -> QuestResult<()> {
    let mut seen = HashSet::new();
    for seed in seeds {
        validate_station_number(seed.number)?;
        if seed.name.trim().is_empty() {
            return Err(QuestError::InvalidInput(format!(
                "station {} has a blank name",
                seed.number
            )));
        }
        if !seen.insert(seed.number) {
            return Err(QuestError::InvalidInput(format!(
                "station {} is listed twice",
                seed.number
            )));
        }
    }
    Ok(())
}
