//! Station storage and the occupancy compare-and-set.
//!
//! # Invariants
//! - `is_free = 1` iff `current_group_id IS NULL` (also a table CHECK).
//! - `try_occupy` only flips a row that is free at statement time.
//! - Listings are ordered by station number.

use super::{bool_to_int, parse_flag_column, RepoError, RepoResult};
use crate::model::group::GroupId;
use crate::model::station::{FreeStation, Station, StationId, StationNumber, StationSeed};
use rusqlite::{params, Connection, Row};

const STATION_SELECT_SQL: &str = "SELECT
    id,
    number,
    name,
    location,
    is_free,
    current_group_id
FROM stations";

pub trait StationRepository {
    fn find_by_number(&self, number: StationNumber) -> RepoResult<Option<Station>>;
    fn find_by_id(&self, id: StationId) -> RepoResult<Option<Station>>;
    fn list_all(&self) -> RepoResult<Vec<Station>>;
    fn list_free(&self) -> RepoResult<Vec<FreeStation>>;
    /// Marks the station occupied by `group_id` when it is currently free.
    /// Returns `false` when the row was already occupied.
    fn try_occupy(&self, id: StationId, group_id: GroupId) -> RepoResult<bool>;
    /// Clears occupancy. Returns `false` when no station has that number.
    fn release_by_number(&self, number: StationNumber) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<u32>;
    fn insert(&self, seed: &StationSeed) -> RepoResult<StationId>;
}

pub struct SqliteStationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, filter: &str, value: i64) -> RepoResult<Option<Station>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STATION_SELECT_SQL} WHERE {filter};"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_station_row(row)?));
        }
        Ok(None)
    }
}

impl StationRepository for SqliteStationRepository<'_> {
    fn find_by_number(&self, number: StationNumber) -> RepoResult<Option<Station>> {
        self.find_one("number = ?1", i64::from(number))
    }

    fn find_by_id(&self, id: StationId) -> RepoResult<Option<Station>> {
        self.find_one("id = ?1", id)
    }

    fn list_all(&self) -> RepoResult<Vec<Station>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STATION_SELECT_SQL} ORDER BY number ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut stations = Vec::new();
        while let Some(row) = rows.next()? {
            stations.push(parse_station_row(row)?);
        }
        Ok(stations)
    }

    fn list_free(&self) -> RepoResult<Vec<FreeStation>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, location
             FROM stations
             WHERE is_free = 1
             ORDER BY number ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut stations = Vec::new();
        while let Some(row) = rows.next()? {
            stations.push(FreeStation {
                number: row.get("number")?,
                location: row.get("location")?,
            });
        }
        Ok(stations)
    }

    fn try_occupy(&self, id: StationId, group_id: GroupId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE stations
             SET is_free = 0,
                 current_group_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_free = 1;",
            params![id, group_id],
        )?;
        Ok(changed == 1)
    }

    fn release_by_number(&self, number: StationNumber) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE stations
             SET is_free = 1,
                 current_group_id = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE number = ?1;",
            [number],
        )?;
        Ok(changed == 1)
    }

    fn count(&self) -> RepoResult<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM stations;", [], |row| row.get(0))?;
        Ok(count)
    }

    fn insert(&self, seed: &StationSeed) -> RepoResult<StationId> {
        self.conn.execute(
            "INSERT INTO stations (number, name, location, is_free, current_group_id)
             VALUES (?1, ?2, ?3, ?4, NULL);",
            params![
                seed.number,
                seed.name.as_str(),
                seed.location.as_str(),
                bool_to_int(true)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn parse_station_row(row: &Row<'_>) -> RepoResult<Station> {
    let is_free = parse_flag_column(row.get("is_free")?, "stations.is_free")?;
    let current_group_id: Option<GroupId> = row.get("current_group_id")?;
    let number: StationNumber = row.get("number")?;

    if is_free == current_group_id.is_some() {
        return Err(RepoError::InvalidData(format!(
            "station {number} has is_free={is_free} but current_group_id={current_group_id:?}"
        )));
    }

    Ok(Station {
        id: row.get("id")?,
        number,
        name: row.get("name")?,
        location: row.get("location")?,
        is_free,
        current_group_id,
    })
}
