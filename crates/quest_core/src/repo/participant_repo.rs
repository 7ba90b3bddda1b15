//! Participant role storage.
//!
//! # Invariants
//! - One row per identity; re-registration overwrites role and associations.
//! - The partial unique indexes reject a second curator for a group and a
//!   second organizer for a station.

use super::{RepoError, RepoResult};
use crate::model::group::GroupId;
use crate::model::participant::{Identity, Participant, ParticipantId, Role};
use crate::model::station::StationId;
use rusqlite::{params, Connection, OptionalExtension, Row};

const PARTICIPANT_SELECT_SQL: &str = "SELECT
    id,
    identity,
    role,
    group_id,
    station_id
FROM participants";

pub trait ParticipantRepository {
    fn find_by_identity(&self, identity: Identity) -> RepoResult<Option<Participant>>;
    fn curator_of_group(&self, group_id: GroupId) -> RepoResult<Option<Participant>>;
    fn organizer_of_station(&self, station_id: StationId) -> RepoResult<Option<Participant>>;
    fn upsert_curator(&self, identity: Identity, group_id: GroupId) -> RepoResult<ParticipantId>;
    fn upsert_organizer(
        &self,
        identity: Identity,
        station_id: StationId,
    ) -> RepoResult<ParticipantId>;
    fn upsert_admin(&self, identity: Identity) -> RepoResult<ParticipantId>;
    fn list_identities(&self) -> RepoResult<Vec<Identity>>;
}

pub struct SqliteParticipantRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParticipantRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, filter: &str, value: i64) -> RepoResult<Option<Participant>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARTICIPANT_SELECT_SQL} WHERE {filter};"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_participant_row(row)?));
        }
        Ok(None)
    }

    fn upsert(
        &self,
        identity: Identity,
        role: Role,
        group_id: Option<GroupId>,
        station_id: Option<StationId>,
    ) -> RepoResult<ParticipantId> {
        let id = self
            .conn
            .query_row(
                "INSERT INTO participants (identity, role, group_id, station_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (identity) DO UPDATE SET
                    role = excluded.role,
                    group_id = excluded.group_id,
                    station_id = excluded.station_id,
                    updated_at = (strftime('%s', 'now') * 1000)
                 RETURNING id;",
                params![identity, role.as_str(), group_id, station_id],
                |row| row.get(0),
            )
            .optional()?;
        id.ok_or_else(|| {
            RepoError::InvalidData(format!("upsert of participant {identity} returned no id"))
        })
    }
}

impl ParticipantRepository for SqliteParticipantRepository<'_> {
    fn find_by_identity(&self, identity: Identity) -> RepoResult<Option<Participant>> {
        self.find_one("identity = ?1", identity)
    }

    fn curator_of_group(&self, group_id: GroupId) -> RepoResult<Option<Participant>> {
        self.find_one("role = 'curator' AND group_id = ?1", group_id)
    }

    fn organizer_of_station(&self, station_id: StationId) -> RepoResult<Option<Participant>> {
        self.find_one("role = 'organizer' AND station_id = ?1", station_id)
    }

    fn upsert_curator(&self, identity: Identity, group_id: GroupId) -> RepoResult<ParticipantId> {
        self.upsert(identity, Role::Curator, Some(group_id), None)
    }

    fn upsert_organizer(
        &self,
        identity: Identity,
        station_id: StationId,
    ) -> RepoResult<ParticipantId> {
        self.upsert(identity, Role::Organizer, None, Some(station_id))
    }

    fn upsert_admin(&self, identity: Identity) -> RepoResult<ParticipantId> {
        self.upsert(identity, Role::Admin, None, None)
    }

    fn list_identities(&self) -> RepoResult<Vec<Identity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identity FROM participants ORDER BY identity ASC;")?;
        let mut rows = stmt.query([])?;
        let mut identities = Vec::new();
        while let Some(row) = rows.next()? {
            identities.push(row.get(0)?);
        }
        Ok(identities)
    }
}

fn parse_participant_row(row: &Row<'_>) -> RepoResult<Participant> {
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in participants.role"))
    })?;

    Ok(Participant {
        id: row.get("id")?,
        identity: row.get("identity")?,
        role,
        group_id: row.get("group_id")?,
        station_id: row.get("station_id")?,
    })
}
