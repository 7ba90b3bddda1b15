//! Group and reward ledger storage.
//!
//! # Responsibility
//! - Create groups lazily by number.
//! - Append immutable reward rows and bump the cached score in SQL.
//!
//! # Invariants
//! - Score changes are single `score_cents = score_cents + ?` statements,
//!   never read-then-write.
//! - History is ordered most recent first, newest insert winning ties.
//! - Leaderboard is ordered by score descending, then group number.

use super::{RepoError, RepoResult};
use crate::model::group::{Group, GroupId, LeaderboardEntry, LedgerDrift, RewardEvent};
use crate::model::points::Points;
use crate::model::station::StationId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const REWARD_SELECT_SQL: &str = "SELECT
    r.event_uuid AS event_uuid,
    r.group_id AS group_id,
    r.station_id AS station_id,
    s.number AS station_number,
    r.points_cents AS points_cents,
    r.bonus_cents AS bonus_cents,
    r.created_at AS created_at
FROM rewards r
LEFT JOIN stations s ON s.id = r.station_id";

pub trait LedgerRepository {
    fn find_group_by_number(&self, number: &str) -> RepoResult<Option<Group>>;
    fn find_group_by_id(&self, id: GroupId) -> RepoResult<Option<Group>>;
    fn get_or_create_group(&self, number: &str) -> RepoResult<Group>;
    fn append_reward(
        &self,
        group_id: GroupId,
        station_id: Option<StationId>,
        points: Points,
        bonus: Points,
    ) -> RepoResult<RewardEvent>;
    fn increment_score(&self, group_id: GroupId, delta: Points) -> RepoResult<()>;
    fn history(&self, group_id: GroupId) -> RepoResult<Vec<RewardEvent>>;
    fn leaderboard(&self) -> RepoResult<Vec<LeaderboardEntry>>;
    fn drift(&self) -> RepoResult<Vec<LedgerDrift>>;
}

pub struct SqliteLedgerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedgerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LedgerRepository for SqliteLedgerRepository<'_> {
    fn find_group_by_number(&self, number: &str) -> RepoResult<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, group_number, score_cents FROM groups WHERE group_number = ?1;",
                [number],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        group.map(build_group).transpose()
    }

    fn find_group_by_id(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, group_number, score_cents FROM groups WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        group.map(build_group).transpose()
    }

    fn get_or_create_group(&self, number: &str) -> RepoResult<Group> {
        self.conn.execute(
            "INSERT INTO groups (group_number, score_cents)
             VALUES (?1, 0)
             ON CONFLICT (group_number) DO NOTHING;",
            [number],
        )?;
        self.find_group_by_number(number)?.ok_or_else(|| {
            RepoError::InvalidData(format!("group `{number}` missing right after insert"))
        })
    }

    fn append_reward(
        &self,
        group_id: GroupId,
        station_id: Option<StationId>,
        points: Points,
        bonus: Points,
    ) -> RepoResult<RewardEvent> {
        let event_uuid = Uuid::new_v4();
        let created_at: i64 = self.conn.query_row(
            "INSERT INTO rewards (event_uuid, group_id, station_id, points_cents, bonus_cents)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING created_at;",
            params![
                event_uuid.to_string(),
                group_id,
                station_id,
                points.cents(),
                bonus.cents(),
            ],
            |row| row.get(0),
        )?;
        let station_number = match station_id {
            Some(station_id) => self
                .conn
                .query_row(
                    "SELECT number FROM stations WHERE id = ?1;",
                    [station_id],
                    |row| row.get(0),
                )
                .optional()?,
            None => None,
        };

        Ok(RewardEvent {
            event_uuid,
            group_id,
            station_id,
            station_number,
            points,
            bonus,
            created_at,
        })
    }

    fn increment_score(&self, group_id: GroupId, delta: Points) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE groups
             SET score_cents = score_cents + ?2
             WHERE id = ?1;",
            params![group_id, delta.cents()],
        )?;
        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "score increment targeted missing group id {group_id}"
            )));
        }
        Ok(())
    }

    fn history(&self, group_id: GroupId) -> RepoResult<Vec<RewardEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REWARD_SELECT_SQL}
             WHERE r.group_id = ?1
             ORDER BY r.created_at DESC, r.id DESC;"
        ))?;
        let mut rows = stmt.query([group_id])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_reward_row(row)?);
        }
        Ok(events)
    }

    fn leaderboard(&self) -> RepoResult<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_number, score_cents
             FROM groups
             ORDER BY score_cents DESC NULLS LAST, group_number ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let score: Option<i64> = row.get("score_cents")?;
            entries.push(LeaderboardEntry {
                group_number: row.get("group_number")?,
                score: parse_points(score.unwrap_or(0), "groups.score_cents")?,
            });
        }
        Ok(entries)
    }

    fn drift(&self) -> RepoResult<Vec<LedgerDrift>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                g.group_number AS group_number,
                g.score_cents AS cached_cents,
                COALESCE(SUM(r.points_cents + r.bonus_cents), 0) AS ledger_cents
             FROM groups g
             LEFT JOIN rewards r ON r.group_id = g.id
             GROUP BY g.id
             HAVING cached_cents <> ledger_cents
             ORDER BY g.group_number ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut drifts = Vec::new();
        while let Some(row) = rows.next()? {
            drifts.push(LedgerDrift {
                group_number: row.get("group_number")?,
                cached: parse_points(row.get("cached_cents")?, "groups.score_cents")?,
                ledger: parse_points(row.get("ledger_cents")?, "rewards")?,
            });
        }
        Ok(drifts)
    }
}

fn build_group((id, number, score_cents): (GroupId, String, i64)) -> RepoResult<Group> {
    Ok(Group {
        id,
        number,
        score: parse_points(score_cents, "groups.score_cents")?,
    })
}

fn parse_reward_row(row: &Row<'_>) -> RepoResult<RewardEvent> {
    let uuid_text: String = row.get("event_uuid")?;
    let event_uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid `{uuid_text}` in rewards.event_uuid"))
    })?;

    Ok(RewardEvent {
        event_uuid,
        group_id: row.get("group_id")?,
        station_id: row.get("station_id")?,
        station_number: row.get("station_number")?,
        points: parse_points(row.get("points_cents")?, "rewards.points_cents")?,
        bonus: parse_points(row.get("bonus_cents")?, "rewards.bonus_cents")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_points(cents: i64, column: &'static str) -> RepoResult<Points> {
    Points::from_cents(cents)
        .map_err(|err| RepoError::InvalidData(format!("{err} (`{cents}` in {column})")))
}
