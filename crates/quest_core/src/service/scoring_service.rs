//! Scoring: rewards, manual payments, history and leaderboard.
//!
//! # Responsibility
//! - Append reward events and move the cached group score with them.
//! - Serve per-group history and the event leaderboard.
//!
//! # Invariants
//! - The ledger insert and the score increment commit together or not at all.
//! - A group's cached score equals the sum of `points + bonus` of its events.
//! - Manual payments are never phase-gated.

use super::role_service::find_with_role;
use super::{outcome, validate_group_number, Missing, QuestError, QuestResult};
use crate::db::Store;
use crate::model::group::{GroupHistory, GroupId, LeaderboardEntry, LedgerDrift};
use crate::model::participant::{Identity, Role};
use crate::model::points::Points;
use crate::repo::ledger_repo::{LedgerRepository, SqliteLedgerRepository};
use crate::repo::station_repo::{SqliteStationRepository, StationRepository};
use log::{info, warn};

/// Range limits and group policy for scoring use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Largest `points` one organizer reward may carry.
    pub max_points: Points,
    /// Largest `bonus` one organizer reward may carry.
    pub max_bonus: Points,
    /// Manual payment to an unknown group number creates the group.
    pub manual_pay_creates_group: bool,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            max_points: Points::whole(10),
            max_bonus: Points::whole(1),
            manual_pay_creates_group: true,
        }
    }
}

pub struct ScoringService<'store> {
    store: &'store Store,
    policy: ScoringPolicy,
}

impl<'store> ScoringService<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self::with_policy(store, ScoringPolicy::default())
    }

    pub fn with_policy(store: &'store Store, policy: ScoringPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    /// Rewards the group currently standing at the organizer's station.
    ///
    /// # Errors
    /// - `InvalidInput` when `points` or `bonus` exceed the policy limits.
    /// - `NotRegistered` when the caller is not an organizer.
    /// - `NoStationAssigned` when the organizer has no station.
    /// - `NoGroupPresent` when nobody occupies the station.
    pub fn reward(
        &self,
        organizer: Identity,
        points: Points,
        bonus: Points,
    ) -> QuestResult<GroupId> {
        let result = self.check_limits(points, bonus).and_then(|()| {
            self.store.write(|tx| -> QuestResult<GroupId> {
                let participant = find_with_role(tx, organizer, Role::Organizer)?.ok_or(
                    QuestError::NotRegistered {
                        identity: organizer,
                        required: Role::Organizer,
                    },
                )?;
                let station = match participant.station_id {
                    Some(station_id) => SqliteStationRepository::new(tx).find_by_id(station_id)?,
                    None => None,
                }
                .ok_or(QuestError::NoStationAssigned(organizer))?;
                let group_id = station
                    .current_group_id
                    .ok_or(QuestError::NoGroupPresent(station.number))?;

                let ledger = SqliteLedgerRepository::new(tx);
                let event = ledger.append_reward(group_id, Some(station.id), points, bonus)?;
                ledger.increment_score(group_id, event.total())?;
                Ok(group_id)
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=reward module=scoring status={} identity={} points={} bonus={} error_code={}",
            status, organizer, points, bonus, error_code
        );
        result
    }

    /// Admin payment of `points` to a group, outside any station.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed group number.
    /// - `NotFound` for an unknown group when the policy does not create it.
    pub fn manual_pay(&self, group_number: &str, points: Points) -> QuestResult<GroupId> {
        let result = validate_group_number(group_number).and_then(|number| {
            self.store.write(|tx| -> QuestResult<GroupId> {
                let ledger = SqliteLedgerRepository::new(tx);
                let group = if self.policy.manual_pay_creates_group {
                    ledger.get_or_create_group(number)?
                } else {
                    ledger
                        .find_group_by_number(number)?
                        .ok_or_else(|| QuestError::NotFound(Missing::Group(number.to_string())))?
                };
                ledger.append_reward(group.id, None, points, Points::ZERO)?;
                ledger.increment_score(group.id, points)?;
                Ok(group.id)
            })
        });

        let (status, error_code) = outcome(&result);
        info!(
            "event=manual_pay module=scoring status={} group={} points={} error_code={}",
            status,
            group_number.trim(),
            points,
            error_code
        );
        result
    }

    /// The caller's group with its ledger, newest event first.
    ///
    /// `None` when the caller is not a registered curator.
    pub fn history_and_score(&self, curator: Identity) -> QuestResult<Option<GroupHistory>> {
        self.store.read(|tx| -> QuestResult<Option<GroupHistory>> {
            let Some(group_id) =
                find_with_role(tx, curator, Role::Curator)?.and_then(|p| p.group_id)
            else {
                return Ok(None);
            };
            let ledger = SqliteLedgerRepository::new(tx);
            let Some(group) = ledger.find_group_by_id(group_id)? else {
                return Ok(None);
            };
            let history = ledger.history(group.id)?;
            Ok(Some(GroupHistory { group, history }))
        })
    }

    /// Every group by score descending; unscored groups come last.
    pub fn leaderboard(&self) -> QuestResult<Vec<LeaderboardEntry>> {
        self.store.read(|tx| -> QuestResult<Vec<LeaderboardEntry>> {
            Ok(SqliteLedgerRepository::new(tx).leaderboard()?)
        })
    }

    /// Groups whose cached score disagrees with their ledger.
    pub fn ledger_drift(&self) -> QuestResult<Vec<LedgerDrift>> {
        let drifts = self.store.read(|tx| -> QuestResult<Vec<LedgerDrift>> {
            Ok(SqliteLedgerRepository::new(tx).drift()?)
        })?;
        if !drifts.is_empty() {
            warn!(
                "event=ledger_audit module=scoring status=drift groups={}",
                drifts.len()
            );
        }
        Ok(drifts)
    }

    fn check_limits(&self, points: Points, bonus: Points) -> QuestResult<()> {
        if points > self.policy.max_points {
            return Err(QuestError::InvalidInput(format!(
                "points {points} exceed the limit {}",
                self.policy.max_points
            )));
        }
        if bonus > self.policy.max_bonus {
            return Err(QuestError::InvalidInput(format!(
                "bonus {bonus} exceeds the limit {}",
                self.policy.max_bonus
            )));
        }
        Ok(())
    }
}
