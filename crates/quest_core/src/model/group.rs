//! Groups, their running score, and the append-only reward ledger.
//!
//! # Invariants
//! - `Group::score` equals the sum of `points + bonus` over the group's
//!   reward events.
//! - Reward events are never updated or deleted.

use super::points::Points;
use super::station::{StationId, StationNumber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage row id of a group.
pub type GroupId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Human-assigned, unique group number such as `"101"`.
    pub number: String,
    /// Cached projection of the ledger.
    pub score: Points,
}

/// One immutable scoring transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    /// Stable id for auditing.
    pub event_uuid: Uuid,
    pub group_id: GroupId,
    /// `None` for manual admin payments.
    pub station_id: Option<StationId>,
    pub station_number: Option<StationNumber>,
    pub points: Points,
    pub bonus: Points,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl RewardEvent {
    /// Amount this event contributes to the group score.
    pub fn total(&self) -> Points {
        self.points + self.bonus
    }
}

/// A group with its ledger, most recent event first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHistory {
    pub group: Group,
    pub history: Vec<RewardEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub group_number: String,
    pub score: Points,
}

/// A group whose cached score disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDrift {
    pub group_number: String,
    pub cached: Points,
    pub ledger: Points,
}

#[cfg(test)]
mod tests {
    use super::{Points, RewardEvent};
    use uuid::Uuid;

    #[test]
    fn total_includes_bonus() {
        let event = RewardEvent {
            event_uuid: Uuid::new_v4(),
            group_id: 1,
            station_id: Some(5),
            station_number: Some(5),
            points: Points::whole(7),
            bonus: Points::from_cents(50).unwrap(),
            created_at: 0,
        };
        assert_eq!(event.total().cents(), 750);
    }
}
