//! Participant roles and their group/station associations.

use super::group::GroupId;
use super::station::StationId;
use serde::{Deserialize, Serialize};

/// Opaque, stable identity supplied by the transport layer (a chat user id).
pub type Identity = i64;

/// Storage row id of a participant.
pub type ParticipantId = i64;

/// Event role. A participant without a row has no role at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Represents one group and reserves stations for it.
    Curator,
    /// Runs one station and rewards whichever group occupies it.
    Organizer,
    /// Event-wide control: phase flags and manual payments.
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Curator => "curator",
            Self::Organizer => "organizer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "curator" => Some(Self::Curator),
            "organizer" => Some(Self::Organizer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Registered participant.
///
/// `group_id` is set only for curators and `station_id` only for organizers;
/// re-registering under another role clears the previous association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub identity: Identity,
    pub role: Role,
    pub group_id: Option<GroupId>,
    pub station_id: Option<StationId>,
}
