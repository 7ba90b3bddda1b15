//! Physical stations and their occupancy.

use super::group::GroupId;
use serde::{Deserialize, Serialize};

/// Storage row id of a station.
pub type StationId = i64;

/// Human-facing station number, `1..=N`, fixed at provisioning time.
pub type StationNumber = u32;

/// One station with its current occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub number: StationNumber,
    pub name: String,
    pub location: String,
    pub is_free: bool,
    /// Set iff `is_free` is false.
    pub current_group_id: Option<GroupId>,
}

impl Station {
    pub fn is_occupied(&self) -> bool {
        !self.is_free
    }
}

/// Entry of the free-station list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeStation {
    pub number: StationNumber,
    pub location: String,
}

/// Provisioning record for one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSeed {
    pub number: StationNumber,
    pub name: String,
    pub location: String,
}

/// An organizer's station together with the group standing at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerStation {
    pub station: Station,
    pub group_number: Option<String>,
}
