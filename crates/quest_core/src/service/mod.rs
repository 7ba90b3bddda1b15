//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Run every use-case as one transaction on one pooled connection.
//! - Report every failure as a tagged [`QuestError`].
//!
//! # Invariants
//! - A failed use-case leaves no partial effect behind.
//! - Storage failures are not retried here; they surface as
//!   `StorageUnavailable`.

use crate::db::DbError;
use crate::model::participant::{Identity, Role};
use crate::model::phase::PhaseFlag;
use crate::model::points::PointsError;
use crate::model::station::StationNumber;
use crate::repo::RepoError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod phase_service;
pub mod reservation_service;
pub mod role_service;
pub mod scoring_service;
pub mod station_service;

pub type QuestResult<T> = Result<T, QuestError>;

static GROUP_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z_-]{1,20}$").expect("valid group number regex"));

/// Role slot that can be held by at most one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSlot {
    GroupCurator(String),
    StationOrganizer(StationNumber),
}

/// Referenced entity that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Group(String),
    Station(StationNumber),
}

/// Tagged failure returned by every core operation.
#[derive(Debug)]
pub enum QuestError {
    /// Caller does not hold the role the operation needs.
    NotRegistered { identity: Identity, required: Role },
    /// Slot already held by another participant.
    AlreadyRegistered(RoleSlot),
    NotFound(Missing),
    /// Station take attempted on an occupied station.
    AlreadyOccupied(StationNumber),
    /// The named flag is in the wrong state for this action.
    PhaseViolation(PhaseFlag),
    NoStationAssigned(Identity),
    NoGroupPresent(StationNumber),
    InvalidInput(String),
    StorageUnavailable(RepoError),
}

impl Display for QuestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRegistered { identity, required } => write!(
                f,
                "participant {identity} is not registered as {}",
                required.as_str()
            ),
            Self::AlreadyRegistered(RoleSlot::GroupCurator(number)) => {
                write!(f, "group {number} already has a curator")
            }
            Self::AlreadyRegistered(RoleSlot::StationOrganizer(number)) => {
                write!(f, "station {number} already has an organizer")
            }
            Self::NotFound(Missing::Group(number)) => write!(f, "group {number} not found"),
            Self::NotFound(Missing::Station(number)) => write!(f, "station {number} not found"),
            Self::AlreadyOccupied(number) => write!(f, "station {number} is already occupied"),
            Self::PhaseViolation(flag) => {
                write!(f, "not allowed in the current phase ({})", flag.key())
            }
            Self::NoStationAssigned(identity) => {
                write!(f, "organizer {identity} has no station assigned")
            }
            Self::NoGroupPresent(number) => write!(f, "no group is present at station {number}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl Error for QuestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl QuestError {
    /// Stable snake_case tag used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered { .. } => "not_registered",
            Self::AlreadyRegistered(_) => "already_registered",
            Self::NotFound(_) => "not_found",
            Self::AlreadyOccupied(_) => "already_occupied",
            Self::PhaseViolation(_) => "phase_violation",
            Self::NoStationAssigned(_) => "no_station_assigned",
            Self::NoGroupPresent(_) => "no_group_present",
            Self::InvalidInput(_) => "invalid_input",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<RepoError> for QuestError {
    fn from(value: RepoError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<DbError> for QuestError {
    fn from(value: DbError) -> Self {
        Self::StorageUnavailable(RepoError::Db(value))
    }
}

impl From<PointsError> for QuestError {
    fn from(value: PointsError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

pub(crate) fn validate_group_number(number: &str) -> QuestResult<&str> {
    let trimmed = number.trim();
    if !GROUP_NUMBER_RE.is_match(trimmed) {
        return Err(QuestError::InvalidInput(format!(
            "group number `{trimmed}` must be 1-20 letters, digits, `_` or `-`"
        )));
    }
    Ok(trimmed)
}

pub(crate) fn validate_station_number(number: StationNumber) -> QuestResult<StationNumber> {
    if number == 0 {
        return Err(QuestError::InvalidInput(
            "station numbers start at 1".to_string(),
        ));
    }
    Ok(number)
}

pub(crate) fn outcome<T>(result: &QuestResult<T>) -> (&'static str, &'static str) {
    match result {
        Ok(_) => ("ok", "none"),
        Err(err) => ("error", err.code()),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_group_number, validate_station_number, QuestError};

    #[test]
    fn group_numbers_are_trimmed_and_checked() {
        assert_eq!(validate_group_number(" 101 ").unwrap(), "101");
        assert!(matches!(
            validate_group_number(""),
            Err(QuestError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_group_number("10 1"),
            Err(QuestError::InvalidInput(_))
        ));
    }

    #[test]
    fn station_zero_is_rejected() {
        assert!(validate_station_number(0).is_err());
        assert_eq!(validate_station_number(5).unwrap(), 5);
    }
}
