//! Station reservation and scoring ledger for live scavenger-hunt events.
//! This crate is the single source of truth for event invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::{BootstrapError, Caller, QuestApi};
pub use config::{load_config, load_station_seeds, ConfigError, CoreConfig, RewardLimits};
pub use db::{Store, StoreOptions};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::group::{Group, GroupHistory, GroupId, LeaderboardEntry, LedgerDrift, RewardEvent};
pub use model::participant::{Identity, Participant, ParticipantId, Role};
pub use model::phase::{PhaseFlag, PhaseState};
pub use model::points::{Points, PointsError};
pub use model::station::{
    FreeStation, OrganizerStation, Station, StationId, StationNumber, StationSeed,
};
pub use repo::{RepoError, RepoResult};
pub use service::phase_service::PhaseController;
pub use service::reservation_service::ReservationService;
pub use service::role_service::{CuratorRegistration, OrganizerRegistration, RoleRegistry};
pub use service::scoring_service::{ScoringPolicy, ScoringService};
pub use service::station_service::StationRegistry;
pub use service::{Missing, QuestError, QuestResult, RoleSlot};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
