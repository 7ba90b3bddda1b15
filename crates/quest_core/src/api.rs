//! Narrow call contract for the transport/chat layer.
//!
//! # Responsibility
//! - Expose every core use-case behind one handle owning the store.
//! - Resolve the caller's role once and pass it explicitly to gated calls.
//!
//! # Invariants
//! - Every call returns a tagged `QuestResult`; nothing panics across it.
//! - Admin-only calls require a [`Caller`] resolved with the admin role.

use crate::config::{ConfigError, CoreConfig};
use crate::db::{DbError, Store};
use crate::model::group::{GroupHistory, GroupId, LeaderboardEntry};
use crate::model::participant::{Identity, Role};
use crate::model::points::Points;
use crate::model::station::{FreeStation, StationId, StationNumber, StationSeed};
use crate::service::phase_service::PhaseController;
use crate::service::reservation_service::ReservationService;
use crate::service::role_service::{CuratorRegistration, OrganizerRegistration, RoleRegistry};
use crate::service::scoring_service::{ScoringPolicy, ScoringService};
use crate::service::station_service::StationRegistry;
use crate::service::{QuestError, QuestResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Startup failure of [`QuestApi::open`].
#[derive(Debug)]
pub enum BootstrapError {
    Config(ConfigError),
    Db(DbError),
    Quest(QuestError),
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Quest(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Quest(err) => Some(err),
        }
    }
}

impl From<ConfigError> for BootstrapError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for BootstrapError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<QuestError> for BootstrapError {
    fn from(value: QuestError) -> Self {
        Self::Quest(value)
    }
}

/// A caller whose role was resolved at the start of the request.
///
/// Only [`QuestApi::authorize`] builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    identity: Identity,
    role: Role,
}

impl Caller {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn require(&self, role: Role) -> QuestResult<()> {
        if self.role != role {
            return Err(QuestError::NotRegistered {
                identity: self.identity,
                required: role,
            });
        }
        Ok(())
    }
}

/// Cloneable handle over one store; cheap to share across request tasks.
#[derive(Clone)]
pub struct QuestApi {
    store: Arc<Store>,
    policy: ScoringPolicy,
}

impl QuestApi {
    pub fn new(store: Arc<Store>, policy: ScoringPolicy) -> Self {
        Self { store, policy }
    }

    /// Opens the configured database and grants the configured admins.
    pub fn open(config: &CoreConfig) -> Result<Self, BootstrapError> {
        let policy = config.scoring_policy()?;
        let store = Store::open(&config.db_path, config.store_options())?;
        let api = Self::new(Arc::new(store), policy);
        api.bootstrap_admins(&config.admins)?;
        info!(
            "event=api_open module=api status=ok admins={} pool_size={}",
            config.admins.len(),
            config.store_options().max_size
        );
        Ok(api)
    }

    /// Private in-memory instance with default policy.
    pub fn in_memory() -> Result<Self, DbError> {
        Ok(Self::new(
            Arc::new(Store::open_in_memory()?),
            ScoringPolicy::default(),
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn phases(&self) -> PhaseController<'_> {
        PhaseController::new(&self.store)
    }

    pub fn roles(&self) -> RoleRegistry<'_> {
        RoleRegistry::new(&self.store)
    }

    pub fn stations(&self) -> StationRegistry<'_> {
        StationRegistry::new(&self.store)
    }

    pub fn reservations(&self) -> ReservationService<'_> {
        ReservationService::new(&self.store)
    }

    pub fn scoring(&self) -> ScoringService<'_> {
        ScoringService::with_policy(&self.store, self.policy)
    }

    pub fn bootstrap_admins(&self, admins: &[Identity]) -> QuestResult<()> {
        let roles = self.roles();
        for identity in admins {
            roles.grant_admin(*identity)?;
        }
        Ok(())
    }

    pub fn seed_stations(&self, seeds: &[StationSeed]) -> QuestResult<u32> {
        self.stations().seed(seeds)
    }

    /// Resolves `identity` and checks it holds one of `allowed`.
    pub fn authorize(&self, identity: Identity, allowed: &[Role]) -> QuestResult<Caller> {
        let participant = self.roles().require_role(identity, allowed)?;
        Ok(Caller {
            identity,
            role: participant.role,
        })
    }

    pub fn register_curator(
        &self,
        identity: Identity,
        group_number: &str,
    ) -> QuestResult<CuratorRegistration> {
        self.roles().register_curator(identity, group_number)
    }

    pub fn register_organizer(
        &self,
        identity: Identity,
        station_number: StationNumber,
    ) -> QuestResult<OrganizerRegistration> {
        self.roles().register_organizer(identity, station_number)
    }

    pub fn take_station(
        &self,
        curator: Identity,
        station_number: StationNumber,
    ) -> QuestResult<StationId> {
        self.reservations().take(curator, station_number)
    }

    /// Unconditional release; ownership is the caller's concern.
    pub fn release_station(&self, station_number: StationNumber) -> QuestResult<()> {
        self.reservations().release(station_number)
    }

    /// Release allowed for the station's own organizer or an admin.
    pub fn release_station_as(
        &self,
        identity: Identity,
        station_number: StationNumber,
    ) -> QuestResult<()> {
        let caller = self.authorize(identity, &[Role::Organizer, Role::Admin])?;
        if caller.role == Role::Organizer {
            let own_station = self.roles().station_of(identity)?;
            if own_station.map(|station| station.number) != Some(station_number) {
                return Err(QuestError::NotRegistered {
                    identity,
                    required: Role::Organizer,
                });
            }
        }
        self.reservations().release(station_number)
    }

    pub fn reward(&self, organizer: Identity, points: Points, bonus: Points) -> QuestResult<GroupId> {
        self.scoring().reward(organizer, points, bonus)
    }

    pub fn manual_pay(
        &self,
        caller: &Caller,
        group_number: &str,
        points: Points,
    ) -> QuestResult<GroupId> {
        caller.require(Role::Admin)?;
        self.scoring().manual_pay(group_number, points)
    }

    pub fn history_and_score(&self, curator: Identity) -> QuestResult<Option<GroupHistory>> {
        self.scoring().history_and_score(curator)
    }

    pub fn leaderboard(&self) -> QuestResult<Vec<LeaderboardEntry>> {
        self.scoring().leaderboard()
    }

    pub fn list_free_stations(&self) -> QuestResult<Vec<FreeStation>> {
        self.stations().list_free()
    }

    pub fn set_phase_flag(&self, caller: &Caller, name: &str, value: bool) -> QuestResult<()> {
        caller.require(Role::Admin)?;
        self.phases().set_flag(name, value)
    }

    pub fn get_phase_flag(&self, name: &str) -> QuestResult<bool> {
        self.phases().get_flag(name)
    }

    pub fn role_of(&self, identity: Identity) -> QuestResult<Option<Role>> {
        self.roles().role_of(identity)
    }
}
