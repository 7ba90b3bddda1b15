mod common;

use common::{api_with_stations, open_registration, station_seeds, ADMIN};
use quest_core::{
    PhaseFlag, QuestApi, QuestError, QuestResult, Role, RoleSlot, ScoringPolicy, Store,
    StoreOptions,
};
use std::sync::Arc;
use std::time::Duration;

const CONTENDERS: i64 = 8;

/// File-backed api with one pooled connection per contender.
fn shared_file_api(dir: &tempfile::TempDir) -> QuestApi {
    let store = Store::open(
        dir.path().join("registry.db"),
        StoreOptions {
            max_size: CONTENDERS as usize,
            busy_timeout: Duration::from_secs(10),
        },
    )
    .unwrap();
    let api = QuestApi::new(Arc::new(store), ScoringPolicy::default());
    api.seed_stations(&station_seeds(5)).unwrap();
    open_registration(&api);
    api
}

fn race<T: Send>(
    api: &QuestApi,
    identities: impl Iterator<Item = i64>,
    register: impl Fn(&QuestApi, i64) -> QuestResult<T> + Sync,
) -> Vec<QuestResult<T>> {
    let register = &register;
    std::thread::scope(|scope| {
        let handles: Vec<_> = identities
            .map(|identity| {
                let api = api.clone();
                scope.spawn(move || register(&api, identity))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    })
}

#[test]
fn curator_registration_creates_group() {
    let api = api_with_stations(3);

    let registration = api.register_curator(1, "101").unwrap();
    let group = api.roles().group_of(1).unwrap().unwrap();
    assert_eq!(group.id, registration.group_id);
    assert_eq!(group.number, "101");
    assert_eq!(group.score.cents(), 0);
    assert_eq!(api.role_of(1).unwrap(), Some(Role::Curator));
    assert_eq!(
        api.roles().curator_of_group(registration.group_id).unwrap(),
        Some(1)
    );
}

#[test]
fn group_number_is_trimmed() {
    let api = api_with_stations(1);

    let first = api.register_curator(1, " 101 ").unwrap();
    let group = api.roles().group_of(1).unwrap().unwrap();
    assert_eq!(group.number, "101");

    api.register_curator(1, "101").unwrap();
    assert_eq!(api.roles().group_of(1).unwrap().unwrap().id, first.group_id);
}

#[test]
fn second_curator_for_same_group_is_rejected() {
    let api = api_with_stations(1);
    api.register_curator(1, "101").unwrap();

    let err = api.register_curator(2, "101").unwrap_err();
    assert!(matches!(
        err,
        QuestError::AlreadyRegistered(RoleSlot::GroupCurator(ref number)) if number == "101"
    ));
    assert_eq!(api.role_of(2).unwrap(), None);
}

#[test]
fn curator_can_switch_groups() {
    let api = api_with_stations(1);
    let first = api.register_curator(1, "101").unwrap();
    let second = api.register_curator(1, "102").unwrap();

    assert_ne!(first.group_id, second.group_id);
    assert_eq!(first.participant_id, second.participant_id);
    assert_eq!(api.roles().curator_of_group(first.group_id).unwrap(), None);

    api.register_curator(2, "101").unwrap();
}

#[test]
fn malformed_group_number_is_invalid_input() {
    let api = api_with_stations(1);

    for bad in ["", "   ", "10 1", "a-very-long-group-number-indeed"] {
        let err = api.register_curator(1, bad).unwrap_err();
        assert!(matches!(err, QuestError::InvalidInput(_)), "accepted {bad:?}");
    }
}

#[test]
fn organizer_slot_is_exclusive() {
    let api = api_with_stations(5);
    open_registration(&api);

    let first = api.register_organizer(10, 5).unwrap();
    let err = api.register_organizer(11, 5).unwrap_err();
    assert!(matches!(
        err,
        QuestError::AlreadyRegistered(RoleSlot::StationOrganizer(5))
    ));

    let station = api.roles().station_of(10).unwrap().unwrap();
    assert_eq!(station.id, first.station_id);
    assert_eq!(station.number, 5);
    assert_eq!(api.role_of(11).unwrap(), None);
}

#[test]
fn organizer_registration_needs_open_phase() {
    let api = api_with_stations(5);

    let err = api.register_organizer(10, 5).unwrap_err();
    assert!(matches!(
        err,
        QuestError::PhaseViolation(PhaseFlag::RegistrationOpen)
    ));
}

#[test]
fn organizer_phase_check_precedes_station_lookup() {
    let api = api_with_stations(5);

    let closed = api.register_organizer(10, 42).unwrap_err();
    assert!(matches!(closed, QuestError::PhaseViolation(_)));

    open_registration(&api);
    let open = api.register_organizer(10, 42).unwrap_err();
    assert!(matches!(open, QuestError::NotFound(_)));
}

#[test]
fn switching_role_clears_previous_association() {
    let api = api_with_stations(2);
    open_registration(&api);
    let curator = api.register_curator(1, "101").unwrap();

    api.register_organizer(1, 2).unwrap();
    assert_eq!(api.role_of(1).unwrap(), Some(Role::Organizer));
    assert!(api.roles().group_of(1).unwrap().is_none());
    assert_eq!(api.roles().curator_of_group(curator.group_id).unwrap(), None);

    let participant = api.roles().participant(1).unwrap().unwrap();
    assert_eq!(participant.group_id, None);
    assert!(participant.station_id.is_some());
}

#[test]
fn admin_grant_and_identities() {
    let api = api_with_stations(1);
    api.register_curator(3, "101").unwrap();
    api.roles().grant_admin(2).unwrap();

    assert_eq!(api.role_of(2).unwrap(), Some(Role::Admin));
    assert_eq!(api.role_of(ADMIN).unwrap(), Some(Role::Admin));
    assert_eq!(
        api.roles().registered_identities().unwrap(),
        vec![2, 3, ADMIN]
    );
}

#[test]
fn require_role_reports_first_allowed_role() {
    let api = api_with_stations(1);
    api.register_curator(1, "101").unwrap();

    let err = api
        .roles()
        .require_role(1, &[Role::Organizer, Role::Admin])
        .unwrap_err();
    assert!(matches!(
        err,
        QuestError::NotRegistered {
            identity: 1,
            required: Role::Organizer
        }
    ));
    assert_eq!(
        api.roles().require_role(1, &[Role::Curator]).unwrap().role,
        Role::Curator
    );
}

#[test]
fn concurrent_curator_registrations_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let api = shared_file_api(&dir);

    let results = race(&api, 1..=CONTENDERS, |api, identity| {
        api.register_curator(identity, "101")
    });

    let winners: Vec<i64> = (1..=CONTENDERS)
        .zip(&results)
        .filter(|(_, result)| result.is_ok())
        .map(|(identity, _)| identity)
        .collect();
    let taken = results
        .iter()
        .filter(|result| {
            matches!(
                result,
                Err(QuestError::AlreadyRegistered(RoleSlot::GroupCurator(number))) if number == "101"
            )
        })
        .count();
    assert_eq!(winners.len(), 1);
    assert_eq!(taken, CONTENDERS as usize - 1);

    let group = api.roles().group_of(winners[0]).unwrap().unwrap();
    assert_eq!(
        api.roles().curator_of_group(group.id).unwrap(),
        Some(winners[0])
    );
}

#[test]
fn concurrent_organizer_registrations_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let api = shared_file_api(&dir);

    let results = race(&api, 11..=10 + CONTENDERS, |api, identity| {
        api.register_organizer(identity, 5)
    });

    let winners = results.iter().filter(|result| result.is_ok()).count();
    let taken = results
        .iter()
        .filter(|result| {
            matches!(
                result,
                Err(QuestError::AlreadyRegistered(RoleSlot::StationOrganizer(5)))
            )
        })
        .count();
    assert_eq!(winners, 1);
    assert_eq!(taken, CONTENDERS as usize - 1);

    let organizers = (11..=10 + CONTENDERS)
        .filter(|identity| api.role_of(*identity).unwrap() == Some(Role::Organizer))
        .count();
    assert_eq!(organizers, 1);
}
