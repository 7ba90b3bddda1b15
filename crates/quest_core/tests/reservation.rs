mod common;

use common::{api_with_stations, start_quest, station_seeds};
use quest_core::{
    Missing, PhaseFlag, QuestApi, QuestError, ReservationService, Role, ScoringPolicy, Store,
    StoreOptions,
};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn take_marks_station_occupied_by_group() {
    let api = api_with_stations(3);
    let curator = api.register_curator(1, "101").unwrap();
    start_quest(&api);

    let station_id = api.take_station(1, 2).unwrap();
    let station = api.stations().find_by_number(2).unwrap();
    assert_eq!(station.id, station_id);
    assert!(station.is_occupied());
    assert_eq!(station.current_group_id, Some(curator.group_id));

    let free: Vec<u32> = api
        .list_free_stations()
        .unwrap()
        .into_iter()
        .map(|station| station.number)
        .collect();
    assert_eq!(free, vec![1, 3]);
}

#[test]
fn occupied_station_rejects_other_group() {
    let api = api_with_stations(2);
    api.register_curator(1, "101").unwrap();
    api.register_curator(2, "102").unwrap();
    start_quest(&api);
    api.take_station(1, 2).unwrap();

    let err = api.take_station(2, 2).unwrap_err();
    assert!(matches!(err, QuestError::AlreadyOccupied(2)));

    let station = api.stations().find_by_number(2).unwrap();
    let holder = api.roles().group_of(1).unwrap().unwrap();
    assert_eq!(station.current_group_id, Some(holder.id));
}

#[test]
fn take_is_gated_by_quest_phase() {
    let api = api_with_stations(1);
    api.register_curator(1, "101").unwrap();

    let before = api.take_station(1, 1).unwrap_err();
    assert!(matches!(
        before,
        QuestError::PhaseViolation(PhaseFlag::QuestStarted)
    ));

    start_quest(&api);
    api.phases().end_quest().unwrap();
    let after = api.take_station(1, 1).unwrap_err();
    assert!(matches!(
        after,
        QuestError::PhaseViolation(PhaseFlag::QuestEnded)
    ));
    assert!(api.stations().find_by_number(1).unwrap().is_free);
}

#[test]
fn ended_quest_blocks_take_of_occupied_station() {
    let api = api_with_stations(1);
    api.register_curator(1, "101").unwrap();
    api.register_curator(2, "102").unwrap();
    start_quest(&api);
    api.take_station(1, 1).unwrap();
    api.phases().end_quest().unwrap();

    let err = api.take_station(2, 1).unwrap_err();
    assert!(matches!(
        err,
        QuestError::PhaseViolation(PhaseFlag::QuestEnded)
    ));
    let holder = api.roles().group_of(1).unwrap().unwrap();
    assert_eq!(
        api.stations().find_by_number(1).unwrap().current_group_id,
        Some(holder.id)
    );
}

#[test]
fn take_checks_role_before_phase() {
    let api = api_with_stations(1);

    let err = api.take_station(7, 1).unwrap_err();
    assert!(matches!(
        err,
        QuestError::NotRegistered {
            identity: 7,
            required: Role::Curator
        }
    ));
}

#[test]
fn take_unknown_station_is_not_found() {
    let api = api_with_stations(3);
    api.register_curator(1, "101").unwrap();
    start_quest(&api);

    let err = api.take_station(1, 42).unwrap_err();
    assert!(matches!(err, QuestError::NotFound(Missing::Station(42))));
}

#[test]
fn group_may_hold_several_stations() {
    let api = api_with_stations(3);
    api.register_curator(1, "101").unwrap();
    start_quest(&api);

    api.take_station(1, 1).unwrap();
    api.take_station(1, 3).unwrap();
    assert_eq!(api.list_free_stations().unwrap().len(), 1);
}

#[test]
fn release_is_idempotent_and_frees_for_others() {
    let api = api_with_stations(2);
    api.register_curator(1, "101").unwrap();
    let other = api.register_curator(2, "102").unwrap();
    start_quest(&api);
    api.take_station(1, 1).unwrap();

    api.release_station(1).unwrap();
    api.release_station(1).unwrap();
    let station = api.stations().find_by_number(1).unwrap();
    assert!(station.is_free);
    assert_eq!(station.current_group_id, None);

    api.take_station(2, 1).unwrap();
    let station = api.stations().find_by_number(1).unwrap();
    assert_eq!(station.current_group_id, Some(other.group_id));
}

#[test]
fn release_unknown_station_is_not_found() {
    let api = api_with_stations(1);

    let err = api.release_station(9).unwrap_err();
    assert!(matches!(err, QuestError::NotFound(Missing::Station(9))));
    let zero = api.release_station(0).unwrap_err();
    assert!(matches!(zero, QuestError::InvalidInput(_)));
}

#[test]
fn occupancy_flag_always_matches_group_reference() {
    let api = api_with_stations(4);
    api.register_curator(1, "101").unwrap();
    api.register_curator(2, "102").unwrap();
    start_quest(&api);

    api.take_station(1, 1).unwrap();
    api.take_station(2, 2).unwrap();
    let contested = api.take_station(2, 1).unwrap_err();
    assert!(matches!(contested, QuestError::AlreadyOccupied(1)));
    api.release_station(1).unwrap();
    api.take_station(2, 4).unwrap();

    for station in api.stations().list_all().unwrap() {
        assert_eq!(station.is_free, station.current_group_id.is_none());
    }
}

#[test]
fn concurrent_takes_of_one_station_have_one_winner() {
    const CONTENDERS: i64 = 8;

    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(
        dir.path().join("race.db"),
        StoreOptions {
            max_size: CONTENDERS as usize,
            busy_timeout: Duration::from_secs(10),
        },
    )
    .unwrap();
    let api = QuestApi::new(Arc::new(store), ScoringPolicy::default());
    api.seed_stations(&station_seeds(1)).unwrap();
    for identity in 1..=CONTENDERS {
        api.register_curator(identity, &format!("g{identity}"))
            .unwrap();
    }
    start_quest(&api);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=CONTENDERS)
            .map(|identity| {
                let store = api.store();
                scope.spawn(move || ReservationService::new(store).take(identity, 1))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let winners = results.iter().filter(|result| result.is_ok()).count();
    let losers = results
        .iter()
        .filter(|result| matches!(result, Err(QuestError::AlreadyOccupied(1))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, CONTENDERS as usize - 1);

    let station = api.stations().find_by_number(1).unwrap();
    let winner_group = station.current_group_id.unwrap();
    let winner_curator = api.roles().curator_of_group(winner_group).unwrap().unwrap();
    let winner_index = (winner_curator - 1) as usize;
    assert!(results[winner_index].is_ok());
}
