#![allow(dead_code)]

use quest_core::{PhaseFlag, QuestApi, StationSeed};

pub const ADMIN: i64 = 900;

/// In-memory api with `count` stations numbered from 1 and one admin.
pub fn api_with_stations(count: u32) -> QuestApi {
    let api = QuestApi::in_memory().unwrap();
    api.seed_stations(&station_seeds(count)).unwrap();
    api.bootstrap_admins(&[ADMIN]).unwrap();
    api
}

pub fn station_seeds(count: u32) -> Vec<StationSeed> {
    (1..=count)
        .map(|number| StationSeed {
            number,
            name: format!("Station {number}"),
            location: format!("room {}", 200 + number),
        })
        .collect()
}

pub fn start_quest(api: &QuestApi) {
    api.phases().begin_quest().unwrap();
}

pub fn open_registration(api: &QuestApi) {
    api.phases().set(PhaseFlag::RegistrationOpen, true).unwrap();
}
