//! Event-wide phase flags.

use serde::{Deserialize, Serialize};

/// One of the three independent phase gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseFlag {
    /// Organizers may register for stations.
    RegistrationOpen,
    /// Curators may take stations.
    QuestStarted,
    /// Taking stations is closed for good.
    QuestEnded,
}

impl PhaseFlag {
    pub const ALL: [PhaseFlag; 3] = [
        PhaseFlag::RegistrationOpen,
        PhaseFlag::QuestStarted,
        PhaseFlag::QuestEnded,
    ];

    /// Settings key the flag is persisted under.
    pub fn key(self) -> &'static str {
        match self {
            Self::RegistrationOpen => "org_registration_open",
            Self::QuestStarted => "quest_started",
            Self::QuestEnded => "quest_ended",
        }
    }

    /// Accepts the settings key or the snake_case flag name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "org_registration_open" | "registration_open" => Some(Self::RegistrationOpen),
            "quest_started" => Some(Self::QuestStarted),
            "quest_ended" => Some(Self::QuestEnded),
            _ => None,
        }
    }
}

/// Snapshot of all phase flags, read once at the start of a use-case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub registration_open: bool,
    pub quest_started: bool,
    pub quest_ended: bool,
}

impl PhaseState {
    pub fn get(&self, flag: PhaseFlag) -> bool {
        match flag {
            PhaseFlag::RegistrationOpen => self.registration_open,
            PhaseFlag::QuestStarted => self.quest_started,
            PhaseFlag::QuestEnded => self.quest_ended,
        }
    }

    pub fn set(&mut self, flag: PhaseFlag, value: bool) {
        match flag {
            PhaseFlag::RegistrationOpen => self.registration_open = value,
            PhaseFlag::QuestStarted => self.quest_started = value,
            PhaseFlag::QuestEnded => self.quest_ended = value,
        }
    }

    /// Returns the flag blocking station takes, if any.
    pub fn take_blocker(&self) -> Option<PhaseFlag> {
        if !self.quest_started {
            Some(PhaseFlag::QuestStarted)
        } else if self.quest_ended {
            Some(PhaseFlag::QuestEnded)
        } else {
            None
        }
    }
}
