//! Operator CLI for the quest ledger.
//!
//! # Responsibility
//! - Provision stations from a seed file.
//! - Run admin actions (phases, manual payments, standings) from a shell.

use clap::{Parser, Subcommand};
use log::{error, info};
use quest_core::{
    default_log_level, init_logging, load_config, load_station_seeds, CoreConfig, Points,
    QuestApi,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "quest", version, about = "Station reservation and scoring ledger")]
struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, env = "QUEST_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `db_path` from the config.
    #[arg(long, env = "QUEST_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert stations from a JSON seed file (only into an empty table).
    Seed { file: PathBuf },
    /// Open organizer registration.
    Open,
    /// Close organizer registration.
    Close,
    /// Start the quest.
    Begin,
    /// End the quest; stations can no longer be taken.
    End,
    /// Show the three phase flags.
    Phase,
    /// Pay points to a group by hand.
    Pay { group: String, points: String },
    /// Leaderboard, best group first.
    Stats,
    /// Free stations with their location.
    Free,
    /// Every station with its occupancy.
    Stations,
    /// Release a station regardless of who holds it.
    Release { station: u32 },
    /// Grant the admin role to an identity.
    GrantAdmin { identity: i64 },
    /// List groups whose cached score disagrees with the ledger.
    Audit,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Seed { .. } => "seed",
            Self::Open => "open",
            Self::Close => "close",
            Self::Begin => "begin",
            Self::End => "end",
            Self::Phase => "phase",
            Self::Pay { .. } => "pay",
            Self::Stats => "stats",
            Self::Free => "free",
            Self::Stations => "stations",
            Self::Release { .. } => "release",
            Self::GrantAdmin { .. } => "grant-admin",
            Self::Audit => "audit",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.name();
    match run(cli) {
        Ok(()) => {
            info!("event=cli_command module=cli status=ok command={command}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_command module=cli status=error command={command} error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => load_config(path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(log_dir) = &config.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let api = QuestApi::open(&config).map_err(|err| err.to_string())?;
    match cli.command {
        Command::Seed { file } => {
            let seeds = load_station_seeds(&file).map_err(|err| err.to_string())?;
            let inserted = api.seed_stations(&seeds).map_err(|err| err.to_string())?;
            if inserted == 0 {
                println!("Stations already provisioned; nothing inserted.");
            } else {
                println!("Inserted {inserted} stations.");
            }
        }
        Command::Open => {
            api.phases().open_registration().map_err(|err| err.to_string())?;
            println!("Organizer registration is open.");
        }
        Command::Close => {
            api.phases().close_registration().map_err(|err| err.to_string())?;
            println!("Organizer registration is closed.");
        }
        Command::Begin => {
            api.phases().begin_quest().map_err(|err| err.to_string())?;
            let recipients = api
                .roles()
                .registered_identities()
                .map_err(|err| err.to_string())?;
            println!(
                "Quest started. {} registered participants to notify.",
                recipients.len()
            );
        }
        Command::End => {
            api.phases().end_quest().map_err(|err| err.to_string())?;
            println!("Quest ended. Taking new stations is no longer allowed.");
        }
        Command::Phase => {
            let state = api.phases().state().map_err(|err| err.to_string())?;
            println!("registration_open={}", state.registration_open);
            println!("quest_started={}", state.quest_started);
            println!("quest_ended={}", state.quest_ended);
        }
        Command::Pay { group, points } => {
            let points: Points = points.parse().map_err(|err: quest_core::PointsError| {
                err.to_string()
            })?;
            api.scoring()
                .manual_pay(&group, points)
                .map_err(|err| err.to_string())?;
            println!("Paid {points} points to group {}.", group.trim());
        }
        Command::Stats => {
            let rows = api.leaderboard().map_err(|err| err.to_string())?;
            if rows.is_empty() {
                println!("There are no registered groups yet.");
            }
            for (position, row) in rows.iter().enumerate() {
                println!("{}. Group {} - {}", position + 1, row.group_number, row.score);
            }
        }
        Command::Free => {
            let free = api.list_free_stations().map_err(|err| err.to_string())?;
            if free.is_empty() {
                println!("No free stations available.");
            }
            for station in free {
                println!("{} ({})", station.number, station.location);
            }
        }
        Command::Stations => {
            let stations = api.stations().list_all().map_err(|err| err.to_string())?;
            for station in stations {
                let status = if station.is_free { "free" } else { "occupied" };
                println!(
                    "{} {} [{}] {}",
                    station.number, station.name, station.location, status
                );
            }
        }
        Command::Release { station } => {
            api.release_station(station).map_err(|err| err.to_string())?;
            println!("Station {station} has been marked as free.");
        }
        Command::GrantAdmin { identity } => {
            api.roles()
                .grant_admin(identity)
                .map_err(|err| err.to_string())?;
            println!("Identity {identity} is now an admin.");
        }
        Command::Audit => {
            let drifts = api.scoring().ledger_drift().map_err(|err| err.to_string())?;
            if drifts.is_empty() {
                println!("Ledger and cached scores agree.");
            }
            for drift in drifts {
                println!(
                    "Group {}: cached {} vs ledger {}",
                    drift.group_number, drift.cached, drift.ledger
                );
            }
        }
    }
    Ok(())
}
