//! Runtime configuration and station provisioning files.
//!
//! # Responsibility
//! - Load `CoreConfig` from JSON, with every field defaulted.
//! - Load and validate the station seed list.
//!
//! # Invariants
//! - Loading never panics; every failure is a `ConfigError`.

use crate::db::{StoreOptions, DEFAULT_BUSY_TIMEOUT};
use crate::model::participant::Identity;
use crate::model::points::Points;
use crate::model::station::StationSeed;
use crate::service::scoring_service::ScoringPolicy;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "quest.sqlite3";
const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "cannot parse `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Reward range limits as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RewardLimits {
    pub max_points: f64,
    pub max_bonus: f64,
}

impl Default for RewardLimits {
    fn default() -> Self {
        Self {
            max_points: 10.0,
            max_bonus: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<String>,
    /// Identities granted the admin role at bootstrap.
    pub admins: Vec<Identity>,
    pub reward_limits: RewardLimits,
    pub manual_pay_creates_group: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            log_level: None,
            log_dir: None,
            admins: Vec::new(),
            reward_limits: RewardLimits::default(),
            manual_pay_creates_group: true,
        }
    }
}

impl CoreConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_size: self.pool_size.max(1),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn scoring_policy(&self) -> Result<ScoringPolicy, ConfigError> {
        let limit = |value: f64, name: &str| {
            Points::from_f64(value)
                .map_err(|err| ConfigError::Invalid(format!("reward_limits.{name}: {err}")))
        };
        Ok(ScoringPolicy {
            max_points: limit(self.reward_limits.max_points, "max_points")?,
            max_bonus: limit(self.reward_limits.max_bonus, "max_bonus")?,
            manual_pay_creates_group: self.manual_pay_creates_group,
        })
    }
}

/// Reads a JSON config file. Missing fields take their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<CoreConfig, ConfigError> {
    let path = path.as_ref();
    let config: CoreConfig = read_json(path)?;
    if config.pool_size == 0 {
        return Err(ConfigError::Invalid("pool_size must be at least 1".to_string()));
    }
    config.scoring_policy()?;
    Ok(config)
}

/// Reads the station provisioning list: a JSON array of
/// `{"number", "name", "location"}` objects.
pub fn load_station_seeds(path: impl AsRef<Path>) -> Result<Vec<StationSeed>, ConfigError> {
    let path = path.as_ref();
    let seeds: Vec<StationSeed> = read_json(path)?;
    let mut seen = HashSet::new();
    for seed in &seeds {
        if seed.number == 0 {
            return Err(ConfigError::Invalid(
                "station numbers start at 1".to_string(),
            ));
        }
        if !seen.insert(seed.number) {
            return Err(ConfigError::Invalid(format!(
                "station {} is listed twice",
                seed.number
            )));
        }
    }
    Ok(seeds)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{load_config, load_station_seeds, ConfigError, CoreConfig};
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_object_yields_defaults() {
        let file = write_temp("{}");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config, CoreConfig::default());

        let policy = config.scoring_policy().unwrap();
        assert_eq!(policy.max_points.cents(), 1000);
        assert_eq!(policy.max_bonus.cents(), 100);
        assert!(policy.manual_pay_creates_group);
    }

    #[test]
    fn partial_config_overrides_fields() {
        let file = write_temp(
            r#"{"admins": [42], "pool_size": 2, "reward_limits": {"max_bonus": 0.5}}"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.admins, vec![42]);
        assert_eq!(config.store_options().max_size, 2);
        assert_eq!(config.reward_limits.max_points, 10.0);
        assert_eq!(config.scoring_policy().unwrap().max_bonus.cents(), 50);
    }

    #[test]
    fn negative_limit_is_rejected() {
        let file = write_temp(r#"{"reward_limits": {"max_points": -1}}"#);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = write_temp("{ not json");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn duplicate_station_seed_is_rejected() {
        let file = write_temp(
            r#"[{"number": 1, "name": "Station 1", "location": "329"},
                {"number": 1, "name": "Again", "location": "hall E"}]"#,
        );
        assert!(matches!(
            load_station_seeds(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
