use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub database: DatabaseSettings,
    #[serde(default)]
    #[validate(nested)]
    pub matching: MatchingSettings,
    #[serde(default)]
    #[validate(nested)]
    pub reconciliation: ReconciliationSettings,
    #[serde(default)]
    #[validate(nested)]
    pub leaderboard: LeaderboardSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseSettings {
    #[validate(length(min = 1))]
    pub url: String,
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1))]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout_secs() -> u64 { 5 }
fn default_idle_timeout_secs() -> u64 { 600 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MatchingSettings {
    /// How long a generation of sessions stays active
    #[serde(default = "default_decay_interval_secs")]
    #[validate(range(min = 1))]
    pub decay_interval_secs: u64,
    /// Opponents on each side of the first pick in large cohorts
    #[serde(default = "default_fairness_window")]
    #[validate(range(min = 1, max = 10000))]
    pub fairness_window: u64,
}

impl MatchingSettings {
    pub fn decay_interval(&self) -> Duration {
        Duration::from_secs(self.decay_interval_secs)
    }
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            decay_interval_secs: default_decay_interval_secs(),
            fairness_window: default_fairness_window(),
        }
    }
}

fn default_decay_interval_secs() -> u64 { 60 }
fn default_fairness_window() -> u64 { 20 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReconciliationSettings {
    #[serde(default = "default_reconciliation_interval_secs")]
    #[validate(range(min = 1))]
    pub interval_secs: u64,
}

impl ReconciliationSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_reconciliation_interval_secs(),
        }
    }
}

fn default_reconciliation_interval_secs() -> u64 { 300 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LeaderboardSettings {
    #[serde(default = "default_leaderboard_size")]
    #[validate(range(min = 1, max = 1000))]
    pub size: u32,
    #[serde(default = "default_cache_capacity")]
    #[validate(range(min = 1))]
    pub cache_capacity: u64,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            size: default_leaderboard_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_leaderboard_size() -> u32 { 20 }
fn default_cache_capacity() -> u64 { 256 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with MATCHUP__)
    /// 4. DATABASE_URL for the database url
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., MATCHUP__MATCHING__DECAY_INTERVAL_SECS -> matching.decay_interval_secs
            .add_source(
                Environment::with_prefix("MATCHUP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }

        Self::finish(builder.build()?)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("MATCHUP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(settings)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;
        Ok(settings)
    }
}
