use serde::{Deserialize, Serialize};

use super::consensus::VoteWeights;

/// Main configuration structure for the validation engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Quorum assignment configuration
    #[serde(default)]
    pub quorum: QuorumConfig,

    /// Consensus aggregation configuration
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Timeout/escalation sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds a writer waits on SQLite's lock before failing
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_database_path() -> String {
    ".peerval/peerval.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_busy_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
        }
    }
}

/// Quorum assignment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QuorumConfig {
    /// Seconds a validator has to respond before the evaluation expires
    #[serde(default = "default_evaluation_ttl_secs")]
    pub evaluation_ttl_secs: u64,

    /// Radius around a hyperlocal submission in which validators count as local
    #[serde(default = "default_local_radius_km")]
    pub local_radius_km: f64,

    /// Evaluations a validator can be assigned per UTC day
    #[serde(default = "default_daily_evaluation_limit")]
    pub daily_evaluation_limit: i64,
}

const fn default_evaluation_ttl_secs() -> u64 {
    86_400
}

const fn default_local_radius_km() -> f64 {
    50.0
}

const fn default_daily_evaluation_limit() -> i64 {
    50
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            evaluation_ttl_secs: default_evaluation_ttl_secs(),
            local_radius_km: default_local_radius_km(),
            daily_evaluation_limit: default_daily_evaluation_limit(),
        }
    }
}

impl QuorumConfig {
    pub fn evaluation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.evaluation_ttl_secs as i64)
    }
}

/// Consensus aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsensusConfig {
    #[serde(default = "default_apprentice_weight")]
    pub apprentice_weight: f64,

    #[serde(default = "default_journeyman_weight")]
    pub journeyman_weight: f64,

    #[serde(default = "default_expert_weight")]
    pub expert_weight: f64,

    /// Share of vote mass a side must strictly exceed to win
    #[serde(default = "default_majority_threshold")]
    pub majority_threshold: f64,
}

const fn default_apprentice_weight() -> f64 {
    1.0
}

const fn default_journeyman_weight() -> f64 {
    2.0
}

const fn default_expert_weight() -> f64 {
    3.0
}

const fn default_majority_threshold() -> f64 {
    0.5
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            apprentice_weight: default_apprentice_weight(),
            journeyman_weight: default_journeyman_weight(),
            expert_weight: default_expert_weight(),
            majority_threshold: default_majority_threshold(),
        }
    }
}

impl ConsensusConfig {
    pub fn vote_weights(&self) -> VoteWeights {
        VoteWeights {
            apprentice: self.apprentice_weight,
            journeyman: self.journeyman_weight,
            expert: self.expert_weight,
        }
    }
}

/// Timeout/escalation sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepConfig {
    /// Seconds between sweep runs
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Run a sweep immediately when the daemon starts
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,

    /// Consecutive failed runs after which the daemon stops
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_run_on_startup() -> bool {
    true
}

const fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            run_on_startup: default_run_on_startup(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}
