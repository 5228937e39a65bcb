use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project configuration and the default database.
pub const CONFIG_DIR: &str = ".peerval";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid evaluation_ttl_secs: must be greater than 0")]
    ZeroEvaluationTtl,

    #[error("Invalid local_radius_km: {0}. Must be positive")]
    InvalidLocalRadius(f64),

    #[error("Invalid daily_evaluation_limit: {0}. Must be at least 1")]
    InvalidDailyLimit(i64),

    #[error("Invalid {0} weight: {1}. Must be positive")]
    InvalidVoteWeight(&'static str, f64),

    #[error("Invalid majority_threshold: {0}. Must be in [0.5, 1.0)")]
    InvalidMajorityThreshold(f64),

    #[error("Invalid sweep interval_secs: must be greater than 0")]
    ZeroSweepInterval,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .peerval/config.yaml (project config, created by init)
    /// 3. .peerval/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PEERVAL_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same as [`ConfigLoader::load`], reading YAML files from `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("PEERVAL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let quorum = &config.quorum;
        if quorum.evaluation_ttl_secs == 0 {
            return Err(ConfigError::ZeroEvaluationTtl);
        }
        if quorum.local_radius_km.is_nan() || quorum.local_radius_km <= 0.0 {
            return Err(ConfigError::InvalidLocalRadius(quorum.local_radius_km));
        }
        if quorum.daily_evaluation_limit < 1 {
            return Err(ConfigError::InvalidDailyLimit(quorum.daily_evaluation_limit));
        }

        let consensus = &config.consensus;
        for (name, weight) in [
            ("apprentice", consensus.apprentice_weight),
            ("journeyman", consensus.journeyman_weight),
            ("expert", consensus.expert_weight),
        ] {
            if weight.is_nan() || weight <= 0.0 {
                return Err(ConfigError::InvalidVoteWeight(name, weight));
            }
        }
        // A side must strictly exceed the threshold, so 1.0 could never be met.
        if !(0.5..1.0).contains(&consensus.majority_threshold) {
            return Err(ConfigError::InvalidMajorityThreshold(consensus.majority_threshold));
        }

        if config.sweep.interval_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if config.sweep.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationFailed(
                "sweep.max_consecutive_failures must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".peerval/peerval.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.quorum.evaluation_ttl_secs, 86_400);
        assert_eq!(config.sweep.interval_secs, 60);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 5
logging:
  level: debug
  format: pretty
quorum:
  evaluation_ttl_secs: 3600
  local_radius_km: 25.0
consensus:
  expert_weight: 4.0
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.quorum.evaluation_ttl_secs, 3600);
        assert_eq!(config.quorum.daily_evaluation_limit, 50);
        assert!((config.consensus.expert_weight - 4.0).abs() < f64::EPSILON);
        assert!((config.consensus.apprentice_weight - 1.0).abs() < f64::EPSILON);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn test_validate_quorum_settings() {
        let mut config = Config::default();
        config.quorum.evaluation_ttl_secs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::ZeroEvaluationTtl)));

        let mut config = Config::default();
        config.quorum.local_radius_km = -1.0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLocalRadius(_))));

        let mut config = Config::default();
        config.quorum.daily_evaluation_limit = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidDailyLimit(0))));
    }

    #[test]
    fn test_validate_consensus_settings() {
        let mut config = Config::default();
        config.consensus.journeyman_weight = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidVoteWeight("journeyman", _))
        ));

        let mut config = Config::default();
        config.consensus.majority_threshold = 0.4;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMajorityThreshold(_))
        ));
    }

    #[test]
    fn test_validate_zero_sweep_interval() {
        let mut config = Config::default();
        config.sweep.interval_secs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::ZeroSweepInterval)));
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "logging:\n  level: info\n  format: json\nquorum:\n  daily_evaluation_limit: 20\n",
        )
        .unwrap();
        fs::write(dir.path().join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        let config = temp_env::with_var("PEERVAL_QUORUM__LOCAL_RADIUS_KM", Some("10.0"), || {
            ConfigLoader::load_from_dir(dir.path()).unwrap()
        });

        assert_eq!(config.logging.level, "debug", "local.yaml should win");
        assert_eq!(config.logging.format, "json", "base value should persist");
        assert_eq!(config.quorum.daily_evaluation_limit, 20);
        assert!((config.quorum.local_radius_km - 10.0).abs() < f64::EPSILON, "env should win");
    }

    #[test]
    fn test_env_rejects_invalid_value() {
        let dir = TempDir::new().unwrap();
        let result = temp_env::with_var("PEERVAL_SWEEP__INTERVAL_SECS", Some("0"), || {
            ConfigLoader::load_from_dir(dir.path())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(&path, "sweep:\n  interval_secs: 15\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.sweep.interval_secs, 15);
        assert!(config.sweep.run_on_startup);
    }
}
