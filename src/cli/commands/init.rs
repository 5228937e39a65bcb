//! Implementation of the `peerval init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::adapters::sqlite::initialize_from_config;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml with defaults
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
    pub config_written: bool,
    pub database_path: String,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("Wrote default configuration to {}", self.config_path.display()));
        }
        lines.push(format!("Database ready at {}", self.database_path));
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let target = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };
    let config_dir = target.join(CONFIG_DIR);
    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_path = config_dir.join("config.yaml");
    let config_written = write_default_config(&config_path, args.force).await?;

    // A relative database path resolves against the target directory.
    let mut database = config.database.clone();
    if Path::new(&database.path).is_relative() {
        database.path = target.join(&database.path).to_string_lossy().into_owned();
    }
    let pool = initialize_from_config(&database)
        .await
        .with_context(|| format!("Failed to initialize database at {}", database.path))?;
    pool.close().await;

    let out = InitOutput {
        success: true,
        message: format!("Initialized peerval in {}", target.display()),
        config_path,
        config_written,
        database_path: database.path,
    };
    output(&out, json_mode);
    Ok(())
}

async fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    let yaml = serde_yaml::to_string(&Config::default()).context("Failed to serialize default config")?;
    fs::write(path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_config_round_trips_through_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        assert!(write_default_config(&path, false).await.unwrap());
        let loaded = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(loaded.quorum.daily_evaluation_limit, Config::default().quorum.daily_evaluation_limit);
    }

    #[tokio::test]
    async fn test_existing_config_kept_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "sweep:\n  interval_secs: 5\n").await.unwrap();

        assert!(!write_default_config(&path, false).await.unwrap());
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap().sweep.interval_secs, 5);

        assert!(write_default_config(&path, true).await.unwrap());
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap().sweep.interval_secs, 60);
    }
}
