pub mod assign;
pub mod consensus;
pub mod ground_truth;
pub mod init;
pub mod respond;
pub mod sweep;
pub mod validator;

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::adapters::notify::TracingNotifier;
use crate::adapters::sqlite::initialize_from_config;
use crate::domain::models::{Config, Recommendation};
use crate::domain::ports::SystemClock;
use crate::services::ValidationEngine;

/// Open the configured database and wire every service on top of it.
pub(crate) async fn open_engine(config: &Config) -> Result<ValidationEngine> {
    let pool = initialize_from_config(&config.database)
        .await
        .context("Failed to initialize database. Run 'peerval init' first.")?;
    Ok(ValidationEngine::new(pool, config, Arc::new(TracingNotifier), Arc::new(SystemClock)))
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|e| format!("invalid UUID '{value}': {e}"))
}

pub(crate) fn parse_recommendation(value: &str) -> Result<Recommendation, String> {
    Recommendation::parse_str(value)
        .ok_or_else(|| format!("invalid recommendation '{value}': expected approved, rejected or flagged"))
}
