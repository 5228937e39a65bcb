//! Peerval - Peer Consensus Validation Engine
//!
//! Assigns three-validator quorums to community submissions, aggregates their
//! tier-weighted recommendations into a consensus decision, scores validators
//! against moderation ground truth, and promotes or demotes them between
//! trust tiers.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, invariants and port traits
//! - **Adapter Layer** (`adapters`): SQLite storage, geographic search, notifications
//! - **Service Layer** (`services`): Assignment, intake, aggregation, tiers and the sweep
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use peerval::adapters::notify::TracingNotifier;
//! use peerval::adapters::sqlite::initialize_from_config;
//! use peerval::domain::ports::SystemClock;
//! use peerval::{ConfigLoader, ValidationEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let pool = initialize_from_config(&config.database).await?;
//!     let engine = ValidationEngine::new(pool, &config, Arc::new(TracingNotifier), Arc::new(SystemClock));
//!     let report = engine.sweep.run_once().await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AssignmentRequest, Config, ConsensusDecision, ConsensusResult, Evaluation, EvaluationStatus,
    GeoPoint, QuorumAssignment, Recommendation, TierChange, Validator, ValidatorTier,
};
pub use domain::ports::{
    Clock, ConsensusRepository, EvaluationRepository, GroundTruthRepository, ProximitySearch,
    ValidatorNotifier, ValidatorRepository,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AggregationOutcome, EscalationSweep, QuorumAssignmentService, ResponseIntakeService, SweepReport,
    ValidationEngine,
};
