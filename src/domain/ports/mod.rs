//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that adapters implement:
//! - ValidatorRepository: validator registry reads and targeted writes
//! - EvaluationRepository: assignment rows and the sweep's set-based queries
//! - ConsensusRepository: write-once consensus results
//! - GroundTruthRepository: moderation decisions used for scoring
//! - ProximitySearch: nearest-within-radius lookup
//! - ValidatorNotifier: fire-and-forget owner notifications
//! - Clock: injectable wall clock

pub mod clock;
pub mod consensus_repository;
pub mod evaluation_repository;
pub mod ground_truth_repository;
pub mod notifier;
pub mod proximity;
pub mod validator_repository;

pub use clock::{utc_day_start, Clock, ManualClock, SystemClock};
pub use consensus_repository::ConsensusRepository;
pub use evaluation_repository::{
    EvaluationRepository, ScoreOutcome, StatusCounts, SubmissionKey, SubmissionProgress,
};
pub use ground_truth_repository::GroundTruthRepository;
pub use notifier::{NotificationEvent, ValidatorNotifier};
pub use proximity::ProximitySearch;
pub use validator_repository::{CandidatePool, CandidateQuery, ValidatorFilter, ValidatorRepository};
