pub mod assignment;
pub mod config;
pub mod consensus;
pub mod evaluation;
pub mod metrics;
pub mod tier;
pub mod tier_change;
pub mod validator;

pub use assignment::{
    AssignmentRequest, GeographicScope, QuorumAssignment, QuorumComposition, HYBRID_LOCAL_SLOTS,
    QUORUM_SIZE,
};
pub use config::{
    Config, ConsensusConfig, DatabaseConfig, LoggingConfig, QuorumConfig, SweepConfig,
};
pub use consensus::{
    round4, ConsensusDecision, ConsensusResult, TallyOutcome, VoteTally, VoteWeights,
    ESCALATION_FLAGGED_MAJORITY, ESCALATION_NO_MAJORITY, ESCALATION_QUORUM_TIMEOUT,
};
pub use evaluation::{Evaluation, EvaluationStatus, Recommendation};
pub use metrics::{is_exact_match, AccuracyMetrics, METRICS_WINDOW};
pub use tier::{evaluate_transition, TierTransition, ValidatorTier, DEMOTION_GUARD_EVALUATIONS};
pub use tier_change::{evaluations_since_change, TierChange, TierChangeNotification};
pub use validator::{GeoPoint, Validator};
