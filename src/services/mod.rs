pub mod consensus_aggregator;
pub mod engine;
pub mod escalation_sweep;
pub mod f1_tracker;
pub mod quorum_assignment;
pub mod response_intake;
pub mod sweep_daemon;
pub mod tier_service;
pub mod validator_registry;

pub use consensus_aggregator::{AggregationOutcome, ConsensusAggregator};
pub use engine::ValidationEngine;
pub use escalation_sweep::{EscalationSweep, SweepReport};
pub use f1_tracker::F1Tracker;
pub use quorum_assignment::{rank_candidates, QuorumAssignmentService, StratifiedCandidates};
pub use response_intake::{GroundTruthOutcome, ResponseIntakeService, ResponseOutcome};
pub use sweep_daemon::{
    DaemonHandle, DaemonStatus, StopReason, SweepDaemon, SweepDaemonConfig, SweepDaemonEvent,
};
pub use tier_service::TierService;
pub use validator_registry::{Registration, ValidatorRegistryService};
