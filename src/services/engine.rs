//! Wires the SQLite adapters into every service.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::{
    ConsensusAggregator, EscalationSweep, F1Tracker, QuorumAssignmentService, ResponseIntakeService,
    SweepDaemon, SweepDaemonConfig, TierService, ValidatorRegistryService,
};
use crate::adapters::geo::HaversineProximity;
use crate::adapters::sqlite::{
    SqliteConsensusRepository, SqliteEvaluationRepository, SqliteGroundTruthRepository,
    SqliteValidatorRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{Clock, ValidatorNotifier};

type V = SqliteValidatorRepository;
type E = SqliteEvaluationRepository;
type C = SqliteConsensusRepository;
type G = SqliteGroundTruthRepository;

/// Every engine service, sharing one pool, clock and notifier.
pub struct ValidationEngine {
    pub registry: ValidatorRegistryService<V>,
    pub assignment: QuorumAssignmentService<V, E>,
    pub intake: ResponseIntakeService<V, E, C, G>,
    pub aggregator: Arc<ConsensusAggregator<V, E, C, G>>,
    pub sweep: Arc<EscalationSweep<V, E, C, G>>,
    pub consensus: Arc<C>,
    pub evaluations: Arc<E>,
    sweep_daemon_config: SweepDaemonConfig,
}

impl ValidationEngine {
    pub fn new(
        pool: SqlitePool,
        config: &Config,
        notifier: Arc<dyn ValidatorNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validators = Arc::new(SqliteValidatorRepository::new(pool.clone()));
        let evaluations = Arc::new(SqliteEvaluationRepository::new(pool.clone()));
        let consensus = Arc::new(SqliteConsensusRepository::new(pool.clone()));
        let ground_truth = Arc::new(SqliteGroundTruthRepository::new(pool));

        let aggregator = Arc::new(ConsensusAggregator::new(
            validators.clone(),
            evaluations.clone(),
            consensus.clone(),
            ground_truth.clone(),
            clock.clone(),
            config.consensus.clone(),
        ));
        let f1_tracker = Arc::new(F1Tracker::new(evaluations.clone(), clock.clone()));
        let tiers = Arc::new(TierService::new(validators.clone(), notifier, clock.clone()));

        Self {
            registry: ValidatorRegistryService::new(validators.clone(), clock.clone()),
            assignment: QuorumAssignmentService::new(
                validators.clone(),
                evaluations.clone(),
                Arc::new(HaversineProximity),
                clock.clone(),
                config.quorum.clone(),
            ),
            intake: ResponseIntakeService::new(
                evaluations.clone(),
                ground_truth,
                f1_tracker,
                tiers,
                aggregator.clone(),
                clock.clone(),
            ),
            sweep: Arc::new(EscalationSweep::new(
                validators,
                evaluations.clone(),
                consensus.clone(),
                aggregator.clone(),
                clock,
            )),
            aggregator,
            consensus,
            evaluations,
            sweep_daemon_config: SweepDaemonConfig::from(&config.sweep),
        }
    }

    pub fn sweep_daemon(&self) -> SweepDaemon<V, E, C, G> {
        SweepDaemon::new(self.sweep.clone(), self.sweep_daemon_config.clone())
    }
}
