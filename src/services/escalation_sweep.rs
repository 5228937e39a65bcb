//! Timeout and escalation sweep.
//!
//! Expires overdue pending evaluations, escalates quorums that can no longer
//! reach a decision, finishes any full quorum whose aggregation was missed,
//! and rolls daily evaluation counters over at UTC midnight. Each step is a
//! set-based query over current state, so a crashed or repeated run converges.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::consensus_aggregator::{AggregationOutcome, ConsensusAggregator};
use crate::domain::errors::DomainResult;
use crate::domain::models::{ConsensusResult, QUORUM_SIZE};
use crate::domain::ports::{
    utc_day_start, Clock, ConsensusRepository, EvaluationRepository, GroundTruthRepository,
    ValidatorRepository,
};

/// Counts from one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Submissions that had at least one evaluation expired by this run.
    pub expired_submissions: usize,
    pub quorum_timeouts: usize,
    pub aggregated: usize,
    pub daily_counters_reset: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct EscalationSweep<V, E, C, G>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
    C: ConsensusRepository,
    G: GroundTruthRepository,
{
    validators: Arc<V>,
    evaluations: Arc<E>,
    consensus: Arc<C>,
    aggregator: Arc<ConsensusAggregator<V, E, C, G>>,
    clock: Arc<dyn Clock>,
}

impl<V, E, C, G> EscalationSweep<V, E, C, G>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
    C: ConsensusRepository,
    G: GroundTruthRepository,
{
    pub fn new(
        validators: Arc<V>,
        evaluations: Arc<E>,
        consensus: Arc<C>,
        aggregator: Arc<ConsensusAggregator<V, E, C, G>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { validators, evaluations, consensus, aggregator, clock }
    }

    #[instrument(skip(self))]
    pub async fn run_once(&self) -> DomainResult<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let touched = self.evaluations.expire_overdue(now).await?;
        report.expired_submissions = touched.len();

        // A quorum with nothing pending and too few responses can never decide.
        for stalled in self.evaluations.stalled_quorums(QUORUM_SIZE as i64).await? {
            let result = ConsensusResult::quorum_timeout(
                stalled.key.submission_id,
                stalled.key.submission_type.clone(),
                stalled.counts.completed,
                now,
            );
            if self.consensus.insert_if_absent(&result).await? {
                warn!(
                    submission_id = %stalled.key.submission_id,
                    completed = stalled.counts.completed,
                    expired = stalled.counts.expired,
                    "quorum timed out, escalating"
                );
                report.quorum_timeouts += 1;
            }
        }

        for key in self.evaluations.unaggregated_quorums(QUORUM_SIZE as i64).await? {
            if let AggregationOutcome::Created(_) = self.aggregator.aggregate(&key).await? {
                report.aggregated += 1;
            }
        }

        report.daily_counters_reset = self.validators.reset_daily_counts(utc_day_start(now), now).await?;

        if report.is_empty() {
            tracing::debug!("sweep found nothing to do");
        } else {
            info!(
                expired_submissions = report.expired_submissions,
                quorum_timeouts = report.quorum_timeouts,
                aggregated = report.aggregated,
                daily_counters_reset = report.daily_counters_reset,
                "sweep completed"
            );
        }
        Ok(report)
    }
}
