//! Weighted consensus over completed evaluations.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    round4, ConsensusConfig, ConsensusResult, EvaluationStatus, VoteTally, QUORUM_SIZE,
};
use crate::domain::ports::{
    Clock, ConsensusRepository, EvaluationRepository, GroundTruthRepository, SubmissionKey,
    ValidatorRepository,
};

#[derive(Debug, Clone)]
pub enum AggregationOutcome {
    /// This call wrote the consensus result.
    Created(ConsensusResult),
    /// A result already existed; nothing was written.
    AlreadyDecided,
    /// Fewer than a full quorum of responses so far.
    QuorumIncomplete { completed: usize },
}

impl AggregationOutcome {
    pub fn result(&self) -> Option<&ConsensusResult> {
        match self {
            Self::Created(result) => Some(result),
            _ => None,
        }
    }
}

pub struct ConsensusAggregator<V, E, C, G>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
    C: ConsensusRepository,
    G: GroundTruthRepository,
{
    validators: Arc<V>,
    evaluations: Arc<E>,
    consensus: Arc<C>,
    ground_truth: Arc<G>,
    clock: Arc<dyn Clock>,
    config: ConsensusConfig,
}

impl<V, E, C, G> ConsensusAggregator<V, E, C, G>
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
        ground_truth: Arc<G>,
        clock: Arc<dyn Clock>,
        config: ConsensusConfig,
    ) -> Self {
        Self { validators, evaluations, consensus, ground_truth, clock, config }
    }

    /// Write the consensus result for a submission once its quorum has responded.
    ///
    /// Safe to call repeatedly and concurrently: the write is insert-if-absent.
    #[instrument(skip(self), fields(submission_id = %key.submission_id, submission_type = %key.submission_type))]
    pub async fn aggregate(&self, key: &SubmissionKey) -> DomainResult<AggregationOutcome> {
        if self.consensus.get(key.submission_id, &key.submission_type).await?.is_some() {
            return Ok(AggregationOutcome::AlreadyDecided);
        }

        let completed: Vec<_> = self
            .evaluations
            .list_for_submission(key.submission_id)
            .await?
            .into_iter()
            .filter(|e| e.submission_type == key.submission_type && e.status == EvaluationStatus::Completed)
            .collect();

        if completed.len() < QUORUM_SIZE {
            debug!(completed = completed.len(), "quorum not yet satisfied");
            return Ok(AggregationOutcome::QuorumIncomplete { completed: completed.len() });
        }

        let weights = self.config.vote_weights();
        let mut tally = VoteTally::default();
        for evaluation in &completed {
            let Some(recommendation) = evaluation.recommendation else {
                continue;
            };
            let tier = self
                .validators
                .get(evaluation.validator_id)
                .await?
                .map(|v| v.tier)
                .unwrap_or_default();
            tally.add(recommendation, weights.for_tier(tier));
        }

        let outcome = tally.resolve(self.config.majority_threshold);
        let result = ConsensusResult {
            id: Uuid::new_v4(),
            submission_id: key.submission_id,
            submission_type: key.submission_type.clone(),
            decision: outcome.decision,
            confidence: outcome.confidence,
            quorum_size: QUORUM_SIZE as i64,
            responses_received: tally.responses,
            approve_weight: round4(tally.approve),
            reject_weight: round4(tally.reject),
            escalate_weight: round4(tally.escalate),
            escalation_reason: outcome.escalation_reason,
            ground_truth_decision: self.ground_truth.get(key.submission_id, &key.submission_type).await?,
            created_at: self.clock.now(),
        };

        if !self.consensus.insert_if_absent(&result).await? {
            debug!("consensus written concurrently");
            return Ok(AggregationOutcome::AlreadyDecided);
        }

        info!(
            decision = result.decision.as_str(),
            confidence = result.confidence,
            responses = result.responses_received,
            "consensus reached"
        );
        Ok(AggregationOutcome::Created(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteConsensusRepository, SqliteEvaluationRepository,
        SqliteGroundTruthRepository, SqliteValidatorRepository,
    };
    use crate::domain::models::{
        ConsensusDecision, Evaluation, Recommendation, Validator, ValidatorTier, ESCALATION_NO_MAJORITY,
    };
    use crate::domain::ports::ManualClock;
    use chrono::{Duration, Utc};

    type Aggregator = ConsensusAggregator<
        SqliteValidatorRepository,
        SqliteEvaluationRepository,
        SqliteConsensusRepository,
        SqliteGroundTruthRepository,
    >;

    struct Fixture {
        aggregator: Aggregator,
        validators: Arc<SqliteValidatorRepository>,
        evaluations: Arc<SqliteEvaluationRepository>,
    }

    async fn setup() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let validators = Arc::new(SqliteValidatorRepository::new(pool.clone()));
        let evaluations = Arc::new(SqliteEvaluationRepository::new(pool.clone()));
        let aggregator = ConsensusAggregator::new(
            validators.clone(),
            evaluations.clone(),
            Arc::new(SqliteConsensusRepository::new(pool.clone())),
            Arc::new(SqliteGroundTruthRepository::new(pool)),
            Arc::new(ManualClock::new(Utc::now())),
            ConsensusConfig::default(),
        );
        Fixture { aggregator, validators, evaluations }
    }

    /// Seed a quorum and record the given (tier, recommendation) responses.
    async fn quorum(f: &Fixture, votes: &[(ValidatorTier, Option<Recommendation>)]) -> SubmissionKey {
        let key = SubmissionKey::new(Uuid::new_v4(), "post");
        let now = Utc::now();
        let mut rows = Vec::new();
        for (tier, _) in votes {
            let v = Validator::new(Uuid::new_v4(), now).with_tier(*tier);
            f.validators.create(&v).await.unwrap();
            rows.push(Evaluation::new(key.submission_id, "post", v.id, now, Duration::hours(1)));
        }
        f.evaluations.insert_quorum(&rows, 50, now).await.unwrap();
        for (row, (_, rec)) in rows.iter().zip(votes) {
            if let Some(rec) = rec {
                f.evaluations.complete(key.submission_id, row.validator_id, *rec, now).await.unwrap();
            }
        }
        key
    }

    #[tokio::test]
    async fn test_majority_approves() {
        let f = setup().await;
        let key = quorum(
            &f,
            &[
                (ValidatorTier::Journeyman, Some(Recommendation::Approved)),
                (ValidatorTier::Journeyman, Some(Recommendation::Approved)),
                (ValidatorTier::Journeyman, Some(Recommendation::Rejected)),
            ],
        )
        .await;

        let outcome = f.aggregator.aggregate(&key).await.unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.decision, ConsensusDecision::Approved);
        assert_eq!(result.confidence, 0.6667);
        assert_eq!(result.approve_weight, 4.0);
    }

    #[tokio::test]
    async fn test_expert_outweighs_apprentices() {
        let f = setup().await;
        let key = quorum(
            &f,
            &[
                (ValidatorTier::Expert, Some(Recommendation::Rejected)),
                (ValidatorTier::Apprentice, Some(Recommendation::Approved)),
                (ValidatorTier::Apprentice, Some(Recommendation::Flagged)),
            ],
        )
        .await;

        let result = f.aggregator.aggregate(&key).await.unwrap().result().cloned().unwrap();
        assert_eq!(result.decision, ConsensusDecision::Rejected);
        assert_eq!(result.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_three_way_split_escalates() {
        let f = setup().await;
        let key = quorum(
            &f,
            &[
                (ValidatorTier::Journeyman, Some(Recommendation::Approved)),
                (ValidatorTier::Journeyman, Some(Recommendation::Rejected)),
                (ValidatorTier::Journeyman, Some(Recommendation::Flagged)),
            ],
        )
        .await;

        let result = f.aggregator.aggregate(&key).await.unwrap().result().cloned().unwrap();
        assert_eq!(result.decision, ConsensusDecision::Escalated);
        assert_eq!(result.escalation_reason.as_deref(), Some(ESCALATION_NO_MAJORITY));
    }

    #[tokio::test]
    async fn test_incomplete_quorum_waits() {
        let f = setup().await;
        let key = quorum(
            &f,
            &[
                (ValidatorTier::Journeyman, Some(Recommendation::Approved)),
                (ValidatorTier::Journeyman, Some(Recommendation::Approved)),
                (ValidatorTier::Journeyman, None),
            ],
        )
        .await;

        let outcome = f.aggregator.aggregate(&key).await.unwrap();
        assert!(matches!(outcome, AggregationOutcome::QuorumIncomplete { completed: 2 }));
    }

    #[tokio::test]
    async fn test_second_aggregation_is_noop() {
        let f = setup().await;
        let key = quorum(
            &f,
            &[
                (ValidatorTier::Expert, Some(Recommendation::Approved)),
                (ValidatorTier::Expert, Some(Recommendation::Approved)),
                (ValidatorTier::Expert, Some(Recommendation::Approved)),
            ],
        )
        .await;

        assert!(f.aggregator.aggregate(&key).await.unwrap().result().is_some());
        assert!(matches!(f.aggregator.aggregate(&key).await.unwrap(), AggregationOutcome::AlreadyDecided));
    }
}
