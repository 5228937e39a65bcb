//! Validator responses and ground-truth intake.
//!
//! Every completed evaluation is scored against ground truth at most once,
//! whichever arrives last: the response or the moderation decision.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::consensus_aggregator::{AggregationOutcome, ConsensusAggregator};
use super::f1_tracker::F1Tracker;
use super::tier_service::TierService;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AccuracyMetrics, Evaluation, EvaluationStatus, Recommendation, TierChange};
use crate::domain::ports::{
    Clock, ConsensusRepository, EvaluationRepository, GroundTruthRepository, ScoreOutcome,
    SubmissionKey, ValidatorRepository,
};

/// What a single accepted response set in motion.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    pub evaluation: Evaluation,
    pub metrics: Option<AccuracyMetrics>,
    pub tier_change: Option<TierChange>,
    pub consensus: AggregationOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct GroundTruthOutcome {
    /// False when ground truth for this submission was already on record.
    pub recorded: bool,
    pub decision: Option<Recommendation>,
    pub scored: usize,
    pub tier_changes: Vec<TierChange>,
}

#[derive(Debug, Default)]
struct Scoring {
    metrics: Option<AccuracyMetrics>,
    tier_change: Option<TierChange>,
}

pub struct ResponseIntakeService<V, E, C, G>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
    C: ConsensusRepository,
    G: GroundTruthRepository,
{
    evaluations: Arc<E>,
    ground_truth: Arc<G>,
    f1_tracker: Arc<F1Tracker<E>>,
    tiers: Arc<TierService<V>>,
    aggregator: Arc<ConsensusAggregator<V, E, C, G>>,
    clock: Arc<dyn Clock>,
}

impl<V, E, C, G> ResponseIntakeService<V, E, C, G>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
    C: ConsensusRepository,
    G: GroundTruthRepository,
{
    pub fn new(
        evaluations: Arc<E>,
        ground_truth: Arc<G>,
        f1_tracker: Arc<F1Tracker<E>>,
        tiers: Arc<TierService<V>>,
        aggregator: Arc<ConsensusAggregator<V, E, C, G>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { evaluations, ground_truth, f1_tracker, tiers, aggregator, clock }
    }

    /// Accept a validator's recommendation for a pending evaluation.
    #[instrument(skip(self), fields(submission_id = %submission_id, validator_id = %validator_id, recommendation = recommendation.as_str()))]
    pub async fn respond(
        &self,
        submission_id: Uuid,
        validator_id: Uuid,
        recommendation: Recommendation,
    ) -> DomainResult<ResponseOutcome> {
        let now = self.clock.now();
        let Some(evaluation) = self
            .evaluations
            .complete(submission_id, validator_id, recommendation, now)
            .await?
        else {
            return Err(self.rejection(submission_id, validator_id, now).await?);
        };

        debug!("evaluation completed");
        let key = SubmissionKey::new(submission_id, evaluation.submission_type.clone());

        let scoring = match self.ground_truth.get(submission_id, &key.submission_type).await? {
            Some(truth) => self.score(&evaluation, truth).await?,
            None => Scoring::default(),
        };

        let consensus = self.aggregator.aggregate(&key).await?;

        Ok(ResponseOutcome {
            evaluation,
            metrics: scoring.metrics,
            tier_change: scoring.tier_change,
            consensus,
        })
    }

    /// Record the moderation pipeline's decision and score every response
    /// that was waiting on it.
    ///
    /// Ground truth is write-once; a repeated delivery re-scores nothing new
    /// but still picks up any completed evaluation left unscored.
    #[instrument(skip(self), fields(submission_id = %submission_id, submission_type = %submission_type, decision = decision.as_str()))]
    pub async fn record_ground_truth(
        &self,
        submission_id: Uuid,
        submission_type: &str,
        decision: Recommendation,
    ) -> DomainResult<GroundTruthOutcome> {
        if submission_type.trim().is_empty() {
            return Err(DomainError::ValidationFailed("submission_type cannot be empty".to_string()));
        }

        let now = self.clock.now();
        let recorded = self.ground_truth.record(submission_id, submission_type, decision, now).await?;
        let truth = if recorded {
            decision
        } else {
            let stored = self.ground_truth.get(submission_id, submission_type).await?.unwrap_or(decision);
            if stored != decision {
                warn!(stored = stored.as_str(), "conflicting ground truth ignored");
            }
            stored
        };

        let key = SubmissionKey::new(submission_id, submission_type);
        let mut outcome = GroundTruthOutcome { recorded, decision: Some(truth), ..Default::default() };
        for evaluation in self.evaluations.unscored_completed(&key).await? {
            let scoring = self.score(&evaluation, truth).await?;
            if scoring.metrics.is_some() {
                outcome.scored += 1;
            }
            outcome.tier_changes.extend(scoring.tier_change);
        }

        info!(recorded, scored = outcome.scored, tier_changes = outcome.tier_changes.len(), "ground truth processed");
        Ok(outcome)
    }

    /// Score an evaluation once, then check its validator's tier.
    ///
    /// The tier check runs on committed metrics, so a failure here leaves the
    /// counters intact and the next scored evaluation re-checks.
    async fn score(&self, evaluation: &Evaluation, truth: Recommendation) -> DomainResult<Scoring> {
        let metrics = match self.f1_tracker.score(evaluation, truth).await? {
            ScoreOutcome::AlreadyScored => return Ok(Scoring::default()),
            ScoreOutcome::Scored { metrics } => metrics,
        };
        let tier_change = self.tiers.check_and_apply(evaluation.validator_id).await?;
        Ok(Scoring { metrics, tier_change })
    }

    /// Explain why a response could not be recorded.
    async fn rejection(
        &self,
        submission_id: Uuid,
        validator_id: Uuid,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<DomainError> {
        let Some(existing) = self.evaluations.get_for_validator(submission_id, validator_id).await? else {
            return Ok(DomainError::EvaluationNotFound { submission_id, validator_id });
        };

        let reason = match existing.status {
            EvaluationStatus::Pending if existing.is_past_deadline(now) => "response deadline has passed",
            EvaluationStatus::Pending => "evaluation changed concurrently",
            EvaluationStatus::Completed => "evaluation already has a response",
            EvaluationStatus::Expired => "evaluation has expired",
        };
        warn!(status = existing.status.as_str(), reason, "response rejected");

        Ok(DomainError::InvalidStateTransition {
            from: existing.status.as_str().to_string(),
            to: EvaluationStatus::Completed.as_str().to_string(),
            reason: reason.to_string(),
        })
    }
}
