//! Rolling accuracy tracking for validators.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{is_exact_match, Evaluation, Recommendation, METRICS_WINDOW};
use crate::domain::ports::{Clock, EvaluationRepository, ScoreOutcome};

/// Scores completed evaluations against ground truth and refreshes
/// precision/recall/F1 over each validator's most recent resolved evaluations.
pub struct F1Tracker<E>
where
    E: EvaluationRepository,
{
    evaluations: Arc<E>,
    clock: Arc<dyn Clock>,
}

impl<E> F1Tracker<E>
where
    E: EvaluationRepository,
{
    pub fn new(evaluations: Arc<E>, clock: Arc<dyn Clock>) -> Self {
        Self { evaluations, clock }
    }

    /// Score one completed evaluation and refresh its validator's metrics.
    ///
    /// The claim, the counters and the recomputed window commit together, so a
    /// slower scorer can never overwrite metrics computed from a newer window.
    #[instrument(skip(self, evaluation), fields(evaluation_id = %evaluation.id, validator_id = %evaluation.validator_id))]
    pub async fn score(&self, evaluation: &Evaluation, ground_truth: Recommendation) -> DomainResult<ScoreOutcome> {
        let Some(recommendation) = evaluation.recommendation else {
            return Ok(ScoreOutcome::AlreadyScored);
        };

        let correct = is_exact_match(recommendation, ground_truth);
        let outcome = self
            .evaluations
            .score_evaluation(evaluation.id, correct, METRICS_WINDOW, self.clock.now())
            .await?;

        match &outcome {
            ScoreOutcome::AlreadyScored => debug!("evaluation already scored"),
            ScoreOutcome::Scored { metrics: Some(m) } => debug!(
                f1 = m.f1_score,
                precision = m.precision,
                recall = m.recall,
                sample_size = m.sample_size,
                correct,
                "validator metrics updated"
            ),
            ScoreOutcome::Scored { metrics: None } => debug!("validator not found, metrics not stored"),
        }
        Ok(outcome)
    }
}
