//! Evaluation record store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AccuracyMetrics, Evaluation, Recommendation};

/// A submission identified the way consensus results are keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub submission_id: Uuid,
    pub submission_type: String,
}

impl SubmissionKey {
    pub fn new(submission_id: Uuid, submission_type: impl Into<String>) -> Self {
        Self { submission_id, submission_type: submission_type.into() }
    }
}

/// Evaluation counts for one submission, grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub completed: i64,
    pub expired: i64,
}

/// Submission with its status counts, as returned by the sweep queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionProgress {
    pub key: SubmissionKey,
    pub counts: StatusCounts,
}

/// Result of scoring one completed evaluation against ground truth.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Another caller scored this evaluation first, or it is not completed.
    AlreadyScored,
    /// The evaluation was claimed and counted. `metrics` is the refreshed
    /// window, or `None` when the validator row no longer exists.
    Scored { metrics: Option<AccuracyMetrics> },
}

/// Repository interface for evaluation persistence.
#[async_trait]
pub trait EvaluationRepository: Send + Sync {
    /// All evaluations for a submission, any status.
    async fn list_for_submission(&self, submission_id: Uuid) -> DomainResult<Vec<Evaluation>>;

    /// Evaluation held by a validator for a submission.
    async fn get_for_validator(&self, submission_id: Uuid, validator_id: Uuid) -> DomainResult<Option<Evaluation>>;

    /// Insert a quorum batch all-or-nothing, bumping each validator's daily count
    /// with a compare-and-set against `daily_limit`.
    ///
    /// Fails with `ConcurrencyConflict` when the batch would leave the submission
    /// holding more than `QUORUM_SIZE` non-expired evaluations.
    async fn insert_quorum(&self, evaluations: &[Evaluation], daily_limit: i64, now: DateTime<Utc>) -> DomainResult<()>;

    /// Mark a pending, unexpired evaluation completed. Returns the updated row,
    /// or `None` when no such pending evaluation exists.
    async fn complete(
        &self,
        submission_id: Uuid,
        validator_id: Uuid,
        recommendation: Recommendation,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Evaluation>>;

    /// Claim a completed evaluation, count it on its validator, and store metrics
    /// recomputed over the validator's latest `window` resolved evaluations.
    ///
    /// All of it commits together or not at all; only the first caller scores.
    async fn score_evaluation(
        &self,
        evaluation_id: Uuid,
        correct: bool,
        window: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<ScoreOutcome>;

    /// Completed evaluations of a submission that were never scored.
    async fn unscored_completed(&self, key: &SubmissionKey) -> DomainResult<Vec<Evaluation>>;

    /// Status counts for a submission.
    async fn status_counts(&self, key: &SubmissionKey) -> DomainResult<StatusCounts>;

    /// Expire every pending evaluation past its deadline. Returns the distinct
    /// submissions touched.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<Vec<SubmissionKey>>;

    /// Submissions with an expired evaluation, nothing pending, fewer than
    /// `quorum` completed, and no consensus result.
    async fn stalled_quorums(&self, quorum: i64) -> DomainResult<Vec<SubmissionProgress>>;

    /// Submissions with at least `quorum` completed evaluations and no consensus result.
    async fn unaggregated_quorums(&self, quorum: i64) -> DomainResult<Vec<SubmissionKey>>;
}
