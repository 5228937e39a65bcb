//! Ground truth from the moderation pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Recommendation;

/// Store of final moderation decisions, joined to evaluations by
/// (submission_id, submission_type).
#[async_trait]
pub trait GroundTruthRepository: Send + Sync {
    /// Record a decision once. Returns false if one was already recorded.
    async fn record(
        &self,
        submission_id: Uuid,
        submission_type: &str,
        decision: Recommendation,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Decision for a submission, if the pipeline has resolved it.
    async fn get(&self, submission_id: Uuid, submission_type: &str) -> DomainResult<Option<Recommendation>>;
}
