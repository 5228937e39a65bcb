//! Validator registry port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{TierChange, Validator, ValidatorTier};

/// Which geographic pool to draw candidates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidatePool {
    /// Validators with a home point.
    Local,
    /// Validators with no home region.
    #[default]
    Global,
}

/// Read contract for candidate selection.
#[derive(Debug, Clone, Default)]
pub struct CandidateQuery {
    /// Owning agent of the submission; its validators are never candidates.
    pub exclude_agent_id: Uuid,
    /// Validators already holding an evaluation for the submission.
    pub exclude_validator_ids: Vec<Uuid>,
    pub min_tier: Option<ValidatorTier>,
    pub pool: CandidatePool,
    /// Validators at or above this daily count are skipped.
    pub daily_limit: i64,
}

/// Filter criteria for listing validators.
#[derive(Debug, Clone, Default)]
pub struct ValidatorFilter {
    pub tier: Option<ValidatorTier>,
    pub agent_id: Option<Uuid>,
    pub active_only: bool,
}

/// Repository interface for validator persistence.
///
/// Writes are targeted field updates; there is no full-row replacement.
#[async_trait]
pub trait ValidatorRepository: Send + Sync {
    /// Register a new validator.
    async fn create(&self, validator: &Validator) -> DomainResult<()>;

    /// Get a validator by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Validator>>;

    /// List validators with optional filters.
    async fn list(&self, filter: ValidatorFilter) -> DomainResult<Vec<Validator>>;

    /// Active validators eligible for assignment under `query`.
    async fn find_candidates(&self, query: &CandidateQuery) -> DomainResult<Vec<Validator>>;

    /// Move a validator from `change.from_tier` to `change.to_tier` and append the
    /// audit row in one transaction. Returns false if the tier no longer matches.
    async fn apply_tier_change(&self, change: &TierChange) -> DomainResult<bool>;

    /// Most recent tier change for a validator.
    async fn last_tier_change(&self, id: Uuid) -> DomainResult<Option<TierChange>>;

    /// Full tier history, oldest first.
    async fn tier_history(&self, id: Uuid) -> DomainResult<Vec<TierChange>>;

    /// Zero daily counters not yet reset since `day_start`. Returns rows touched.
    async fn reset_daily_counts(&self, day_start: DateTime<Utc>, now: DateTime<Utc>) -> DomainResult<u64>;

    /// Remove a validator from future candidate pools.
    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<()>;
}
