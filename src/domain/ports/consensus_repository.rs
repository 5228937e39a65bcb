//! Consensus result store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConsensusDecision, ConsensusResult};

/// Repository interface for write-once consensus results.
#[async_trait]
pub trait ConsensusRepository: Send + Sync {
    /// Insert unless a result already exists for the submission.
    /// Returns true when this call created the row.
    async fn insert_if_absent(&self, result: &ConsensusResult) -> DomainResult<bool>;

    /// Result for a submission, if one was written.
    async fn get(&self, submission_id: Uuid, submission_type: &str) -> DomainResult<Option<ConsensusResult>>;

    /// Most recent results, optionally filtered by decision.
    async fn list(&self, decision: Option<ConsensusDecision>, limit: i64) -> DomainResult<Vec<ConsensusResult>>;
}
