//! SQLite implementation of the ConsensusRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::format_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConsensusDecision, ConsensusResult, Recommendation};
use crate::domain::ports::ConsensusRepository;

#[derive(Clone)]
pub struct SqliteConsensusRepository {
    pool: SqlitePool,
}

impl SqliteConsensusRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsensusRepository for SqliteConsensusRepository {
    async fn insert_if_absent(&self, result: &ConsensusResult) -> DomainResult<bool> {
        // UNIQUE(submission_id, submission_type) settles races between the
        // aggregator and the sweep: the loser's insert is ignored.
        let inserted = sqlx::query(
            r#"INSERT INTO consensus_results (id, submission_id, submission_type, decision, confidence,
               quorum_size, responses_received, approve_weight, reject_weight, escalate_weight,
               escalation_reason, ground_truth_decision, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (submission_id, submission_type) DO NOTHING"#
        )
        .bind(result.id.to_string())
        .bind(result.submission_id.to_string())
        .bind(&result.submission_type)
        .bind(result.decision.as_str())
        .bind(result.confidence)
        .bind(result.quorum_size)
        .bind(result.responses_received)
        .bind(result.approve_weight)
        .bind(result.reject_weight)
        .bind(result.escalate_weight)
        .bind(result.escalation_reason.as_deref())
        .bind(result.ground_truth_decision.map(|d| d.as_str()))
        .bind(format_datetime(result.created_at))
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() == 1)
    }

    async fn get(&self, submission_id: Uuid, submission_type: &str) -> DomainResult<Option<ConsensusResult>> {
        let row: Option<ConsensusRow> = sqlx::query_as(
            "SELECT * FROM consensus_results WHERE submission_id = ? AND submission_type = ?"
        )
        .bind(submission_id.to_string())
        .bind(submission_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, decision: Option<ConsensusDecision>, limit: i64) -> DomainResult<Vec<ConsensusResult>> {
        let rows: Vec<ConsensusRow> = match decision {
            Some(decision) => {
                sqlx::query_as(
                    "SELECT * FROM consensus_results WHERE decision = ? ORDER BY created_at DESC LIMIT ?"
                )
                .bind(decision.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM consensus_results ORDER BY created_at DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ConsensusRow {
    id: String,
    submission_id: String,
    submission_type: String,
    decision: String,
    confidence: f64,
    quorum_size: i64,
    responses_received: i64,
    approve_weight: f64,
    reject_weight: f64,
    escalate_weight: f64,
    escalation_reason: Option<String>,
    ground_truth_decision: Option<String>,
    created_at: String,
}

impl TryFrom<ConsensusRow> for ConsensusResult {
    type Error = DomainError;

    fn try_from(row: ConsensusRow) -> Result<Self, Self::Error> {
        let decision = ConsensusDecision::parse_str(&row.decision)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid decision: {}", row.decision)))?;
        let ground_truth_decision = row
            .ground_truth_decision
            .map(|s| {
                Recommendation::parse_str(&s)
                    .ok_or_else(|| DomainError::SerializationError(format!("Invalid ground truth: {s}")))
            })
            .transpose()?;

        Ok(ConsensusResult {
            id: super::parse_uuid(&row.id)?,
            submission_id: super::parse_uuid(&row.submission_id)?,
            submission_type: row.submission_type,
            decision,
            confidence: row.confidence,
            quorum_size: row.quorum_size,
            responses_received: row.responses_received,
            approve_weight: row.approve_weight,
            reject_weight: row.reject_weight,
            escalate_weight: row.escalate_weight,
            escalation_reason: row.escalation_reason,
            ground_truth_decision,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Utc;

    #[tokio::test]
    async fn test_insert_if_absent_is_write_once() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteConsensusRepository::new(pool);
        let submission = Uuid::new_v4();

        let first = ConsensusResult::quorum_timeout(submission, "post", 1, Utc::now());
        assert!(repo.insert_if_absent(&first).await.unwrap());

        let mut second = ConsensusResult::quorum_timeout(submission, "post", 2, Utc::now());
        second.decision = ConsensusDecision::Approved;
        assert!(!repo.insert_if_absent(&second).await.unwrap());

        let stored = repo.get(submission, "post").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.decision, ConsensusDecision::Escalated);
        assert_eq!(stored.responses_received, 1);

        // Same id, different type is a different submission.
        let other = ConsensusResult::quorum_timeout(submission, "comment", 0, Utc::now());
        assert!(repo.insert_if_absent(&other).await.unwrap());
        assert_eq!(repo.list(Some(ConsensusDecision::Escalated), 10).await.unwrap().len(), 2);
    }
}
