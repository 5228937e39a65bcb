//! SQLite implementation of the GroundTruthRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::format_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Recommendation;
use crate::domain::ports::GroundTruthRepository;

#[derive(Clone)]
pub struct SqliteGroundTruthRepository {
    pool: SqlitePool,
}

impl SqliteGroundTruthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroundTruthRepository for SqliteGroundTruthRepository {
    async fn record(
        &self,
        submission_id: Uuid,
        submission_type: &str,
        decision: Recommendation,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO ground_truth (submission_id, submission_type, decision, resolved_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (submission_id, submission_type) DO NOTHING"#
        )
        .bind(submission_id.to_string())
        .bind(submission_type)
        .bind(decision.as_str())
        .bind(format_datetime(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, submission_id: Uuid, submission_type: &str) -> DomainResult<Option<Recommendation>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT decision FROM ground_truth WHERE submission_id = ? AND submission_type = ?"
        )
        .bind(submission_id.to_string())
        .bind(submission_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(decision,)| {
            Recommendation::parse_str(&decision)
                .ok_or_else(|| DomainError::SerializationError(format!("Invalid ground truth: {decision}")))
        })
        .transpose()
    }
}
