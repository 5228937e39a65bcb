//! SQLite implementation of the EvaluationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

use super::format_datetime;
use super::validator_repository::record_score;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AccuracyMetrics, Evaluation, EvaluationStatus, Recommendation, QUORUM_SIZE};
use crate::domain::ports::{
    EvaluationRepository, ScoreOutcome, StatusCounts, SubmissionKey, SubmissionProgress,
};

const STATUS_COUNT_COLUMNS: &str = r#"
    COALESCE(SUM(CASE WHEN e.status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
    COALESCE(SUM(CASE WHEN e.status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
    COALESCE(SUM(CASE WHEN e.status = 'expired' THEN 1 ELSE 0 END), 0) AS expired"#;

const NO_CONSENSUS: &str = r#"NOT EXISTS (
    SELECT 1 FROM consensus_results c
    WHERE c.submission_id = e.submission_id AND c.submission_type = e.submission_type)"#;

#[derive(Clone)]
pub struct SqliteEvaluationRepository {
    pool: SqlitePool,
}

impl SqliteEvaluationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `(recommendation, ground truth)` for a validator's most recent completed,
/// ground-truth-resolved evaluations, newest first.
async fn resolved_window<'e, X: SqliteExecutor<'e>>(
    executor: X,
    validator_id: Uuid,
    limit: i64,
) -> DomainResult<Vec<(Recommendation, Recommendation)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"SELECT e.recommendation, g.decision
           FROM evaluations e
           JOIN ground_truth g
             ON g.submission_id = e.submission_id AND g.submission_type = e.submission_type
           WHERE e.validator_id = ? AND e.status = 'completed' AND e.recommendation IS NOT NULL
           ORDER BY e.responded_at DESC, e.rowid DESC
           LIMIT ?"#
    )
    .bind(validator_id.to_string())
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|(rec, truth)| Ok((parse_recommendation(&rec)?, parse_recommendation(&truth)?)))
        .collect()
}

#[async_trait]
impl EvaluationRepository for SqliteEvaluationRepository {
    async fn list_for_submission(&self, submission_id: Uuid) -> DomainResult<Vec<Evaluation>> {
        let rows: Vec<EvaluationRow> = sqlx::query_as(
            "SELECT * FROM evaluations WHERE submission_id = ? ORDER BY created_at, rowid"
        )
        .bind(submission_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_for_validator(&self, submission_id: Uuid, validator_id: Uuid) -> DomainResult<Option<Evaluation>> {
        let row: Option<EvaluationRow> = sqlx::query_as(
            "SELECT * FROM evaluations WHERE submission_id = ? AND validator_id = ?"
        )
        .bind(submission_id.to_string())
        .bind(validator_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_quorum(&self, evaluations: &[Evaluation], daily_limit: i64, now: DateTime<Utc>) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        for evaluation in evaluations {
            let claimed = sqlx::query(
                r#"UPDATE validators
                   SET daily_evaluation_count = daily_evaluation_count + 1, updated_at = ?
                   WHERE id = ? AND is_active = 1 AND daily_evaluation_count < ?"#
            )
            .bind(format_datetime(now))
            .bind(evaluation.validator_id.to_string())
            .bind(daily_limit)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(DomainError::ConcurrencyConflict {
                    entity: "validator".to_string(),
                    id: evaluation.validator_id.to_string(),
                });
            }

            // The quota update above holds the write lock, so this count cannot go stale.
            let inserted = sqlx::query(
                r#"INSERT INTO evaluations (id, submission_id, submission_type, validator_id, status,
                   recommendation, responded_at, expires_at, scored_at, created_at)
                   SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
                   WHERE (SELECT COUNT(*) FROM evaluations
                          WHERE submission_id = ? AND status != 'expired') < ?"#
            )
            .bind(evaluation.id.to_string())
            .bind(evaluation.submission_id.to_string())
            .bind(&evaluation.submission_type)
            .bind(evaluation.validator_id.to_string())
            .bind(evaluation.status.as_str())
            .bind(evaluation.recommendation.map(|r| r.as_str()))
            .bind(evaluation.responded_at.map(format_datetime))
            .bind(format_datetime(evaluation.expires_at))
            .bind(evaluation.scored_at.map(format_datetime))
            .bind(format_datetime(evaluation.created_at))
            .bind(evaluation.submission_id.to_string())
            .bind(QUORUM_SIZE as i64)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(done) if done.rows_affected() == 0 => {
                    tx.rollback().await?;
                    return Err(DomainError::ConcurrencyConflict {
                        entity: "quorum".to_string(),
                        id: evaluation.submission_id.to_string(),
                    });
                }
                Ok(_) => {}
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    tx.rollback().await?;
                    return Err(DomainError::ConcurrencyConflict {
                        entity: "evaluation".to_string(),
                        id: format!("{}/{}", evaluation.submission_id, evaluation.validator_id),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn complete(
        &self,
        submission_id: Uuid,
        validator_id: Uuid,
        recommendation: Recommendation,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Evaluation>> {
        let row: Option<EvaluationRow> = sqlx::query_as(
            r#"UPDATE evaluations SET status = 'completed', recommendation = ?, responded_at = ?
               WHERE submission_id = ? AND validator_id = ? AND status = 'pending' AND expires_at >= ?
               RETURNING *"#
        )
        .bind(recommendation.as_str())
        .bind(format_datetime(now))
        .bind(submission_id.to_string())
        .bind(validator_id.to_string())
        .bind(format_datetime(now))
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn score_evaluation(
        &self,
        evaluation_id: Uuid,
        correct: bool,
        window: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<ScoreOutcome> {
        let mut tx = self.pool.begin().await?;

        // Claiming first takes the write lock, so the window read below sees
        // every committed ground truth and no other scorer can interleave.
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"UPDATE evaluations SET scored_at = ?
               WHERE id = ? AND status = 'completed' AND scored_at IS NULL
               RETURNING validator_id"#
        )
        .bind(format_datetime(now))
        .bind(evaluation_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((validator_id,)) = claimed else {
            tx.rollback().await?;
            return Ok(ScoreOutcome::AlreadyScored);
        };
        let validator_id = super::parse_uuid(&validator_id)?;

        let resolved = resolved_window(&mut *tx, validator_id, window).await?;
        let metrics = AccuracyMetrics::compute(&resolved);
        let found = record_score(&mut *tx, validator_id, metrics.as_ref(), correct, now).await?;

        tx.commit().await?;
        Ok(ScoreOutcome::Scored { metrics: metrics.filter(|_| found) })
    }

    async fn unscored_completed(&self, key: &SubmissionKey) -> DomainResult<Vec<Evaluation>> {
        let rows: Vec<EvaluationRow> = sqlx::query_as(
            r#"SELECT * FROM evaluations
               WHERE submission_id = ? AND submission_type = ? AND status = 'completed' AND scored_at IS NULL
               ORDER BY responded_at, rowid"#
        )
        .bind(key.submission_id.to_string())
        .bind(&key.submission_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn status_counts(&self, key: &SubmissionKey) -> DomainResult<StatusCounts> {
        let sql = format!(
            "SELECT {STATUS_COUNT_COLUMNS} FROM evaluations e WHERE e.submission_id = ? AND e.submission_type = ?"
        );
        let (pending, completed, expired): (i64, i64, i64) = sqlx::query_as(&sql)
            .bind(key.submission_id.to_string())
            .bind(&key.submission_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(StatusCounts { pending, completed, expired })
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<Vec<SubmissionKey>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"UPDATE evaluations SET status = 'expired'
               WHERE status = 'pending' AND expires_at < ?
               RETURNING submission_id, submission_type"#
        )
        .bind(format_datetime(now))
        .fetch_all(&self.pool)
        .await?;

        let mut seen = HashSet::new();
        let mut touched = Vec::new();
        for (id, submission_type) in rows {
            let key = SubmissionKey::new(super::parse_uuid(&id)?, submission_type);
            if seen.insert(key.clone()) {
                touched.push(key);
            }
        }
        Ok(touched)
    }

    async fn stalled_quorums(&self, quorum: i64) -> DomainResult<Vec<SubmissionProgress>> {
        let sql = format!(
            r#"SELECT e.submission_id, e.submission_type, {STATUS_COUNT_COLUMNS}
               FROM evaluations e
               WHERE {NO_CONSENSUS}
               GROUP BY e.submission_id, e.submission_type
               HAVING expired > 0 AND pending = 0 AND completed < ?
               ORDER BY e.submission_id"#
        );
        let rows: Vec<(String, String, i64, i64, i64)> = sqlx::query_as(&sql)
            .bind(quorum)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, submission_type, pending, completed, expired)| {
                Ok(SubmissionProgress {
                    key: SubmissionKey::new(super::parse_uuid(&id)?, submission_type),
                    counts: StatusCounts { pending, completed, expired },
                })
            })
            .collect()
    }

    async fn unaggregated_quorums(&self, quorum: i64) -> DomainResult<Vec<SubmissionKey>> {
        let sql = format!(
            r#"SELECT e.submission_id, e.submission_type
               FROM evaluations e
               WHERE e.status = 'completed' AND {NO_CONSENSUS}
               GROUP BY e.submission_id, e.submission_type
               HAVING COUNT(*) >= ?
               ORDER BY e.submission_id"#
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(quorum)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, submission_type)| Ok(SubmissionKey::new(super::parse_uuid(&id)?, submission_type)))
            .collect()
    }
}

fn parse_recommendation(s: &str) -> DomainResult<Recommendation> {
    Recommendation::parse_str(s)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid recommendation: {s}")))
}

#[derive(sqlx::FromRow)]
struct EvaluationRow {
    id: String,
    submission_id: String,
    submission_type: String,
    validator_id: String,
    status: String,
    recommendation: Option<String>,
    responded_at: Option<String>,
    expires_at: String,
    scored_at: Option<String>,
    created_at: String,
}

impl TryFrom<EvaluationRow> for Evaluation {
    type Error = DomainError;

    fn try_from(row: EvaluationRow) -> Result<Self, Self::Error> {
        let status = EvaluationStatus::parse_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;
        let recommendation = row.recommendation.as_deref().map(parse_recommendation).transpose()?;

        Ok(Evaluation {
            id: super::parse_uuid(&row.id)?,
            submission_id: super::parse_uuid(&row.submission_id)?,
            submission_type: row.submission_type,
            validator_id: super::parse_uuid(&row.validator_id)?,
            status,
            recommendation,
            responded_at: super::parse_optional_datetime(row.responded_at)?,
            expires_at: super::parse_datetime(&row.expires_at)?,
            scored_at: super::parse_optional_datetime(row.scored_at)?,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteGroundTruthRepository, SqliteValidatorRepository,
    };
    use crate::domain::models::Validator;
    use crate::domain::ports::{GroundTruthRepository, ValidatorRepository};
    use chrono::Duration;

    async fn setup() -> (SqliteEvaluationRepository, SqliteValidatorRepository) {
        let pool = create_migrated_test_pool().await.unwrap();
        (SqliteEvaluationRepository::new(pool.clone()), SqliteValidatorRepository::new(pool))
    }

    /// Insert and complete one evaluation, recording `truth` for its submission.
    async fn completed(
        evals: &SqliteEvaluationRepository,
        validator_id: Uuid,
        rec: Recommendation,
        truth: Recommendation,
    ) -> Evaluation {
        let now = Utc::now();
        let e = Evaluation::new(Uuid::new_v4(), "post", validator_id, now, Duration::hours(1));
        evals.insert_quorum(std::slice::from_ref(&e), 1000, now).await.unwrap();
        evals.complete(e.submission_id, validator_id, rec, now).await.unwrap().unwrap();
        SqliteGroundTruthRepository::new(evals.pool.clone())
            .record(e.submission_id, "post", truth, now)
            .await
            .unwrap();
        e
    }

    async fn validator(repo: &SqliteValidatorRepository) -> Validator {
        let v = Validator::new(Uuid::new_v4(), Utc::now());
        repo.create(&v).await.unwrap();
        v
    }

    #[tokio::test]
    async fn test_insert_quorum_bumps_daily_count() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let now = Utc::now();
        let e = Evaluation::new(Uuid::new_v4(), "post", v.id, now, Duration::hours(1));

        evals.insert_quorum(std::slice::from_ref(&e), 10, now).await.unwrap();

        assert_eq!(evals.list_for_submission(e.submission_id).await.unwrap().len(), 1);
        assert_eq!(validators.get(v.id).await.unwrap().unwrap().daily_evaluation_count, 1);
    }

    #[tokio::test]
    async fn test_insert_quorum_is_all_or_nothing() {
        let (evals, validators) = setup().await;
        let a = validator(&validators).await;
        let b = validator(&validators).await;
        let now = Utc::now();
        let submission = Uuid::new_v4();

        let first = Evaluation::new(submission, "post", b.id, now, Duration::hours(1));
        evals.insert_quorum(&[first], 10, now).await.unwrap();

        // Second batch collides on b, so a's row must not survive either.
        let batch = vec![
            Evaluation::new(submission, "post", a.id, now, Duration::hours(1)),
            Evaluation::new(submission, "post", b.id, now, Duration::hours(1)),
        ];
        let err = evals.insert_quorum(&batch, 10, now).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

        let rows = evals.list_for_submission(submission).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(validators.get(a.id).await.unwrap().unwrap().daily_evaluation_count, 0);
    }

    #[tokio::test]
    async fn test_insert_quorum_respects_daily_limit() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let now = Utc::now();

        let e = Evaluation::new(Uuid::new_v4(), "post", v.id, now, Duration::hours(1));
        let err = evals.insert_quorum(&[e], 0, now).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));
    }

    #[tokio::test]
    async fn test_insert_quorum_caps_submission_at_quorum_size() {
        let (evals, validators) = setup().await;
        let now = Utc::now();
        let submission = Uuid::new_v4();

        let mut batch = Vec::new();
        for _ in 0..3 {
            let v = validator(&validators).await;
            batch.push(Evaluation::new(submission, "post", v.id, now, Duration::minutes(5)));
        }
        evals.insert_quorum(&batch, 10, now).await.unwrap();

        // A caller working from a stale read tries to add a fresh quorum.
        let extra = validator(&validators).await;
        let stale = Evaluation::new(submission, "post", extra.id, now, Duration::minutes(5));
        let err = evals.insert_quorum(std::slice::from_ref(&stale), 10, now).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));
        assert_eq!(evals.list_for_submission(submission).await.unwrap().len(), 3);
        assert_eq!(validators.get(extra.id).await.unwrap().unwrap().daily_evaluation_count, 0);

        // Expired slots no longer count toward the quorum.
        evals.expire_overdue(now + Duration::minutes(10)).await.unwrap();
        evals.insert_quorum(&[stale], 10, now).await.unwrap();
        assert_eq!(evals.list_for_submission(submission).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_complete_once() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let now = Utc::now();
        let e = Evaluation::new(Uuid::new_v4(), "post", v.id, now, Duration::hours(1));
        evals.insert_quorum(std::slice::from_ref(&e), 10, now).await.unwrap();

        let done = evals.complete(e.submission_id, v.id, Recommendation::Approved, now).await.unwrap().unwrap();
        assert_eq!(done.status, EvaluationStatus::Completed);
        assert!(evals.complete(e.submission_id, v.id, Recommendation::Rejected, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_score_evaluation_counts_once_over_latest_window() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let first = completed(&evals, v.id, Recommendation::Approved, Recommendation::Approved).await;
        let second = completed(&evals, v.id, Recommendation::Approved, Recommendation::Rejected).await;

        // Scoring the older evaluation still sees the newer ground truth.
        let metrics = match evals.score_evaluation(first.id, true, 100, Utc::now()).await.unwrap() {
            ScoreOutcome::Scored { metrics: Some(m) } => m,
            other => panic!("expected metrics, got {other:?}"),
        };
        assert_eq!(metrics.precision, 0.5);
        assert_eq!(metrics.sample_size, 2);

        assert_eq!(
            evals.score_evaluation(first.id, true, 100, Utc::now()).await.unwrap(),
            ScoreOutcome::AlreadyScored
        );
        evals.score_evaluation(second.id, false, 100, Utc::now()).await.unwrap();

        let got = validators.get(v.id).await.unwrap().unwrap();
        assert_eq!(got.total_evaluations, 2);
        assert_eq!(got.correct_evaluations, 1);
        assert_eq!(got.precision, 0.5);
    }

    #[tokio::test]
    async fn test_score_evaluation_rolls_back_claim_on_failure() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let e = completed(&evals, v.id, Recommendation::Rejected, Recommendation::Rejected).await;
        let key = SubmissionKey::new(e.submission_id, "post");

        sqlx::query(
            r#"CREATE TRIGGER fail_scoring BEFORE UPDATE OF total_evaluations ON validators
               BEGIN SELECT RAISE(ABORT, 'scoring unavailable'); END"#
        )
        .execute(&evals.pool)
        .await
        .unwrap();
        assert!(evals.score_evaluation(e.id, true, 100, Utc::now()).await.is_err());
        assert_eq!(evals.unscored_completed(&key).await.unwrap().len(), 1);

        sqlx::query("DROP TRIGGER fail_scoring").execute(&evals.pool).await.unwrap();
        let outcome = evals.score_evaluation(e.id, true, 100, Utc::now()).await.unwrap();
        assert!(matches!(outcome, ScoreOutcome::Scored { metrics: Some(_) }));
        assert!(evals.unscored_completed(&key).await.unwrap().is_empty());
        assert_eq!(validators.get(v.id).await.unwrap().unwrap().total_evaluations, 1);
    }

    #[tokio::test]
    async fn test_complete_after_deadline_is_rejected() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let now = Utc::now();
        let e = Evaluation::new(Uuid::new_v4(), "post", v.id, now, Duration::minutes(5));
        evals.insert_quorum(std::slice::from_ref(&e), 10, now).await.unwrap();

        let late = now + Duration::minutes(6);
        assert!(evals.complete(e.submission_id, v.id, Recommendation::Approved, late).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expire_overdue_and_stalled() {
        let (evals, validators) = setup().await;
        let v = validator(&validators).await;
        let now = Utc::now();
        let e = Evaluation::new(Uuid::new_v4(), "post", v.id, now, Duration::minutes(5));
        evals.insert_quorum(std::slice::from_ref(&e), 10, now).await.unwrap();

        let later = now + Duration::minutes(10);
        let touched = evals.expire_overdue(later).await.unwrap();
        assert_eq!(touched, vec![SubmissionKey::new(e.submission_id, "post")]);
        assert!(evals.expire_overdue(later).await.unwrap().is_empty());

        let stalled = evals.stalled_quorums(3).await.unwrap();
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].counts, StatusCounts { pending: 0, completed: 0, expired: 1 });
    }
}
