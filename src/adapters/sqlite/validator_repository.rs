//! SQLite implementation of the ValidatorRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::format_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AccuracyMetrics, GeoPoint, TierChange, Validator, ValidatorTier};
use crate::domain::ports::{CandidatePool, CandidateQuery, ValidatorFilter, ValidatorRepository};

#[derive(Clone)]
pub struct SqliteValidatorRepository {
    pool: SqlitePool,
}

impl SqliteValidatorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Count one scored evaluation on a validator and, when given, store fresh metrics.
///
/// Counters are incremented in SQL. Returns false when the validator does not exist.
pub(crate) async fn record_score<'e, X: SqliteExecutor<'e>>(
    executor: X,
    id: Uuid,
    metrics: Option<&AccuracyMetrics>,
    correct: bool,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE validators SET
               total_evaluations = total_evaluations + 1,
               correct_evaluations = correct_evaluations + ?,
               f1_score = COALESCE(?, f1_score),
               precision_score = COALESCE(?, precision_score),
               recall_score = COALESCE(?, recall_score),
               updated_at = ?
           WHERE id = ?"#
    )
    .bind(i64::from(correct))
    .bind(metrics.map(|m| m.f1_score))
    .bind(metrics.map(|m| m.precision))
    .bind(metrics.map(|m| m.recall))
    .bind(format_datetime(now))
    .bind(id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl ValidatorRepository for SqliteValidatorRepository {
    async fn create(&self, validator: &Validator) -> DomainResult<()> {
        validator.validate().map_err(DomainError::ValidationFailed)?;

        let regions_json = serde_json::to_string(&validator.regions)?;
        let domains_json = serde_json::to_string(&validator.domains)?;

        sqlx::query(
            r#"INSERT INTO validators (id, agent_id, tier, f1_score, precision_score, recall_score,
               total_evaluations, correct_evaluations, daily_evaluation_count, daily_count_reset_at,
               home_lat, home_lng, regions, domains, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(validator.id.to_string())
        .bind(validator.agent_id.to_string())
        .bind(validator.tier.as_str())
        .bind(validator.f1_score)
        .bind(validator.precision)
        .bind(validator.recall)
        .bind(validator.total_evaluations)
        .bind(validator.correct_evaluations)
        .bind(validator.daily_evaluation_count)
        .bind(validator.daily_count_reset_at.map(format_datetime))
        .bind(validator.home_point.map(|p| p.lat))
        .bind(validator.home_point.map(|p| p.lng))
        .bind(&regions_json)
        .bind(&domains_json)
        .bind(i32::from(validator.is_active))
        .bind(format_datetime(validator.created_at))
        .bind(format_datetime(validator.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Validator>> {
        let row: Option<ValidatorRow> = sqlx::query_as("SELECT * FROM validators WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: ValidatorFilter) -> DomainResult<Vec<Validator>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM validators WHERE 1=1");

        if let Some(tier) = filter.tier {
            qb.push(" AND tier = ").push_bind(tier.as_str());
        }
        if let Some(agent_id) = filter.agent_id {
            qb.push(" AND agent_id = ").push_bind(agent_id.to_string());
        }
        if filter.active_only {
            qb.push(" AND is_active = 1");
        }
        qb.push(" ORDER BY created_at, id");

        let rows: Vec<ValidatorRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_candidates(&self, query: &CandidateQuery) -> DomainResult<Vec<Validator>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM validators WHERE is_active = 1 AND agent_id != ",
        );
        qb.push_bind(query.exclude_agent_id.to_string());
        qb.push(" AND daily_evaluation_count < ").push_bind(query.daily_limit);

        match query.pool {
            CandidatePool::Local => qb.push(" AND home_lat IS NOT NULL AND home_lng IS NOT NULL"),
            CandidatePool::Global => qb.push(" AND (home_lat IS NULL OR home_lng IS NULL)"),
        };

        if let Some(min_tier) = query.min_tier {
            qb.push(" AND tier IN (");
            let mut tiers = qb.separated(", ");
            for tier in ValidatorTier::all().into_iter().filter(|t| *t >= min_tier) {
                tiers.push_bind(tier.as_str());
            }
            qb.push(")");
        }

        if !query.exclude_validator_ids.is_empty() {
            qb.push(" AND id NOT IN (");
            let mut ids = qb.separated(", ");
            for id in &query.exclude_validator_ids {
                ids.push_bind(id.to_string());
            }
            qb.push(")");
        }

        qb.push(" ORDER BY id");

        let rows: Vec<ValidatorRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn apply_tier_change(&self, change: &TierChange) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE validators SET tier = ?, updated_at = ? WHERE id = ? AND tier = ?")
            .bind(change.to_tier.as_str())
            .bind(format_datetime(change.changed_at))
            .bind(change.validator_id.to_string())
            .bind(change.from_tier.as_str())
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO tier_changes (id, validator_id, from_tier, to_tier, f1_score_at_change,
               total_evaluations_at_change, changed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(change.id.to_string())
        .bind(change.validator_id.to_string())
        .bind(change.from_tier.as_str())
        .bind(change.to_tier.as_str())
        .bind(change.f1_score_at_change)
        .bind(change.total_evaluations_at_change)
        .bind(format_datetime(change.changed_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn last_tier_change(&self, id: Uuid) -> DomainResult<Option<TierChange>> {
        let row: Option<TierChangeRow> = sqlx::query_as(
            "SELECT * FROM tier_changes WHERE validator_id = ? ORDER BY changed_at DESC, rowid DESC LIMIT 1"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn tier_history(&self, id: Uuid) -> DomainResult<Vec<TierChange>> {
        let rows: Vec<TierChangeRow> = sqlx::query_as(
            "SELECT * FROM tier_changes WHERE validator_id = ? ORDER BY changed_at, rowid"
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn reset_daily_counts(&self, day_start: DateTime<Utc>, now: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"UPDATE validators SET daily_evaluation_count = 0, daily_count_reset_at = ?
               WHERE daily_count_reset_at IS NULL OR daily_count_reset_at < ?"#
        )
        .bind(format_datetime(now))
        .bind(format_datetime(day_start))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<()> {
        let result = sqlx::query("UPDATE validators SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(format_datetime(now))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidatorNotFound(id));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ValidatorRow {
    id: String,
    agent_id: String,
    tier: String,
    f1_score: f64,
    precision_score: f64,
    recall_score: f64,
    total_evaluations: i64,
    correct_evaluations: i64,
    daily_evaluation_count: i64,
    daily_count_reset_at: Option<String>,
    home_lat: Option<f64>,
    home_lng: Option<f64>,
    regions: Option<String>,
    domains: Option<String>,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ValidatorRow> for Validator {
    type Error = DomainError;

    fn try_from(row: ValidatorRow) -> Result<Self, Self::Error> {
        let tier = ValidatorTier::parse_str(&row.tier)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid tier: {}", row.tier)))?;

        let home_point = match (row.home_lat, row.home_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        };

        Ok(Validator {
            id: super::parse_uuid(&row.id)?,
            agent_id: super::parse_uuid(&row.agent_id)?,
            tier,
            f1_score: row.f1_score,
            precision: row.precision_score,
            recall: row.recall_score,
            total_evaluations: row.total_evaluations,
            correct_evaluations: row.correct_evaluations,
            daily_evaluation_count: row.daily_evaluation_count,
            daily_count_reset_at: super::parse_optional_datetime(row.daily_count_reset_at)?,
            home_point,
            regions: super::parse_json_or_default(row.regions)?,
            domains: super::parse_json_or_default(row.domains)?,
            is_active: row.is_active != 0,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TierChangeRow {
    id: String,
    validator_id: String,
    from_tier: String,
    to_tier: String,
    f1_score_at_change: f64,
    total_evaluations_at_change: i64,
    changed_at: String,
}

impl TryFrom<TierChangeRow> for TierChange {
    type Error = DomainError;

    fn try_from(row: TierChangeRow) -> Result<Self, Self::Error> {
        let parse_tier = |s: &str| {
            ValidatorTier::parse_str(s)
                .ok_or_else(|| DomainError::SerializationError(format!("Invalid tier: {s}")))
        };

        Ok(TierChange {
            id: super::parse_uuid(&row.id)?,
            validator_id: super::parse_uuid(&row.validator_id)?,
            from_tier: parse_tier(&row.from_tier)?,
            to_tier: parse_tier(&row.to_tier)?,
            f1_score_at_change: row.f1_score_at_change,
            total_evaluations_at_change: row.total_evaluations_at_change,
            changed_at: super::parse_datetime(&row.changed_at)?,
        })
    }
}
