//! Append-only audit of validator tier changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::ValidatorTier;

/// Snapshot of a validator at the moment its tier changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChange {
    pub id: Uuid,
    pub validator_id: Uuid,
    pub from_tier: ValidatorTier,
    pub to_tier: ValidatorTier,
    pub f1_score_at_change: f64,
    pub total_evaluations_at_change: i64,
    pub changed_at: DateTime<Utc>,
}

impl TierChange {
    pub fn new(
        validator_id: Uuid,
        from_tier: ValidatorTier,
        to_tier: ValidatorTier,
        f1_score_at_change: f64,
        total_evaluations_at_change: i64,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            validator_id,
            from_tier,
            to_tier,
            f1_score_at_change,
            total_evaluations_at_change,
            changed_at,
        }
    }

    pub fn is_promotion(&self) -> bool {
        self.to_tier > self.from_tier
    }
}

/// Evaluations performed since the most recent tier change, or all of them
/// when the validator never changed tier.
pub fn evaluations_since_change(total_evaluations: i64, last_change: Option<&TierChange>) -> i64 {
    match last_change {
        Some(change) => total_evaluations - change.total_evaluations_at_change,
        None => total_evaluations,
    }
}

/// Payload sent to the owning agent when a validator changes tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierChangeNotification {
    pub previous_tier: ValidatorTier,
    pub new_tier: ValidatorTier,
    pub f1_score: f64,
    pub total_evaluations: i64,
    pub message: String,
}

impl TierChangeNotification {
    pub fn from_change(change: &TierChange) -> Self {
        let message = if change.is_promotion() {
            format!(
                "Your validator was promoted from {} to {} (F1 {:.4} over {} evaluations).",
                change.from_tier, change.to_tier, change.f1_score_at_change, change.total_evaluations_at_change
            )
        } else {
            format!(
                "Your validator was moved from {} to {} after its F1 dropped to {:.4}.",
                change.from_tier, change.to_tier, change.f1_score_at_change
            )
        };
        Self {
            previous_tier: change.from_tier,
            new_tier: change.to_tier,
            f1_score: change.f1_score_at_change,
            total_evaluations: change.total_evaluations_at_change,
            message,
        }
    }
}
