//! Evaluation domain model: one validator assigned to one submission.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an evaluation.
///
/// ```text
/// pending ──respond──▶ completed
///    │
///    └──sweep past expires_at──▶ expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Completed,
    Expired,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!(
            (self, new_status),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Expired)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A validator's verdict on a submission. Also used for moderation ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approved,
    Rejected,
    Flagged,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Flagged => "flagged",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "flagged" => Some(Self::Flagged),
            _ => None,
        }
    }

    /// Positive class for F1 scoring. Rejected and flagged are both negative.
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Assignment of one validator to one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub submission_type: String,
    pub validator_id: Uuid,
    pub status: EvaluationStatus,
    pub recommendation: Option<Recommendation>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    /// Set once the evaluation has been counted towards validator metrics.
    pub scored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    /// Create a pending evaluation that expires `ttl` after `now`.
    pub fn new(
        submission_id: Uuid,
        submission_type: impl Into<String>,
        validator_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            submission_type: submission_type.into(),
            validator_id,
            status: EvaluationStatus::Pending,
            recommendation: None,
            responded_at: None,
            expires_at: now + ttl,
            scored_at: None,
            created_at: now,
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Record the validator's response.
    pub fn complete(&mut self, recommendation: Recommendation, now: DateTime<Utc>) -> Result<(), String> {
        if !self.status.can_transition_to(EvaluationStatus::Completed) {
            return Err(format!(
                "evaluation {} is {} and cannot be completed",
                self.id,
                self.status.as_str()
            ));
        }
        self.status = EvaluationStatus::Completed;
        self.recommendation = Some(recommendation);
        self.responded_at = Some(now);
        Ok(())
    }
}
