//! Consensus results and the weighted vote tally that produces them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::evaluation::Recommendation;
use super::tier::ValidatorTier;

pub const ESCALATION_QUORUM_TIMEOUT: &str = "quorum_timeout";
pub const ESCALATION_NO_MAJORITY: &str = "no_majority";
pub const ESCALATION_FLAGGED_MAJORITY: &str = "flagged_majority";

/// Binding outcome of peer review for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusDecision {
    Approved,
    Rejected,
    Escalated,
}

impl ConsensusDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }
}

/// Write-once consensus record, keyed by (submission_id, submission_type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub submission_type: String,
    pub decision: ConsensusDecision,
    pub confidence: f64,
    pub quorum_size: i64,
    pub responses_received: i64,
    pub approve_weight: f64,
    pub reject_weight: f64,
    pub escalate_weight: f64,
    pub escalation_reason: Option<String>,
    pub ground_truth_decision: Option<Recommendation>,
    pub created_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// Result written when a quorum failed to form before its deadline.
    pub fn quorum_timeout(
        submission_id: Uuid,
        submission_type: impl Into<String>,
        responses_received: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            submission_type: submission_type.into(),
            decision: ConsensusDecision::Escalated,
            confidence: 0.0,
            quorum_size: 0,
            responses_received,
            approve_weight: 0.0,
            reject_weight: 0.0,
            escalate_weight: 0.0,
            escalation_reason: Some(ESCALATION_QUORUM_TIMEOUT.to_string()),
            ground_truth_decision: None,
            created_at: now,
        }
    }
}

/// Vote mass contributed by a single response, by tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteWeights {
    pub apprentice: f64,
    pub journeyman: f64,
    pub expert: f64,
}

impl Default for VoteWeights {
    fn default() -> Self {
        Self { apprentice: 1.0, journeyman: 2.0, expert: 3.0 }
    }
}

impl VoteWeights {
    pub fn for_tier(&self, tier: ValidatorTier) -> f64 {
        match tier {
            ValidatorTier::Apprentice => self.apprentice,
            ValidatorTier::Journeyman => self.journeyman,
            ValidatorTier::Expert => self.expert,
        }
    }
}

/// Accumulated weighted votes for a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoteTally {
    pub approve: f64,
    pub reject: f64,
    pub escalate: f64,
    pub responses: i64,
}

/// Decision derived from a tally.
#[derive(Debug, Clone, PartialEq)]
pub struct TallyOutcome {
    pub decision: ConsensusDecision,
    pub confidence: f64,
    pub escalation_reason: Option<String>,
}

impl VoteTally {
    pub fn add(&mut self, recommendation: Recommendation, weight: f64) {
        match recommendation {
            Recommendation::Approved => self.approve += weight,
            Recommendation::Rejected => self.reject += weight,
            Recommendation::Flagged => self.escalate += weight,
        }
        self.responses += 1;
    }

    pub fn total(&self) -> f64 {
        self.approve + self.reject + self.escalate
    }

    /// Resolve the tally. A side wins only when its share strictly exceeds
    /// `majority_threshold`.
    pub fn resolve(&self, majority_threshold: f64) -> TallyOutcome {
        let total = self.total();
        if total <= 0.0 {
            return TallyOutcome {
                decision: ConsensusDecision::Escalated,
                confidence: 0.0,
                escalation_reason: Some(ESCALATION_NO_MAJORITY.to_string()),
            };
        }

        let approve = self.approve / total;
        let reject = self.reject / total;
        let escalate = self.escalate / total;

        if approve > majority_threshold {
            TallyOutcome { decision: ConsensusDecision::Approved, confidence: round4(approve), escalation_reason: None }
        } else if reject > majority_threshold {
            TallyOutcome { decision: ConsensusDecision::Rejected, confidence: round4(reject), escalation_reason: None }
        } else if escalate > majority_threshold {
            TallyOutcome {
                decision: ConsensusDecision::Escalated,
                confidence: round4(escalate),
                escalation_reason: Some(ESCALATION_FLAGGED_MAJORITY.to_string()),
            }
        } else {
            TallyOutcome {
                decision: ConsensusDecision::Escalated,
                confidence: round4(approve.max(reject).max(escalate)),
                escalation_reason: Some(ESCALATION_NO_MAJORITY.to_string()),
            }
        }
    }
}

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(votes: &[(Recommendation, f64)]) -> VoteTally {
        let mut t = VoteTally::default();
        for (r, w) in votes {
            t.add(*r, *w);
        }
        t
    }

    #[test]
    fn test_unanimous_approval() {
        let t = tally(&[(Recommendation::Approved, 1.0), (Recommendation::Approved, 2.0), (Recommendation::Approved, 3.0)]);
        let out = t.resolve(0.5);
        assert_eq!(out.decision, ConsensusDecision::Approved);
        assert!((out.confidence - 1.0).abs() < f64::EPSILON);
        assert!(out.escalation_reason.is_none());
    }

    #[test]
    fn test_expert_outweighs_two_apprentices() {
        let t = tally(&[
            (Recommendation::Approved, 1.0),
            (Recommendation::Approved, 1.0),
            (Recommendation::Rejected, 3.0),
        ]);
        let out = t.resolve(0.5);
        assert_eq!(out.decision, ConsensusDecision::Rejected);
        assert!((out.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_three_way_split_escalates() {
        let t = tally(&[(Recommendation::Approved, 1.0), (Recommendation::Rejected, 1.0), (Recommendation::Flagged, 1.0)]);
        let out = t.resolve(0.5);
        assert_eq!(out.decision, ConsensusDecision::Escalated);
        assert_eq!(out.escalation_reason.as_deref(), Some(ESCALATION_NO_MAJORITY));
        assert!((out.confidence - 0.3333).abs() < 1e-9);
    }

    #[test]
    fn test_flagged_majority_escalates() {
        let t = tally(&[(Recommendation::Flagged, 2.0), (Recommendation::Flagged, 2.0), (Recommendation::Approved, 1.0)]);
        let out = t.resolve(0.5);
        assert_eq!(out.decision, ConsensusDecision::Escalated);
        assert_eq!(out.escalation_reason.as_deref(), Some(ESCALATION_FLAGGED_MAJORITY));
    }

    #[test]
    fn test_empty_tally_escalates() {
        let out = VoteTally::default().resolve(0.5);
        assert_eq!(out.decision, ConsensusDecision::Escalated);
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_quorum_timeout_result() {
        let r = ConsensusResult::quorum_timeout(Uuid::new_v4(), "post", 1, Utc::now());
        assert_eq!(r.decision, ConsensusDecision::Escalated);
        assert_eq!(r.quorum_size, 0);
        assert_eq!(r.responses_received, 1);
        assert_eq!(r.escalation_reason.as_deref(), Some(ESCALATION_QUORUM_TIMEOUT));
        assert_eq!(r.approve_weight + r.reject_weight + r.escalate_weight, 0.0);
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.714_285_7), 0.7143);
        assert_eq!(round4(2.0 / 3.0), 0.6667);
    }
}
