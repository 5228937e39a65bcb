//! Validator trust tiers and the promotion/demotion state machine.
//!
//! Tiers form a bidirectional chain: apprentice ⇄ journeyman ⇄ expert.
//! None of the states is terminal. Promotions require both an F1 floor and a
//! minimum evaluation count; demotions only require the F1 floor to be missed,
//! but are suppressed until enough evaluations have happened since the last
//! tier change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Evaluations that must occur after a tier change before a demotion is considered.
pub const DEMOTION_GUARD_EVALUATIONS: i64 = 30;

/// Trust tier of a validator, ordered from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorTier {
    Apprentice,
    Journeyman,
    Expert,
}

impl Default for ValidatorTier {
    fn default() -> Self {
        Self::Apprentice
    }
}

impl ValidatorTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apprentice => "apprentice",
            Self::Journeyman => "journeyman",
            Self::Expert => "expert",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "apprentice" => Some(Self::Apprentice),
            "journeyman" => Some(Self::Journeyman),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }

    /// All tiers, lowest first.
    pub fn all() -> [Self; 3] {
        [Self::Apprentice, Self::Journeyman, Self::Expert]
    }

    /// The tier one step above, if any.
    pub fn next_up(self) -> Option<Self> {
        match self {
            Self::Apprentice => Some(Self::Journeyman),
            Self::Journeyman => Some(Self::Expert),
            Self::Expert => None,
        }
    }

    /// The tier one step below, if any.
    pub fn next_down(self) -> Option<Self> {
        match self {
            Self::Apprentice => None,
            Self::Journeyman => Some(Self::Apprentice),
            Self::Expert => Some(Self::Journeyman),
        }
    }

    /// F1 score a validator must hold to reach (or stay in) this tier.
    pub fn f1_floor(self) -> f64 {
        match self {
            Self::Apprentice => 0.0,
            Self::Journeyman => 0.85,
            Self::Expert => 0.92,
        }
    }

    /// Total evaluations required to be promoted into this tier.
    pub fn min_evaluations(self) -> i64 {
        match self {
            Self::Apprentice => 0,
            Self::Journeyman => 50,
            Self::Expert => 200,
        }
    }
}

impl fmt::Display for ValidatorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a tier transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierTransition {
    Promotion(ValidatorTier),
    Demotion(ValidatorTier),
}

impl TierTransition {
    pub fn target(self) -> ValidatorTier {
        match self {
            Self::Promotion(t) | Self::Demotion(t) => t,
        }
    }
}

/// Decide whether a validator should move tiers.
///
/// Promotion is checked first and is never guarded. Demotion is only
/// considered when no promotion applies and at least
/// [`DEMOTION_GUARD_EVALUATIONS`] evaluations happened since the last change.
pub fn evaluate_transition(
    tier: ValidatorTier,
    f1_score: f64,
    total_evaluations: i64,
    evaluations_since_change: i64,
) -> Option<TierTransition> {
    if let Some(up) = tier.next_up() {
        if f1_score >= up.f1_floor() && total_evaluations >= up.min_evaluations() {
            return Some(TierTransition::Promotion(up));
        }
    }

    if evaluations_since_change < DEMOTION_GUARD_EVALUATIONS {
        return None;
    }

    match tier.next_down() {
        Some(down) if f1_score < tier.f1_floor() => Some(TierTransition::Demotion(down)),
        _ => None,
    }
}
