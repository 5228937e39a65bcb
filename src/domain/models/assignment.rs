//! Quorum assignment request and outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validator::GeoPoint;

/// Number of validators in every quorum.
pub const QUORUM_SIZE: usize = 3;

/// Local validators sought for a hybrid quorum.
pub const HYBRID_LOCAL_SLOTS: usize = 2;

/// Geographic reach of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeographicScope {
    #[default]
    Global,
    Hyperlocal,
}

impl GeographicScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Hyperlocal => "hyperlocal",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "hyperlocal" => Some(Self::Hyperlocal),
            _ => None,
        }
    }
}

/// How a quorum was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumComposition {
    GlobalOnly,
    Hybrid,
    LocalOnly,
}

impl QuorumComposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlobalOnly => "global_only",
            Self::Hybrid => "hybrid",
            Self::LocalOnly => "local_only",
        }
    }

    /// Classify a quorum by how many of its members are local.
    pub fn from_counts(local: usize, global: usize) -> Self {
        match (local, global) {
            (0, _) => Self::GlobalOnly,
            (_, 0) => Self::LocalOnly,
            _ => Self::Hybrid,
        }
    }
}

/// Input to quorum assignment for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub submission_id: Uuid,
    pub submission_type: String,
    pub author_agent_id: Uuid,
    pub domain: String,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub scope: GeographicScope,
    /// Region label used only for affinity ranking.
    #[serde(default)]
    pub region: Option<String>,
}

impl AssignmentRequest {
    pub fn new(
        submission_id: Uuid,
        submission_type: impl Into<String>,
        author_agent_id: Uuid,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            submission_id,
            submission_type: submission_type.into(),
            author_agent_id,
            domain: domain.into(),
            location: None,
            scope: GeographicScope::Global,
            region: None,
        }
    }

    pub fn hyperlocal(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self.scope = GeographicScope::Hyperlocal;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Location to search around, if this submission should try local validators.
    pub fn local_search_point(&self) -> Option<GeoPoint> {
        match self.scope {
            GeographicScope::Hyperlocal => self.location,
            GeographicScope::Global => None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.submission_type.trim().is_empty() {
            return Err("submission_type cannot be empty".to_string());
        }
        if self.submission_id.is_nil() {
            return Err("submission_id cannot be nil".to_string());
        }
        if let Some(point) = &self.location {
            point.validate()?;
        }
        Ok(())
    }
}

/// Outcome of a successful assignment call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumAssignment {
    pub submission_id: Uuid,
    pub local_validator_ids: Vec<Uuid>,
    pub global_validator_ids: Vec<Uuid>,
    /// Validators newly assigned by this call; empty when the quorum was already full.
    pub newly_assigned: Vec<Uuid>,
    pub composition: QuorumComposition,
    pub tier_fallback: bool,
    pub quorum_required: usize,
    pub expires_at: DateTime<Utc>,
}

impl QuorumAssignment {
    pub fn all_validator_ids(&self) -> Vec<Uuid> {
        self.local_validator_ids
            .iter()
            .chain(self.global_validator_ids.iter())
            .copied()
            .collect()
    }
}
