//! Validator domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::ValidatorTier;

/// A point on the earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("latitude {} out of range", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(format!("longitude {} out of range", self.lng));
        }
        Ok(())
    }
}

/// A human reviewer owned by an agent account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    pub id: Uuid,

    /// Agent account that owns this validator; never assigned to its own submissions.
    pub agent_id: Uuid,

    pub tier: ValidatorTier,

    /// Rolling accuracy metrics, each in [0, 1].
    pub f1_score: f64,
    pub precision: f64,
    pub recall: f64,

    pub total_evaluations: i64,
    pub correct_evaluations: i64,

    pub daily_evaluation_count: i64,
    pub daily_count_reset_at: Option<DateTime<Utc>>,

    /// Home location. Validators without one form the global pool.
    pub home_point: Option<GeoPoint>,
    pub regions: Vec<String>,
    pub domains: Vec<String>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Validator {
    /// Create a new apprentice validator with zeroed metrics.
    pub fn new(agent_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            tier: ValidatorTier::Apprentice,
            f1_score: 0.0,
            precision: 0.0,
            recall: 0.0,
            total_evaluations: 0,
            correct_evaluations: 0,
            daily_evaluation_count: 0,
            daily_count_reset_at: Some(now),
            home_point: None,
            regions: Vec::new(),
            domains: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_home_point(mut self, point: GeoPoint) -> Self {
        self.home_point = Some(point);
        self
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_tier(mut self, tier: ValidatorTier) -> Self {
        self.tier = tier;
        self
    }

    /// True when the validator has no home region and belongs to the global pool.
    pub fn is_global(&self) -> bool {
        self.home_point.is_none()
    }

    /// Soft affinity score used to rank candidates. Never used to exclude.
    pub fn affinity(&self, domain: &str, region: Option<&str>) -> u8 {
        let mut score = 0;
        if self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
            score += 1;
        }
        if let Some(region) = region {
            if self.regions.iter().any(|r| r.eq_ignore_ascii_case(region)) {
                score += 1;
            }
        }
        score
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(point) = &self.home_point {
            point.validate()?;
        }
        for (name, value) in [("f1_score", self.f1_score), ("precision", self.precision), ("recall", self.recall)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} {value} outside [0, 1]"));
            }
        }
        Ok(())
    }
}
