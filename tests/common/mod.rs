//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;

use peerval::adapters::notify::{ChannelNotifier, DeliveredNotification};
use peerval::adapters::sqlite::{create_migrated_test_pool, initialize_database, SqliteValidatorRepository};
use peerval::domain::models::{AssignmentRequest, Config, GeoPoint, Validator, ValidatorTier};
use peerval::domain::ports::{Clock, ManualClock, ValidatorRepository};
use peerval::services::ValidationEngine;

pub const LAGOS: GeoPoint = GeoPoint { lat: 6.5244, lng: 3.3792 };
pub const IKEJA: GeoPoint = GeoPoint { lat: 6.6018, lng: 3.3515 };

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
}

pub struct TestEngine {
    pub engine: ValidationEngine,
    pub validators: SqliteValidatorRepository,
    pub clock: Arc<ManualClock>,
    pub notifications: Receiver<DeliveredNotification>,
    pub pool: SqlitePool,
    _dir: Option<TempDir>,
}

/// Engine over a single-connection in-memory database.
pub async fn memory_engine() -> TestEngine {
    let pool = create_migrated_test_pool().await.expect("failed to create test database");
    build(pool, None)
}

/// Engine over a WAL file database with a real connection pool, for tests
/// that need writers to actually overlap.
pub async fn file_engine() -> TestEngine {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("peerval.db").display());
    let pool = initialize_database(&url, None).await.expect("failed to create file database");
    build(pool, Some(dir))
}

fn build(pool: SqlitePool, dir: Option<TempDir>) -> TestEngine {
    let clock = Arc::new(ManualClock::new(start_time()));
    let (notifier, notifications) = ChannelNotifier::new(64);
    let engine = ValidationEngine::new(pool.clone(), &Config::default(), Arc::new(notifier), clock.clone());
    TestEngine {
        engine,
        validators: SqliteValidatorRepository::new(pool.clone()),
        clock,
        notifications,
        pool,
        _dir: dir,
    }
}

impl TestEngine {
    /// Insert a validator directly, bypassing registration so tier can be set.
    pub async fn seed(&self, tier: ValidatorTier, home: Option<GeoPoint>) -> Validator {
        let mut validator = Validator::new(Uuid::new_v4(), self.clock.now()).with_tier(tier);
        validator.home_point = home;
        self.validators.create(&validator).await.expect("failed to seed validator");
        validator
    }

    pub async fn seed_many(&self, n: usize, tier: ValidatorTier, home: Option<GeoPoint>) -> Vec<Validator> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.seed(tier, home).await);
        }
        out
    }

    pub async fn validator(&self, id: Uuid) -> Validator {
        self.validators.get(id).await.unwrap().expect("validator should exist")
    }
}

pub fn global_request(author: Uuid) -> AssignmentRequest {
    AssignmentRequest::new(Uuid::new_v4(), "post", author, "food")
}
