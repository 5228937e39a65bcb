use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use peerval::adapters::notify::ChannelNotifier;
use peerval::adapters::sqlite::{create_migrated_test_pool, SqliteValidatorRepository};
use peerval::domain::models::{TierChange, Validator, ValidatorTier};
use peerval::domain::ports::{Clock, ManualClock, NotificationEvent, ValidatorRepository};
use peerval::services::TierService;

struct Fixture {
    tiers: TierService<SqliteValidatorRepository>,
    validators: Arc<SqliteValidatorRepository>,
    clock: Arc<ManualClock>,
    notifications: tokio::sync::mpsc::Receiver<peerval::adapters::notify::DeliveredNotification>,
    pool: sqlx::SqlitePool,
}

async fn setup() -> Fixture {
    let pool = create_migrated_test_pool().await.unwrap();
    let validators = Arc::new(SqliteValidatorRepository::new(pool.clone()));
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()));
    let (notifier, notifications) = ChannelNotifier::new(16);
    let tiers = TierService::new(validators.clone(), Arc::new(notifier), clock.clone());
    Fixture { tiers, validators, clock, notifications, pool }
}

async fn seed(f: &Fixture, tier: ValidatorTier, f1: f64, total: i64) -> Validator {
    let mut v = Validator::new(Uuid::new_v4(), f.clock.now()).with_tier(tier);
    v.f1_score = f1;
    v.precision = f1;
    v.recall = f1;
    v.total_evaluations = total;
    f.validators.create(&v).await.unwrap();
    v
}

/// Count `n` scored evaluations and leave the validator at the given F1.
async fn score(f: &Fixture, id: Uuid, n: i64, f1: f64) {
    sqlx::query(
        r#"UPDATE validators SET total_evaluations = total_evaluations + ?,
               correct_evaluations = correct_evaluations + ?,
               f1_score = ?, precision_score = ?, recall_score = ?
           WHERE id = ?"#,
    )
    .bind(n)
    .bind(n)
    .bind(f1)
    .bind(f1)
    .bind(f1)
    .bind(id.to_string())
    .execute(&f.pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_promotion_persists_and_notifies_owner() {
    let mut f = setup().await;
    let v = seed(&f, ValidatorTier::Apprentice, 0.90, 55).await;

    let change = f.tiers.check_and_apply(v.id).await.unwrap().expect("should be promoted");
    assert_eq!(change.from_tier, ValidatorTier::Apprentice);
    assert_eq!(change.to_tier, ValidatorTier::Journeyman);
    assert_eq!(change.total_evaluations_at_change, 55);

    let stored = f.validators.get(v.id).await.unwrap().unwrap();
    assert_eq!(stored.tier, ValidatorTier::Journeyman);
    assert_eq!(f.validators.tier_history(v.id).await.unwrap().len(), 1);

    let delivered = f.notifications.try_recv().expect("owner should be notified");
    assert_eq!(delivered.agent_id, v.agent_id);
    let NotificationEvent::TierChanged(payload) = delivered.event;
    assert_eq!(payload.previous_tier, ValidatorTier::Apprentice);
    assert_eq!(payload.new_tier, ValidatorTier::Journeyman);
    assert_eq!(payload.total_evaluations, 55);
    assert!((payload.f1_score - 0.90).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_recent_change_blocks_demotion_until_thirty_more() {
    let mut f = setup().await;
    let v = seed(&f, ValidatorTier::Apprentice, 0.90, 90).await;
    let promoted = TierChange::new(v.id, ValidatorTier::Apprentice, ValidatorTier::Journeyman, 0.90, 90, f.clock.now());
    assert!(f.validators.apply_tier_change(&promoted).await.unwrap());

    score(&f, v.id, 10, 0.80).await;
    assert!(f.tiers.check_and_apply(v.id).await.unwrap().is_none(), "10 since change is inside the guard");
    assert!(f.notifications.try_recv().is_err());

    score(&f, v.id, 20, 0.80).await;
    let change = f.tiers.check_and_apply(v.id).await.unwrap().expect("30 since change allows demotion");
    assert_eq!(change.to_tier, ValidatorTier::Apprentice);
    assert_eq!(change.total_evaluations_at_change, 120);
    assert!(f.notifications.try_recv().is_ok());
}

#[tokio::test]
async fn test_no_promotion_below_thresholds() {
    let f = setup().await;
    let few = seed(&f, ValidatorTier::Apprentice, 0.99, 49).await;
    let weak = seed(&f, ValidatorTier::Apprentice, 0.84, 500).await;
    let not_expert = seed(&f, ValidatorTier::Journeyman, 0.95, 199).await;

    for id in [few.id, weak.id, not_expert.id] {
        assert!(f.tiers.check_and_apply(id).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_expert_promotion_then_guarded_demotion() {
    let f = setup().await;
    let v = seed(&f, ValidatorTier::Journeyman, 0.93, 200).await;

    let up = f.tiers.check_and_apply(v.id).await.unwrap().unwrap();
    assert_eq!(up.to_tier, ValidatorTier::Expert);

    score(&f, v.id, 29, 0.91).await;
    assert!(f.tiers.check_and_apply(v.id).await.unwrap().is_none());

    score(&f, v.id, 1, 0.91).await;
    let down = f.tiers.check_and_apply(v.id).await.unwrap().unwrap();
    assert_eq!(down.from_tier, ValidatorTier::Expert);
    assert_eq!(down.to_tier, ValidatorTier::Journeyman);
    assert_eq!(f.validators.tier_history(v.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_validator_is_silent() {
    let f = setup().await;
    assert!(f.tiers.check_and_apply(Uuid::new_v4()).await.unwrap().is_none());
}
