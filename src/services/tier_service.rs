//! Tier promotion and demotion.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    evaluate_transition, evaluations_since_change, TierChange, TierChangeNotification,
};
use crate::domain::ports::{Clock, NotificationEvent, ValidatorNotifier, ValidatorRepository};

pub struct TierService<V: ValidatorRepository> {
    validators: Arc<V>,
    notifier: Arc<dyn ValidatorNotifier>,
    clock: Arc<dyn Clock>,
}

impl<V: ValidatorRepository> TierService<V> {
    pub fn new(validators: Arc<V>, notifier: Arc<dyn ValidatorNotifier>, clock: Arc<dyn Clock>) -> Self {
        Self { validators, notifier, clock }
    }

    /// Apply at most one tier transition to the validator, based on its
    /// current F1 and evaluation counts.
    ///
    /// Unknown validators and validators that meet no threshold are left alone.
    #[instrument(skip(self), fields(validator_id = %validator_id))]
    pub async fn check_and_apply(&self, validator_id: Uuid) -> DomainResult<Option<TierChange>> {
        let Some(validator) = self.validators.get(validator_id).await? else {
            debug!("validator not found, skipping tier check");
            return Ok(None);
        };

        let last_change = self.validators.last_tier_change(validator_id).await?;
        let since_change = evaluations_since_change(validator.total_evaluations, last_change.as_ref());

        let Some(transition) = evaluate_transition(
            validator.tier,
            validator.f1_score,
            validator.total_evaluations,
            since_change,
        ) else {
            return Ok(None);
        };

        let change = TierChange::new(
            validator_id,
            validator.tier,
            transition.target(),
            validator.f1_score,
            validator.total_evaluations,
            self.clock.now(),
        );

        // Another writer already moved this validator off `from_tier`.
        if !self.validators.apply_tier_change(&change).await? {
            debug!("tier changed concurrently, skipping");
            return Ok(None);
        }

        info!(
            from = change.from_tier.as_str(),
            to = change.to_tier.as_str(),
            f1 = change.f1_score_at_change,
            total_evaluations = change.total_evaluations_at_change,
            "validator tier changed"
        );

        self.notifier
            .send(validator.agent_id, NotificationEvent::TierChanged(TierChangeNotification::from_change(&change)))
            .await;

        Ok(Some(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::notify::{ChannelNotifier, DeliveredNotification};
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteValidatorRepository};
    use crate::domain::models::{Validator, ValidatorTier};
    use crate::domain::ports::ManualClock;
    use chrono::Utc;
    use tokio::sync::mpsc;

    async fn setup() -> (
        TierService<SqliteValidatorRepository>,
        Arc<SqliteValidatorRepository>,
        mpsc::Receiver<DeliveredNotification>,
    ) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = Arc::new(SqliteValidatorRepository::new(pool));
        let (notifier, rx) = ChannelNotifier::new(16);
        let service = TierService::new(repo.clone(), Arc::new(notifier), Arc::new(ManualClock::new(Utc::now())));
        (service, repo, rx)
    }

    async fn validator(repo: &SqliteValidatorRepository, tier: ValidatorTier, f1: f64, total: i64) -> Validator {
        let mut v = Validator::new(Uuid::new_v4(), Utc::now()).with_tier(tier);
        v.f1_score = f1;
        v.total_evaluations = total;
        repo.create(&v).await.unwrap();
        v
    }

    #[tokio::test]
    async fn test_apprentice_promoted_to_journeyman() {
        let (service, repo, mut rx) = setup().await;
        let v = validator(&repo, ValidatorTier::Apprentice, 0.90, 55).await;

        let change = service.check_and_apply(v.id).await.unwrap().unwrap();
        assert_eq!(change.to_tier, ValidatorTier::Journeyman);
        assert_eq!(repo.get(v.id).await.unwrap().unwrap().tier, ValidatorTier::Journeyman);
        assert_eq!(repo.tier_history(v.id).await.unwrap().len(), 1);

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.agent_id, v.agent_id);
        let NotificationEvent::TierChanged(payload) = delivered.event;
        assert_eq!(payload.previous_tier, ValidatorTier::Apprentice);
        assert_eq!(payload.new_tier, ValidatorTier::Journeyman);
    }

    #[tokio::test]
    async fn test_demotion_guard_holds() {
        let (service, repo, _rx) = setup().await;
        // Promoted at 90 evaluations; ten more since then dropped F1 to 0.80.
        let v = validator(&repo, ValidatorTier::Apprentice, 0.80, 100).await;
        let promotion = TierChange::new(v.id, ValidatorTier::Apprentice, ValidatorTier::Journeyman, 0.86, 90, Utc::now());
        assert!(repo.apply_tier_change(&promotion).await.unwrap());

        assert!(service.check_and_apply(v.id).await.unwrap().is_none());
        let got = repo.get(v.id).await.unwrap().unwrap();
        assert_eq!(got.tier, ValidatorTier::Journeyman);
        assert_eq!(got.total_evaluations, 100);
    }

    #[tokio::test]
    async fn test_demotion_after_guard() {
        let (service, repo, _rx) = setup().await;
        let v = validator(&repo, ValidatorTier::Expert, 0.80, 300).await;

        let change = service.check_and_apply(v.id).await.unwrap().unwrap();
        assert_eq!(change.to_tier, ValidatorTier::Journeyman);
        assert!(!change.is_promotion());
    }

    #[tokio::test]
    async fn test_promotion_requires_both_thresholds() {
        let (service, repo, _rx) = setup().await;
        let few = validator(&repo, ValidatorTier::Apprentice, 0.95, 49).await;
        let weak = validator(&repo, ValidatorTier::Apprentice, 0.84, 500).await;

        assert!(service.check_and_apply(few.id).await.unwrap().is_none());
        assert!(service.check_and_apply(weak.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_validator_is_noop() {
        let (service, _repo, _rx) = setup().await;
        assert!(service.check_and_apply(Uuid::new_v4()).await.unwrap().is_none());
    }
}
