//! Validator registration and lookup.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GeoPoint, TierChange, Validator};
use crate::domain::ports::{Clock, ValidatorFilter, ValidatorRepository};

/// Input for registering a new validator.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub agent_id: Uuid,
    pub home_point: Option<GeoPoint>,
    pub regions: Vec<String>,
    pub domains: Vec<String>,
}

pub struct ValidatorRegistryService<V: ValidatorRepository> {
    validators: Arc<V>,
    clock: Arc<dyn Clock>,
}

impl<V: ValidatorRepository> ValidatorRegistryService<V> {
    pub fn new(validators: Arc<V>, clock: Arc<dyn Clock>) -> Self {
        Self { validators, clock }
    }

    /// Register a new apprentice validator owned by `agent_id`.
    #[instrument(skip(self, registration), fields(agent_id = %registration.agent_id))]
    pub async fn register(&self, registration: Registration) -> DomainResult<Validator> {
        let mut validator = Validator::new(registration.agent_id, self.clock.now())
            .with_regions(registration.regions)
            .with_domains(registration.domains);
        if let Some(point) = registration.home_point {
            validator = validator.with_home_point(point);
        }
        validator.validate().map_err(DomainError::ValidationFailed)?;

        self.validators.create(&validator).await?;
        info!(validator_id = %validator.id, global = validator.is_global(), "validator registered");
        Ok(validator)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Validator> {
        self.validators.get(id).await?.ok_or(DomainError::ValidatorNotFound(id))
    }

    pub async fn list(&self, filter: ValidatorFilter) -> DomainResult<Vec<Validator>> {
        self.validators.list(filter).await
    }

    pub async fn tier_history(&self, id: Uuid) -> DomainResult<Vec<TierChange>> {
        self.validators.tier_history(id).await
    }

    /// Remove a validator from future candidate pools. Existing assignments stand.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> DomainResult<Validator> {
        self.validators.deactivate(id, self.clock.now()).await?;
        info!("validator deactivated");
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteValidatorRepository};
    use crate::domain::models::ValidatorTier;
    use crate::domain::ports::SystemClock;

    async fn setup() -> ValidatorRegistryService<SqliteValidatorRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        ValidatorRegistryService::new(Arc::new(SqliteValidatorRepository::new(pool)), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_register_creates_apprentice() {
        let service = setup().await;
        let v = service
            .register(Registration {
                agent_id: Uuid::new_v4(),
                home_point: Some(GeoPoint::new(6.5, 3.4)),
                regions: vec!["lagos".into()],
                domains: vec!["food".into()],
            })
            .await
            .unwrap();

        let got = service.get(v.id).await.unwrap();
        assert_eq!(got.tier, ValidatorTier::Apprentice);
        assert!(!got.is_global());
        assert_eq!(got.domains, vec!["food".to_string()]);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_point() {
        let service = setup().await;
        let err = service
            .register(Registration {
                agent_id: Uuid::new_v4(),
                home_point: Some(GeoPoint::new(123.0, 0.0)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_deactivate() {
        let service = setup().await;
        let v = service.register(Registration { agent_id: Uuid::new_v4(), ..Default::default() }).await.unwrap();
        let got = service.deactivate(v.id).await.unwrap();
        assert!(!got.is_active);

        let active = service.list(ValidatorFilter { active_only: true, ..Default::default() }).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let service = setup().await;
        assert!(matches!(service.get(Uuid::new_v4()).await, Err(DomainError::ValidatorNotFound(_))));
    }
}
