//! Outbound notifications to validator owners.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::TierChangeNotification;

/// Events delivered to the agent that owns a validator.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    TierChanged(TierChangeNotification),
}

/// Fire-and-forget notification channel. Delivery failures are the
/// implementation's concern and never reach the caller.
#[async_trait]
pub trait ValidatorNotifier: Send + Sync {
    async fn send(&self, agent_id: Uuid, event: NotificationEvent);
}
