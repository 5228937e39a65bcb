//! Notifier that records events in the structured log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::ports::{NotificationEvent, ValidatorNotifier};

/// Writes each notification as an `info` event. Used when no delivery
/// transport is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl ValidatorNotifier for TracingNotifier {
    async fn send(&self, agent_id: Uuid, event: NotificationEvent) {
        match event {
            NotificationEvent::TierChanged(payload) => {
                let payload_json = serde_json::to_string(&payload).unwrap_or_default();
                tracing::info!(
                    %agent_id,
                    previous_tier = %payload.previous_tier,
                    new_tier = %payload.new_tier,
                    f1_score = payload.f1_score,
                    payload = %payload_json,
                    "validator tier changed"
                );
            }
        }
    }
}
