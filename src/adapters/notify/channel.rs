//! Notifier that forwards events into a tokio channel.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::ports::{NotificationEvent, ValidatorNotifier};

/// An event paired with the agent it is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub agent_id: Uuid,
    pub event: NotificationEvent,
}

/// Hands notifications to whatever consumes the receiving end. A full or
/// closed channel drops the event with a warning.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<DeliveredNotification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DeliveredNotification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ValidatorNotifier for ChannelNotifier {
    async fn send(&self, agent_id: Uuid, event: NotificationEvent) {
        if let Err(e) = self.tx.try_send(DeliveredNotification { agent_id, event }) {
            tracing::warn!(%agent_id, error = %e, "dropping validator notification");
        }
    }
}
