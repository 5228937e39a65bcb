//! Notification adapters.

pub mod channel;
pub mod tracing_notifier;

pub use channel::{ChannelNotifier, DeliveredNotification};
pub use tracing_notifier::TracingNotifier;
