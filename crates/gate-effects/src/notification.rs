//! Notification handler that writes to the tracing pipeline
//!
//! Stands in for the external notification service: every notification is
//! emitted as a structured `warn!` event that log shippers can route.

use async_trait::async_trait;
use gate_core::effects::{Notification, NotificationEffects};
use gate_core::Result;
use tracing::warn;

/// Emits notifications as tracing events
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationHandler;

impl TracingNotificationHandler {
    /// Create a new handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationEffects for TracingNotificationHandler {
    async fn notify(&self, notification: Notification) -> Result<()> {
        let body = serde_json::to_string(&notification)?;
        warn!(target: "gate::notify", notification = %body, "notification");
        Ok(())
    }
}
