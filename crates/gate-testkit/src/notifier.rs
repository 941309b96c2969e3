//! Recording notification sink

use async_trait::async_trait;
use gate_core::effects::{Notification, NotificationEffects};
use gate_core::{GateError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps every notification; can be told to fail delivery
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    /// Sink that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every delivery fails
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    /// Everything delivered so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Count of delivered notifications
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl NotificationEffects for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GateError::internal("notification service unreachable"));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}
