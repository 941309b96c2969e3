//! Manually driven clock
//!
//! Time only moves when a test says so. `sleep_ms` advances the clock
//! instead of waiting, so periodic jobs can be stepped deterministically.

use async_trait::async_trait;
use gate_core::effects::{PhysicalTimeEffects, TimeError};
use gate_core::Timestamp;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Shared, manually advanced clock; clones observe the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn at(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Current reading
    pub fn now(&self) -> Timestamp {
        *self.now.lock()
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }

    /// Move forward
    pub fn advance(&self, by: Duration) -> Timestamp {
        let mut now = self.now.lock();
        *now = now.saturating_add(by);
        *now
    }
}

#[async_trait]
impl PhysicalTimeEffects for ManualClock {
    async fn physical_time(&self) -> Result<Timestamp, TimeError> {
        Ok(self.now())
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        self.advance(Duration::from_millis(ms));
        Ok(())
    }
}
