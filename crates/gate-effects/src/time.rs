//! Time effect handler - production only
//!
//! Delegates to the operating system clock.

use async_trait::async_trait;
use gate_core::effects::{PhysicalTimeEffects, TimeError};
use gate_core::Timestamp;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Real time handler for production use
#[derive(Debug, Clone, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    #[allow(clippy::disallowed_methods)]
    async fn physical_time(&self) -> Result<Timestamp, TimeError> {
        // SystemTime::now() is allowed here: this handler is the bridge to the OS clock.
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::OperationFailed {
                reason: format!("system clock before unix epoch: {e}"),
            })?;
        let millis = u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX);
        Ok(Timestamp::from_millis(millis))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}
