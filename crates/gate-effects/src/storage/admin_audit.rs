use async_trait::async_trait;
use gate_core::effects::AdminAuditStore;
use gate_core::{AdminAuditEvent, Page, Result};
use parking_lot::RwLock;

use super::paginate;

/// Administrative audit trail held in memory
#[derive(Debug, Default)]
pub struct MemoryAdminAuditLog {
    events: RwLock<Vec<AdminAuditEvent>>,
}

impl MemoryAdminAuditLog {
    /// Empty trail
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminAuditStore for MemoryAdminAuditLog {
    async fn record(&self, event: AdminAuditEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Page<AdminAuditEvent>> {
        let mut events = self.events.read().clone();
        events.sort_by_key(|e| e.at);
        Ok(paginate(&events, offset, limit))
    }
}
