//! Effect bundle shared by the services
//!
//! Every service holds a clone of one `GateContext`; the handlers behind the
//! trait objects decide whether it runs against production stores or test
//! doubles.

use gate_core::effects::{
    AccessLogStore, AdminAuditStore, CredentialStore, FacilityStore, IdentityEffects,
    NotificationEffects, PhysicalTimeEffects, RandomEffects,
};
use gate_core::{EntryId, Nonce, Result, Timestamp};
use std::sync::Arc;

/// Handlers for every effect the access services use
#[derive(Clone)]
pub struct GateContext {
    pub clock: Arc<dyn PhysicalTimeEffects>,
    pub random: Arc<dyn RandomEffects>,
    pub identity: Arc<dyn IdentityEffects>,
    pub notifier: Arc<dyn NotificationEffects>,
    pub credentials: Arc<dyn CredentialStore>,
    pub facilities: Arc<dyn FacilityStore>,
    pub access_log: Arc<dyn AccessLogStore>,
    pub admin_audit: Arc<dyn AdminAuditStore>,
}

impl GateContext {
    /// Current physical time
    pub async fn now(&self) -> Result<Timestamp> {
        Ok(self.clock.physical_time().await?)
    }

    /// Fresh log or audit entry identifier
    pub async fn next_entry_id(&self) -> EntryId {
        EntryId::from_entropy(self.random.random_bytes_16().await)
    }

    /// Fresh payload nonce
    pub async fn next_nonce(&self) -> Nonce {
        Nonce::from_bytes(self.random.random_bytes_16().await)
    }
}

impl std::fmt::Debug for GateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateContext").finish_non_exhaustive()
    }
}
