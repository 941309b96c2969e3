//! Notification collaborator
//!
//! Delivery is fire-and-forget. Callers log failures and carry on; a
//! notification failure never changes an access decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::identifiers::{CredentialId, DeviceId, FacilityId, SubjectId};

/// Events worth telling someone about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    CredentialRevoked {
        subject_id: SubjectId,
        credential_id: CredentialId,
        reason: String,
    },
    LockdownActivated {
        facility_ids: Vec<FacilityId>,
        reason: String,
        actor: SubjectId,
    },
    LockdownLifted {
        facility_ids: Vec<FacilityId>,
        actor: SubjectId,
    },
    SuspiciousActivity {
        subject_id: Option<SubjectId>,
        facility_id: FacilityId,
        device_id: DeviceId,
        denial_count: u32,
    },
}

/// Outbound notification channel
#[async_trait]
pub trait NotificationEffects: Send + Sync {
    /// Deliver a notification
    async fn notify(&self, notification: Notification) -> Result<()>;
}
