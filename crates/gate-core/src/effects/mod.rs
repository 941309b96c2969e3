//! Effect interfaces
//!
//! Pure trait signatures for everything with side effects: clocks, entropy,
//! persistence and the excluded collaborators (identity, notifications).
//! Production handlers live in `gate-effects`; deterministic test handlers
//! live in `gate-testkit`.

pub mod identity;
pub mod notification;
pub mod random;
pub mod storage;
pub mod time;

pub use identity::{IdentityEffects, SubjectProfile};
pub use notification::{Notification, NotificationEffects};
pub use random::RandomEffects;
pub use storage::{
    AccessLogStore, AdminAuditStore, CredentialChange, CredentialStore, FacilityStore, SlotClaim,
};
pub use time::{PhysicalTimeEffects, TimeError};
