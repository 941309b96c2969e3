//! Campus Gate Effects - production handlers
//!
//! Stateless handlers for the effect traits declared in `gate-core`, plus
//! in-memory stores. Mock and failure-injecting handlers belong in
//! `gate-testkit`.

#![forbid(unsafe_code)]

pub mod identity;
pub mod notification;
pub mod random;
pub mod storage;
pub mod time;

pub use identity::StaticIdentityDirectory;
pub use notification::TracingNotificationHandler;
pub use random::RealRandomHandler;
pub use storage::{
    MemoryAccessLog, MemoryAdminAuditLog, MemoryCredentialStore, MemoryFacilityStore,
};
pub use time::RealTimeHandler;
