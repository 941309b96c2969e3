//! Persistence interfaces
//!
//! Stores return `GateError::Storage` when the backend is unavailable. The
//! validation engine treats any such error as a reason to fail closed.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::access_log::{AccessLogEntry, AccessLogFilter, AdminAuditEvent, Page, SecurityFlag};
use crate::credential::Credential;
use crate::errors::Result;
use crate::facility::{Facility, LockdownState};
use crate::identifiers::{CredentialId, EntryId, FacilityId, SubjectId};
use crate::time::Timestamp;

/// In-place edit applied by [`CredentialStore::modify`]
pub type CredentialChange = Box<dyn FnOnce(&mut Credential) -> Result<()> + Send>;

/// Credential persistence
///
/// Implementations enforce that at most one credential per subject is
/// active, that a revoked credential is never reactivated, and reseal
/// credentials before storing them.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load by id
    async fn get(&self, id: &CredentialId) -> Result<Option<Credential>>;

    /// The subject's active credential, if any
    async fn active_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Credential>>;

    /// The subject's most recently issued credential, active or not
    async fn latest_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Credential>>;

    /// Insert a new credential; `Conflict` if it would create a second active one
    async fn insert(&self, credential: Credential) -> Result<Credential>;

    /// Replace an existing credential; `NotFound` if absent
    ///
    /// `Conflict` if the write would clear a revocation or reactivate a
    /// revoked record.
    async fn update(&self, credential: Credential) -> Result<Credential>;

    /// Read, edit and write back one credential as a single step
    ///
    /// `Conflict` if the stored credential is revoked; the edit is not run.
    /// An error from `change` leaves the stored record untouched.
    async fn modify(&self, id: &CredentialId, change: CredentialChange) -> Result<Credential>;

    /// Every credential holding a permission on any of `facilities`
    async fn with_permission_on(&self, facilities: &BTreeSet<FacilityId>)
        -> Result<Vec<Credential>>;
}

/// Result of an atomic occupancy claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaim {
    /// Occupancy was incremented to the contained value
    Claimed { occupancy: u32 },
    /// Facility is at capacity; nothing changed
    Full,
    /// Facility does not exist
    NotFound,
}

/// Facility registry persistence
#[async_trait]
pub trait FacilityStore: Send + Sync {
    /// Load by id
    async fn get(&self, id: &FacilityId) -> Result<Option<Facility>>;

    /// All facilities ordered by id
    async fn list(&self) -> Result<Vec<Facility>>;

    /// Insert or replace a facility record verbatim
    async fn upsert(&self, facility: Facility) -> Result<()>;

    /// Insert a facility, or redefine an existing one in place
    ///
    /// A new facility starts empty and unlocked. A redefinition keeps the live occupancy (clamped to the new capacity)
    /// and lockdown state, read and written under the same lock as
    /// `try_claim_slot` and `set_lockdown`.
    async fn define(&self, facility: Facility) -> Result<Facility>;

    /// Increment occupancy only if below capacity, as one atomic step
    async fn try_claim_slot(&self, id: &FacilityId) -> Result<SlotClaim>;

    /// Decrement occupancy, saturating at zero; returns the new occupancy
    async fn release_slot(&self, id: &FacilityId) -> Result<u32>;

    /// Replace the lockdown state
    async fn set_lockdown(&self, id: &FacilityId, state: LockdownState) -> Result<()>;
}

/// Append-only access log
#[async_trait]
pub trait AccessLogStore: Send + Sync {
    /// Append an entry
    async fn append(&self, entry: AccessLogEntry) -> Result<()>;

    /// Append unless an entry with the same sync key exists; `true` if appended
    async fn append_unique(&self, entry: AccessLogEntry) -> Result<bool>;

    /// Entries for (subject, facility) with `timestamp >= since`
    async fn count_attempts(
        &self,
        subject_id: &SubjectId,
        facility_id: &FacilityId,
        since: Timestamp,
    ) -> Result<u32>;

    /// Filtered, paginated export ordered by timestamp
    async fn query(&self, filter: &AccessLogFilter) -> Result<Page<AccessLogEntry>>;

    /// Entries with `timestamp >= since`
    async fn entries_since(&self, since: Timestamp) -> Result<Vec<AccessLogEntry>>;

    /// Append flags to an entry; `true` if any flag was new
    async fn add_security_flags(&self, id: &EntryId, flags: &[SecurityFlag]) -> Result<bool>;
}

/// Append-only administrative audit log
#[async_trait]
pub trait AdminAuditStore: Send + Sync {
    /// Record an event
    async fn record(&self, event: AdminAuditEvent) -> Result<()>;

    /// Events ordered by time
    async fn list(&self, offset: usize, limit: usize) -> Result<Page<AdminAuditEvent>>;
}
