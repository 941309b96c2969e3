//! Storage failure injection

use async_trait::async_trait;
use gate_core::effects::{
    AccessLogStore, CredentialChange, CredentialStore, FacilityStore, SlotClaim,
};
use gate_core::{
    AccessLogEntry, AccessLogFilter, Credential, CredentialId, EntryId, Facility, FacilityId,
    GateError, LockdownState, Page, Result, SecurityFlag, SubjectId, Timestamp,
};
use gate_effects::{MemoryAccessLog, MemoryCredentialStore};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn down<T>() -> Result<T> {
    Err(GateError::storage("backend unavailable"))
}

/// Store whose every operation fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

#[async_trait]
impl CredentialStore for UnavailableStore {
    async fn get(&self, _id: &CredentialId) -> Result<Option<Credential>> {
        down()
    }

    async fn active_for_subject(&self, _subject_id: &SubjectId) -> Result<Option<Credential>> {
        down()
    }

    async fn latest_for_subject(&self, _subject_id: &SubjectId) -> Result<Option<Credential>> {
        down()
    }

    async fn insert(&self, _credential: Credential) -> Result<Credential> {
        down()
    }

    async fn update(&self, _credential: Credential) -> Result<Credential> {
        down()
    }

    async fn modify(&self, _id: &CredentialId, _change: CredentialChange) -> Result<Credential> {
        down()
    }

    async fn with_permission_on(
        &self,
        _facilities: &BTreeSet<FacilityId>,
    ) -> Result<Vec<Credential>> {
        down()
    }
}

#[async_trait]
impl FacilityStore for UnavailableStore {
    async fn get(&self, _id: &FacilityId) -> Result<Option<Facility>> {
        down()
    }

    async fn list(&self) -> Result<Vec<Facility>> {
        down()
    }

    async fn upsert(&self, _facility: Facility) -> Result<()> {
        down()
    }

    async fn define(&self, _facility: Facility) -> Result<Facility> {
        down()
    }

    async fn try_claim_slot(&self, _id: &FacilityId) -> Result<SlotClaim> {
        down()
    }

    async fn release_slot(&self, _id: &FacilityId) -> Result<u32> {
        down()
    }

    async fn set_lockdown(&self, _id: &FacilityId, _state: LockdownState) -> Result<()> {
        down()
    }
}

#[async_trait]
impl AccessLogStore for UnavailableStore {
    async fn append(&self, _entry: AccessLogEntry) -> Result<()> {
        down()
    }

    async fn append_unique(&self, _entry: AccessLogEntry) -> Result<bool> {
        down()
    }

    async fn count_attempts(
        &self,
        _subject_id: &SubjectId,
        _facility_id: &FacilityId,
        _since: Timestamp,
    ) -> Result<u32> {
        down()
    }

    async fn query(&self, _filter: &AccessLogFilter) -> Result<Page<AccessLogEntry>> {
        down()
    }

    async fn entries_since(&self, _since: Timestamp) -> Result<Vec<AccessLogEntry>> {
        down()
    }

    async fn add_security_flags(&self, _id: &EntryId, _flags: &[SecurityFlag]) -> Result<bool> {
        down()
    }
}

/// In-memory access log whose writes can be switched off; reads keep working
#[derive(Debug, Default)]
pub struct FailingAccessLog {
    inner: MemoryAccessLog,
    fail_writes: AtomicBool,
}

impl FailingAccessLog {
    /// Log that rejects writes until `set_failing(false)`
    pub fn failing() -> Self {
        let log = Self::default();
        log.set_failing(true);
        log
    }

    /// Toggle write failures
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Entries that made it in
    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.inner.snapshot()
    }

    fn writes_down(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessLogStore for FailingAccessLog {
    async fn append(&self, entry: AccessLogEntry) -> Result<()> {
        if self.writes_down() {
            return down();
        }
        self.inner.append(entry).await
    }

    async fn append_unique(&self, entry: AccessLogEntry) -> Result<bool> {
        if self.writes_down() {
            return down();
        }
        self.inner.append_unique(entry).await
    }

    async fn count_attempts(
        &self,
        subject_id: &SubjectId,
        facility_id: &FacilityId,
        since: Timestamp,
    ) -> Result<u32> {
        self.inner.count_attempts(subject_id, facility_id, since).await
    }

    async fn query(&self, filter: &AccessLogFilter) -> Result<Page<AccessLogEntry>> {
        self.inner.query(filter).await
    }

    async fn entries_since(&self, since: Timestamp) -> Result<Vec<AccessLogEntry>> {
        self.inner.entries_since(since).await
    }

    async fn add_security_flags(&self, id: &EntryId, flags: &[SecurityFlag]) -> Result<bool> {
        if self.writes_down() {
            return down();
        }
        self.inner.add_security_flags(id, flags).await
    }
}

/// Credential store that lets a competing writer in between a service's read
/// and its write
///
/// Armed writes run once against the shared inner store right before the next
/// `modify` (a revocation) or `insert` (another credential) is delegated. An
/// armed callback runs once inside the next `with_permission_on`.
pub struct InterleavingCredentials {
    inner: Arc<MemoryCredentialStore>,
    revoke_next_modify: Mutex<Option<(Timestamp, String)>>,
    insert_before_next: Mutex<Option<Credential>>,
    during_next_scan: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl std::fmt::Debug for InterleavingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterleavingCredentials")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl InterleavingCredentials {
    pub fn new(inner: Arc<MemoryCredentialStore>) -> Self {
        Self {
            inner,
            revoke_next_modify: Mutex::new(None),
            insert_before_next: Mutex::new(None),
            during_next_scan: Mutex::new(None),
        }
    }

    /// Revoke the target of the next `modify` just before it runs
    pub fn revoke_before_next_modify(&self, at: Timestamp, reason: &str) {
        *self.revoke_next_modify.lock() = Some((at, reason.to_string()));
    }

    /// Store `competitor` just before the next `insert` runs
    pub fn insert_before_next(&self, competitor: Credential) {
        *self.insert_before_next.lock() = Some(competitor);
    }

    /// Run `callback` while the next `with_permission_on` is in progress
    pub fn during_next_scan(&self, callback: impl FnOnce() + Send + 'static) {
        *self.during_next_scan.lock() = Some(Box::new(callback));
    }
}

#[async_trait]
impl CredentialStore for InterleavingCredentials {
    async fn get(&self, id: &CredentialId) -> Result<Option<Credential>> {
        self.inner.get(id).await
    }

    async fn active_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Credential>> {
        self.inner.active_for_subject(subject_id).await
    }

    async fn latest_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Credential>> {
        self.inner.latest_for_subject(subject_id).await
    }

    async fn insert(&self, credential: Credential) -> Result<Credential> {
        let competitor = self.insert_before_next.lock().take();
        if let Some(competitor) = competitor {
            self.inner.insert(competitor).await?;
        }
        self.inner.insert(credential).await
    }

    async fn update(&self, credential: Credential) -> Result<Credential> {
        self.inner.update(credential).await
    }

    async fn modify(&self, id: &CredentialId, change: CredentialChange) -> Result<Credential> {
        let revocation = self.revoke_next_modify.lock().take();
        if let Some((at, reason)) = revocation {
            self.inner
                .modify(
                    id,
                    Box::new(move |c: &mut Credential| {
                        c.revoke(at, reason);
                        Ok(())
                    }),
                )
                .await?;
        }
        self.inner.modify(id, change).await
    }

    async fn with_permission_on(
        &self,
        facilities: &BTreeSet<FacilityId>,
    ) -> Result<Vec<Credential>> {
        let matching = self.inner.with_permission_on(facilities).await?;
        let callback = self.during_next_scan.lock().take();
        if let Some(callback) = callback {
            callback();
        }
        Ok(matching)
    }
}
