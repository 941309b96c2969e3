use async_trait::async_trait;
use gate_core::effects::{CredentialChange, CredentialStore};
use gate_core::{Credential, CredentialId, FacilityId, GateError, Result, SubjectId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<CredentialId, Credential>,
    /// Issuance order per subject, oldest first
    by_subject: HashMap<SubjectId, Vec<CredentialId>>,
}

impl Inner {
    fn active_for(&self, subject_id: &SubjectId) -> Option<&Credential> {
        self.by_subject
            .get(subject_id)?
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .find(|c| c.active)
    }

    /// Reject writes that would break the store's invariants
    fn check_transition(&self, current: &Credential, next: &Credential) -> Result<()> {
        if current.subject_id != next.subject_id {
            return Err(GateError::invalid(format!("{} cannot change subject", next.id)));
        }
        if current.is_revoked() && (!next.is_revoked() || next.active) {
            return Err(GateError::conflict(format!("{} is revoked", next.id)));
        }
        if next.active && !current.active {
            if let Some(existing) = self.active_for(&next.subject_id) {
                return Err(GateError::conflict(format!(
                    "subject {} already holds active {}",
                    next.subject_id, existing.id
                )));
            }
        }
        Ok(())
    }
}

/// Credential store held in memory
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl MemoryCredentialStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials, active or not
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, id: &CredentialId) -> Result<Option<Credential>> {
        Ok(self.inner.read().by_id.get(id).cloned())
    }

    async fn active_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Credential>> {
        Ok(self.inner.read().active_for(subject_id).cloned())
    }

    async fn latest_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Credential>> {
        let inner = self.inner.read();
        Ok(inner
            .by_subject
            .get(subject_id)
            .and_then(|ids| ids.last())
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn insert(&self, mut credential: Credential) -> Result<Credential> {
        credential.seal();
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&credential.id) {
            return Err(GateError::conflict(format!(
                "{} already exists",
                credential.id
            )));
        }
        if credential.active {
            if let Some(existing) = inner.active_for(&credential.subject_id) {
                return Err(GateError::conflict(format!(
                    "subject {} already holds active {}",
                    credential.subject_id, existing.id
                )));
            }
        }
        inner
            .by_subject
            .entry(credential.subject_id.clone())
            .or_default()
            .push(credential.id);
        inner.by_id.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn update(&self, mut credential: Credential) -> Result<Credential> {
        credential.seal();
        let mut inner = self.inner.write();
        let Some(current) = inner.by_id.get(&credential.id) else {
            return Err(GateError::not_found(format!("{}", credential.id)));
        };
        inner.check_transition(current, &credential)?;
        inner.by_id.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn modify(&self, id: &CredentialId, change: CredentialChange) -> Result<Credential> {
        let mut inner = self.inner.write();
        let Some(current) = inner.by_id.get(id) else {
            return Err(GateError::not_found(format!("{id}")));
        };
        if current.is_revoked() {
            return Err(GateError::conflict(format!("{id} is revoked")));
        }
        let mut next = current.clone();
        change(&mut next)?;
        next.seal();
        inner.check_transition(current, &next)?;
        inner.by_id.insert(next.id, next.clone());
        Ok(next)
    }

    async fn with_permission_on(
        &self,
        facilities: &BTreeSet<FacilityId>,
    ) -> Result<Vec<Credential>> {
        let mut matching: Vec<Credential> = self
            .inner
            .read()
            .by_id
            .values()
            .filter(|c| c.has_permission_on(facilities))
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.id);
        Ok(matching)
    }
}
