use async_trait::async_trait;
use gate_core::effects::{FacilityStore, SlotClaim};
use gate_core::{Facility, FacilityId, GateError, LockdownState, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Facility registry held in memory
#[derive(Debug, Default)]
pub struct MemoryFacilityStore {
    facilities: RwLock<BTreeMap<FacilityId, Facility>>,
}

impl MemoryFacilityStore {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FacilityStore for MemoryFacilityStore {
    async fn get(&self, id: &FacilityId) -> Result<Option<Facility>> {
        Ok(self.facilities.read().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Facility>> {
        Ok(self.facilities.read().values().cloned().collect())
    }

    async fn upsert(&self, facility: Facility) -> Result<()> {
        facility.validate()?;
        self.facilities.write().insert(facility.id.clone(), facility);
        Ok(())
    }

    async fn define(&self, mut facility: Facility) -> Result<Facility> {
        let mut facilities = self.facilities.write();
        if let Some(live) = facilities.get(&facility.id) {
            facility.current_occupancy = match facility.capacity {
                Some(capacity) => live.current_occupancy.min(capacity),
                None => live.current_occupancy,
            };
            facility.lockdown = live.lockdown.clone();
        } else {
            facility.current_occupancy = 0;
            facility.lockdown = LockdownState::Normal;
        }
        facility.validate()?;
        facilities.insert(facility.id.clone(), facility.clone());
        Ok(facility)
    }

    async fn try_claim_slot(&self, id: &FacilityId) -> Result<SlotClaim> {
        let mut facilities = self.facilities.write();
        let Some(facility) = facilities.get_mut(id) else {
            return Ok(SlotClaim::NotFound);
        };
        if facility.is_full() {
            return Ok(SlotClaim::Full);
        }
        facility.current_occupancy = facility.current_occupancy.saturating_add(1);
        Ok(SlotClaim::Claimed {
            occupancy: facility.current_occupancy,
        })
    }

    async fn release_slot(&self, id: &FacilityId) -> Result<u32> {
        let mut facilities = self.facilities.write();
        let facility = facilities
            .get_mut(id)
            .ok_or_else(|| GateError::not_found(format!("facility {id}")))?;
        facility.current_occupancy = facility.current_occupancy.saturating_sub(1);
        Ok(facility.current_occupancy)
    }

    async fn set_lockdown(&self, id: &FacilityId, state: LockdownState) -> Result<()> {
        let mut facilities = self.facilities.write();
        let facility = facilities
            .get_mut(id)
            .ok_or_else(|| GateError::not_found(format!("facility {id}")))?;
        facility.lockdown = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_never_exceed_capacity() {
        let store = Arc::new(MemoryFacilityStore::new());
        let id = FacilityId::new("LAB").unwrap();
        store
            .upsert(Facility::new(id.clone(), "Lab").with_capacity(3))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { store.try_claim_slot(&id).await }));
        }
        let mut claimed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap().unwrap(), SlotClaim::Claimed { .. }) {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 3);
        assert_eq!(store.get(&id).await.unwrap().unwrap().current_occupancy, 3);
    }

    #[tokio::test]
    async fn release_saturates_and_missing_facility_reports() {
        let store = MemoryFacilityStore::new();
        let id = FacilityId::new("GYM").unwrap();
        store.upsert(Facility::new(id.clone(), "Gym")).await.unwrap();
        assert_eq!(store.release_slot(&id).await.unwrap(), 0);
        let missing = FacilityId::new("NOPE").unwrap();
        assert_eq!(store.try_claim_slot(&missing).await.unwrap(), SlotClaim::NotFound);
        assert!(store.release_slot(&missing).await.is_err());
    }

    #[tokio::test]
    async fn redefinition_keeps_live_lockdown_and_occupancy() {
        let store = MemoryFacilityStore::new();
        let id = FacilityId::new("LAB").unwrap();
        store.define(Facility::new(id.clone(), "Lab").with_capacity(5)).await.unwrap();
        store.try_claim_slot(&id).await.unwrap();
        store.try_claim_slot(&id).await.unwrap();
        let locked = LockdownState::Lockdown {
            reason: "spill".to_string(),
            activated_by: gate_core::SubjectId::new("admin-1").unwrap(),
            activated_at: gate_core::Timestamp::from_secs(10),
        };
        store.set_lockdown(&id, locked.clone()).await.unwrap();

        let stale = Facility::new(id.clone(), "Chemistry Lab").with_capacity(1);
        let saved = store.define(stale).await.unwrap();
        assert_eq!(saved.name, "Chemistry Lab");
        assert_eq!(saved.lockdown, locked);
        assert_eq!(saved.current_occupancy, 1);
        assert_eq!(store.get(&id).await.unwrap().unwrap(), saved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn redefinitions_never_drop_concurrent_claims() {
        let store = Arc::new(MemoryFacilityStore::new());
        let id = FacilityId::new("HALL").unwrap();
        store.define(Facility::new(id.clone(), "Hall").with_capacity(100)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store.try_claim_slot(&id).await.map(|_| ())
                } else {
                    let renamed = Facility::new(id, format!("Hall {i}")).with_capacity(100);
                    store.define(renamed).await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.get(&id).await.unwrap().unwrap().current_occupancy, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn lockdown_survives_concurrent_redefinitions() {
        let store = Arc::new(MemoryFacilityStore::new());
        let id = FacilityId::new("HALL").unwrap();
        store.define(Facility::new(id.clone(), "Hall")).await.unwrap();
        let locked = LockdownState::Lockdown {
            reason: "alarm".to_string(),
            activated_by: gate_core::SubjectId::new("admin-1").unwrap(),
            activated_at: gate_core::Timestamp::from_secs(10),
        };

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let id = id.clone();
            let locked = locked.clone();
            handles.push(tokio::spawn(async move {
                if i == 8 {
                    store.set_lockdown(&id, locked).await
                } else {
                    let renamed = Facility::new(id, format!("Hall {i}"));
                    store.define(renamed).await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.get(&id).await.unwrap().unwrap().lockdown, locked);
    }
}
