//! Facility registry service
//!
//! Administrators define facilities; the registry keeps the live fields
//! (occupancy, lockdown) out of their reach. Occupancy moves only through
//! the validation engine's claim and `record_exit`; lockdown only through
//! the `LockdownController`.

use gate_core::{Facility, FacilityId, GateError, Result};
use tracing::{debug, info};

use crate::context::GateContext;

/// Read and define facilities
#[derive(Debug, Clone)]
pub struct FacilityRegistry {
    ctx: GateContext,
}

impl FacilityRegistry {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    /// Load a facility; `NotFound` if it does not exist
    pub async fn get(&self, id: &FacilityId) -> Result<Facility> {
        self.ctx
            .facilities
            .get(id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("facility {id}")))
    }

    /// Every facility, ordered by id
    pub async fn list(&self) -> Result<Vec<Facility>> {
        self.ctx.facilities.list().await
    }

    /// Create or redefine a facility
    ///
    /// Redefinition keeps the live occupancy and lockdown state; the store
    /// merges them atomically.
    pub async fn define(&self, facility: Facility) -> Result<Facility> {
        facility.validate()?;
        let facility = self.ctx.facilities.define(facility).await?;
        info!(facility = %facility.id, "facility defined");
        Ok(facility)
    }

    /// Someone left; occupancy drops by one, never below zero
    pub async fn record_exit(&self, id: &FacilityId) -> Result<u32> {
        let occupancy = self.ctx.facilities.release_slot(id).await?;
        debug!(facility = %id, occupancy, "exit recorded");
        Ok(occupancy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use gate_core::effects::{FacilityStore, SlotClaim};
    use gate_core::LockdownState;
    use gate_testkit::fixtures::{facility_id, research_lab};

    #[tokio::test]
    async fn redefinition_keeps_live_state() {
        let h = Harness::new().await;
        let registry = FacilityRegistry::new(h.ctx.clone());
        let lab = facility_id("LAB");
        h.facilities.try_claim_slot(&lab).await.unwrap();
        h.facilities
            .set_lockdown(&lab, LockdownState::Lockdown {
                reason: "drill".into(),
                activated_by: gate_testkit::fixtures::subject_id("admin-1"),
                activated_at: h.clock.now(),
            })
            .await
            .unwrap();

        let redefined = registry.define(research_lab().with_capacity(5)).await.unwrap();
        assert_eq!(redefined.current_occupancy, 1);
        assert!(redefined.lockdown.is_active());
        assert_eq!(registry.get(&lab).await.unwrap().capacity, Some(5));
    }

    #[tokio::test]
    async fn exit_saturates_at_zero() {
        let h = Harness::new().await;
        let registry = FacilityRegistry::new(h.ctx.clone());
        let lab = facility_id("LAB");
        assert!(matches!(
            h.facilities.try_claim_slot(&lab).await.unwrap(),
            SlotClaim::Claimed { occupancy: 1 }
        ));
        assert_eq!(registry.record_exit(&lab).await.unwrap(), 0);
        assert_eq!(registry.record_exit(&lab).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_facility_is_not_found() {
        let h = Harness::new().await;
        let registry = FacilityRegistry::new(h.ctx.clone());
        let err = registry.get(&facility_id("NOPE")).await.unwrap_err();
        assert!(matches!(err, GateError::NotFound { .. }));
        assert!(registry.record_exit(&facility_id("NOPE")).await.is_err());
    }
}
