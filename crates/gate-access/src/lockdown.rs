//! Emergency lockdown controller
//!
//! Per-facility two-state machine. `normal -> lockdown(reason, actor)` is
//! unconditional and immediate, `lockdown -> normal` clears reason and
//! actor. Both transitions are admin-only and each produces one
//! `AdminAuditEvent`. The validation engine reads the state on every scan,
//! so a transition reaches in-flight validations as soon as the store
//! write lands.

use gate_core::effects::Notification;
use gate_core::{AdminAction, FacilityId, GateError, LockdownState, Result, SubjectId};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::admin::{notify_best_effort, record_audit, require_admin};
use crate::context::GateContext;

/// Activates and lifts lockdowns
#[derive(Debug, Clone)]
pub struct LockdownController {
    ctx: GateContext,
}

impl LockdownController {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    /// Lock down every listed facility
    ///
    /// All ids are checked before any state changes, so an unknown id leaves
    /// every facility untouched.
    pub async fn activate(
        &self,
        actor: &SubjectId,
        facility_ids: &[FacilityId],
        reason: &str,
    ) -> Result<Vec<FacilityId>> {
        require_admin(&self.ctx, actor).await?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(GateError::invalid("lockdown reason must not be empty"));
        }
        let targets = self.resolve(facility_ids).await?;
        let now = self.ctx.now().await?;

        for id in &targets {
            let state = LockdownState::Lockdown {
                reason: reason.to_string(),
                activated_by: actor.clone(),
                activated_at: now,
            };
            self.ctx.facilities.set_lockdown(id, state).await?;
        }
        record_audit(
            &self.ctx,
            actor,
            AdminAction::LockdownActivated,
            targets.iter().map(ToString::to_string).collect(),
            Some(reason.to_string()),
        )
        .await?;
        warn!(actor = %actor, facilities = ?targets, reason, "lockdown activated");

        notify_best_effort(
            &self.ctx,
            Notification::LockdownActivated {
                facility_ids: targets.clone(),
                reason: reason.to_string(),
                actor: actor.clone(),
            },
        )
        .await;
        Ok(targets)
    }

    /// Return every listed facility to normal
    pub async fn lift(&self, actor: &SubjectId, facility_ids: &[FacilityId]) -> Result<Vec<FacilityId>> {
        require_admin(&self.ctx, actor).await?;
        let targets = self.resolve(facility_ids).await?;

        for id in &targets {
            self.ctx.facilities.set_lockdown(id, LockdownState::Normal).await?;
        }
        record_audit(
            &self.ctx,
            actor,
            AdminAction::LockdownLifted,
            targets.iter().map(ToString::to_string).collect(),
            None,
        )
        .await?;
        info!(actor = %actor, facilities = ?targets, "lockdown lifted");

        notify_best_effort(
            &self.ctx,
            Notification::LockdownLifted {
                facility_ids: targets.clone(),
                actor: actor.clone(),
            },
        )
        .await;
        Ok(targets)
    }

    /// Current state of one facility
    pub async fn state(&self, facility_id: &FacilityId) -> Result<LockdownState> {
        self.ctx
            .facilities
            .get(facility_id)
            .await?
            .map(|f| f.lockdown)
            .ok_or_else(|| GateError::not_found(format!("facility {facility_id}")))
    }

    /// Deduplicate and check existence
    async fn resolve(&self, facility_ids: &[FacilityId]) -> Result<Vec<FacilityId>> {
        let unique: BTreeSet<FacilityId> = facility_ids.iter().cloned().collect();
        if unique.is_empty() {
            return Err(GateError::invalid("at least one facility id is required"));
        }
        for id in &unique {
            if self.ctx.facilities.get(id).await?.is_none() {
                return Err(GateError::not_found(format!("facility {id}")));
            }
        }
        Ok(unique.into_iter().collect())
    }
}
