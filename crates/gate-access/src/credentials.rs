//! Credential administration
//!
//! Revocation and permission changes. Each operation is admin-only, edits
//! the credential in place through `CredentialStore::modify` (which reseals
//! the integrity hash) and records an `AdminAuditEvent`. A revoked credential
//! refuses further edits with `Conflict`.

use gate_core::effects::Notification;
use gate_core::{
    AdminAction, Credential, CredentialId, FacilityId, FacilityPermission, GateError, Result,
    SubjectId,
};
use tracing::{info, warn};

use crate::admin::{notify_best_effort, record_audit, require_admin};
use crate::context::GateContext;

/// Administrative changes to credentials
#[derive(Debug, Clone)]
pub struct CredentialAdmin {
    ctx: GateContext,
}

impl CredentialAdmin {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    /// Load a credential; `NotFound` if absent
    pub async fn get(&self, credential_id: &CredentialId) -> Result<Credential> {
        self.ctx
            .credentials
            .get(credential_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("{credential_id}")))
    }

    /// Deactivate a credential; the record is kept for audit
    pub async fn revoke(
        &self,
        actor: &SubjectId,
        credential_id: &CredentialId,
        reason: &str,
    ) -> Result<Credential> {
        require_admin(&self.ctx, actor).await?;
        let reason = reason.trim().to_string();
        let now = self.ctx.now().await?;
        let revocation = reason.clone();
        let credential = self
            .ctx
            .credentials
            .modify(
                credential_id,
                Box::new(move |c: &mut Credential| {
                    c.revoke(now, revocation);
                    Ok(())
                }),
            )
            .await?;

        record_audit(
            &self.ctx,
            actor,
            AdminAction::CredentialRevoked,
            vec![credential.id.to_string()],
            Some(reason.clone()),
        )
        .await?;
        warn!(actor = %actor, credential = %credential.id, subject = %credential.subject_id, "credential revoked");

        notify_best_effort(
            &self.ctx,
            Notification::CredentialRevoked {
                subject_id: credential.subject_id.clone(),
                credential_id: credential.id,
                reason,
            },
        )
        .await;
        Ok(credential)
    }

    /// Add a permission, replacing any existing one for the same facility
    pub async fn grant_permission(
        &self,
        actor: &SubjectId,
        credential_id: &CredentialId,
        permission: FacilityPermission,
    ) -> Result<Credential> {
        require_admin(&self.ctx, actor).await?;
        if self.ctx.facilities.get(&permission.facility_id).await?.is_none() {
            return Err(GateError::not_found(format!(
                "facility {}",
                permission.facility_id
            )));
        }
        let facility_id = permission.facility_id.clone();
        let credential = self
            .ctx
            .credentials
            .modify(
                credential_id,
                Box::new(move |c: &mut Credential| {
                    c.grant_permission(permission);
                    Ok(())
                }),
            )
            .await?;

        record_audit(
            &self.ctx,
            actor,
            AdminAction::PermissionGranted,
            vec![credential.id.to_string(), facility_id.to_string()],
            None,
        )
        .await?;
        info!(actor = %actor, credential = %credential.id, facility = %facility_id, "permission granted");
        Ok(credential)
    }

    /// Remove the permission for a facility; `NotFound` if there is none
    pub async fn remove_permission(
        &self,
        actor: &SubjectId,
        credential_id: &CredentialId,
        facility_id: &FacilityId,
    ) -> Result<Credential> {
        require_admin(&self.ctx, actor).await?;
        let facility = facility_id.clone();
        let credential = self
            .ctx
            .credentials
            .modify(
                credential_id,
                Box::new(move |c: &mut Credential| match c.remove_permission(&facility) {
                    Some(_) => Ok(()),
                    None => Err(GateError::not_found(format!(
                        "{} has no permission on {facility}",
                        c.id
                    ))),
                }),
            )
            .await?;

        record_audit(
            &self.ctx,
            actor,
            AdminAction::PermissionRemoved,
            vec![credential.id.to_string(), facility_id.to_string()],
            None,
        )
        .await?;
        info!(actor = %actor, credential = %credential.id, facility = %facility_id, "permission removed");
        Ok(credential)
    }
}
