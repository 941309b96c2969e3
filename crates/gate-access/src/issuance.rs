//! QR issuance service
//!
//! `issue` is idempotent per subject: while the subject holds an active,
//! unexpired credential it is returned with a freshly signed payload. A
//! lapsed credential is retired and replaced; a revoked one blocks issuance
//! until an administrator intervenes. `rotate_secret` swaps the secret, which
//! invalidates every payload signed before it.
//!
//! Every change to a stored credential goes through `CredentialStore::modify`,
//! so a revocation committed mid-operation is never overwritten.

use gate_core::{
    Credential, CredentialId, FacilityPermission, GateError, PayloadKey, QrPayload, QrSecret,
    SubjectId, Timestamp,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::admin::require_self_or_admin;
use crate::context::GateContext;
use crate::error::{IssuanceError, IssuanceResult};

/// Issuance settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    /// How long a signed payload is accepted
    pub payload_ttl: Duration,
    /// Lifetime of a newly created credential
    pub credential_validity: Duration,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            payload_ttl: Duration::from_secs(60),
            credential_validity: Duration::from_secs(365 * 24 * 3_600),
        }
    }
}

/// A credential with a freshly signed payload
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    #[serde(skip)]
    pub credential: Credential,
    /// Encoded payload to render as a QR code
    pub qr_payload: String,
    pub credential_id: CredentialId,
    pub access_level: gate_core::AccessLevel,
    pub permissions: Vec<FacilityPermission>,
    /// Credential expiry
    pub expires_at: Timestamp,
    /// Payload expiry
    pub payload_expires_at: Timestamp,
}

/// Issues credentials and signs payloads
#[derive(Debug, Clone)]
pub struct IssuanceService {
    ctx: GateContext,
    policy: IssuancePolicy,
}

impl IssuanceService {
    pub fn new(ctx: GateContext, policy: IssuancePolicy) -> Self {
        Self { ctx, policy }
    }

    /// `issue` on behalf of `actor`, who must be the subject or an admin
    pub async fn issue_as(
        &self,
        actor: &SubjectId,
        subject_id: &SubjectId,
    ) -> IssuanceResult<IssuedCredential> {
        require_self_or_admin(&self.ctx, actor, subject_id).await?;
        self.issue(subject_id).await
    }

    /// `rotate_secret` on behalf of `actor`, who must own the credential or be an admin
    pub async fn rotate_secret_as(
        &self,
        actor: &SubjectId,
        credential_id: &CredentialId,
    ) -> IssuanceResult<IssuedCredential> {
        let credential = self.load(credential_id).await?;
        require_self_or_admin(&self.ctx, actor, &credential.subject_id).await?;
        self.rotate_secret(credential_id).await
    }

    /// Return the subject's active credential, creating one if needed
    pub async fn issue(&self, subject_id: &SubjectId) -> IssuanceResult<IssuedCredential> {
        let profile = self
            .ctx
            .identity
            .lookup_subject(subject_id)
            .await?
            .ok_or_else(|| IssuanceError::SubjectNotFound(subject_id.clone()))?;
        let now = self.ctx.now().await?;

        let credential = match self.ctx.credentials.latest_for_subject(subject_id).await? {
            Some(existing) if existing.is_revoked() => {
                return Err(IssuanceError::CredentialInactive(existing.id));
            }
            Some(existing) if existing.is_valid(now) => {
                if existing.access_level == profile.role {
                    debug!(subject = %subject_id, credential = %existing.id, "reusing active credential");
                    existing
                } else {
                    let role = profile.role;
                    let synced = self
                        .ctx
                        .credentials
                        .modify(
                            &existing.id,
                            Box::new(move |c: &mut Credential| {
                                c.set_access_level(role);
                                Ok(())
                            }),
                        )
                        .await
                        .map_err(inactive_on_conflict(existing.id))?;
                    info!(subject = %subject_id, level = role.as_str(), "access level synced");
                    synced
                }
            }
            Some(lapsed) => {
                if lapsed.active {
                    self.ctx
                        .credentials
                        .modify(
                            &lapsed.id,
                            Box::new(|c: &mut Credential| {
                                c.retire();
                                Ok(())
                            }),
                        )
                        .await
                        .map_err(inactive_on_conflict(lapsed.id))?;
                    info!(subject = %subject_id, credential = %lapsed.id, "expired credential retired");
                }
                self.create_or_join(&profile.subject_id, profile.role, now).await?
            }
            None => self.create_or_join(&profile.subject_id, profile.role, now).await?,
        };

        self.sign(credential, now).await
    }

    /// Replace the secret of an active credential
    pub async fn rotate_secret(&self, credential_id: &CredentialId) -> IssuanceResult<IssuedCredential> {
        let credential = self.load(credential_id).await?;
        let now = self.ctx.now().await?;
        if !credential.is_valid(now) {
            return Err(IssuanceError::CredentialInactive(credential.id));
        }

        let secret = QrSecret::from_bytes(self.ctx.random.random_bytes_32().await);
        let credential = self
            .ctx
            .credentials
            .modify(
                credential_id,
                Box::new(move |c: &mut Credential| {
                    if !c.is_valid(now) {
                        return Err(GateError::conflict(format!("{} is inactive", c.id)));
                    }
                    c.rotate_secret(secret, now);
                    Ok(())
                }),
            )
            .await
            .map_err(inactive_on_conflict(*credential_id))?;
        info!(credential = %credential.id, subject = %credential.subject_id, "secret rotated");
        self.sign(credential, now).await
    }

    async fn load(&self, credential_id: &CredentialId) -> IssuanceResult<Credential> {
        Ok(self
            .ctx
            .credentials
            .get(credential_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("{credential_id}")))?)
    }

    /// Create a credential, or adopt the one a concurrent `issue` just created
    async fn create_or_join(
        &self,
        subject_id: &SubjectId,
        level: gate_core::AccessLevel,
        now: Timestamp,
    ) -> IssuanceResult<Credential> {
        match self.create(subject_id, level, now).await {
            Err(IssuanceError::Gate(GateError::Conflict { message })) => {
                let winner = self
                    .ctx
                    .credentials
                    .active_for_subject(subject_id)
                    .await?
                    .ok_or_else(|| GateError::conflict(message))?;
                debug!(subject = %subject_id, credential = %winner.id, "joined concurrent issuance");
                Ok(winner)
            }
            other => other,
        }
    }

    async fn create(
        &self,
        subject_id: &SubjectId,
        level: gate_core::AccessLevel,
        now: Timestamp,
    ) -> IssuanceResult<Credential> {
        let permissions: Vec<FacilityPermission> = self
            .ctx
            .facilities
            .list()
            .await?
            .into_iter()
            .filter_map(|facility| {
                facility.rule_for(level).map(|rule| FacilityPermission {
                    facility_id: facility.id.clone(),
                    access_type: rule.access_type,
                    time_restriction: rule.time_restriction.clone(),
                    expires_at: None,
                })
            })
            .collect();

        let credential = Credential::new(
            CredentialId::from_entropy(self.ctx.random.random_bytes_16().await),
            subject_id.clone(),
            QrSecret::from_bytes(self.ctx.random.random_bytes_32().await),
            level,
            permissions,
            now,
            self.policy.credential_validity,
        );
        let credential = self.ctx.credentials.insert(credential).await?;
        info!(
            subject = %subject_id,
            credential = %credential.id,
            permissions = credential.permissions.len(),
            "credential created"
        );
        Ok(credential)
    }

    async fn sign(&self, credential: Credential, now: Timestamp) -> IssuanceResult<IssuedCredential> {
        let payload = QrPayload::sign(
            &PayloadKey::from_secret(&credential.qr_secret),
            credential.id,
            credential.subject_id.clone(),
            now,
            self.ctx.next_nonce().await,
        );
        Ok(IssuedCredential {
            qr_payload: payload.encode()?,
            credential_id: credential.id,
            access_level: credential.access_level,
            permissions: credential.permissions.clone(),
            expires_at: credential.expires_at,
            payload_expires_at: payload.expires_at(self.policy.payload_ttl),
            credential,
        })
    }
}

/// A `Conflict` from the store means the credential was revoked or retired underneath us
fn inactive_on_conflict(id: CredentialId) -> impl FnOnce(GateError) -> IssuanceError {
    move |err| match err {
        GateError::Conflict { .. } => IssuanceError::CredentialInactive(id),
        other => other.into(),
    }
}
