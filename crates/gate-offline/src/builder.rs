//! Offline cache builder

use gate_access::{EnginePolicy, GateContext};
use gate_core::{Credential, FacilityId, GateError, PayloadKey, Result, SnapshotId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::signing::SnapshotSigner;
use crate::snapshot::{CredentialRecord, OfflineCacheSnapshot, SnapshotBody, SnapshotRules};

/// Snapshot lifetime settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPolicy {
    /// TTL when the caller does not ask for one
    pub default_ttl: Duration,
    /// Requested TTLs are clamped to this
    pub max_ttl: Duration,
    /// Decision settings pinned into every snapshot
    pub engine: EnginePolicy,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            max_ttl: Duration::from_secs(3_600),
            engine: EnginePolicy::default(),
        }
    }
}

impl SnapshotPolicy {
    fn rules(&self) -> SnapshotRules {
        SnapshotRules {
            payload_ttl_secs: self.engine.decision.payload_ttl.as_secs(),
            utc_offset_minutes: self.engine.decision.utc_offset.minutes(),
            attempt_window_secs: self.engine.attempt_window.as_secs(),
            high_attempt_threshold: self.engine.high_attempt_threshold,
        }
    }
}

/// Builds signed snapshots from live state
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    ctx: GateContext,
    signer: Arc<SnapshotSigner>,
    policy: SnapshotPolicy,
}

impl SnapshotBuilder {
    pub fn new(ctx: GateContext, signer: Arc<SnapshotSigner>, policy: SnapshotPolicy) -> Self {
        Self {
            ctx,
            signer,
            policy,
        }
    }

    /// Snapshot settings
    pub fn policy(&self) -> &SnapshotPolicy {
        &self.policy
    }

    /// Effect handlers the builder reads from
    pub fn context(&self) -> &GateContext {
        &self.ctx
    }

    /// Export the requested facilities and every credential that can enter them
    ///
    /// Inactive credentials are included so a revoked card is recognised
    /// and denied as inactive rather than unknown.
    pub async fn build(
        &self,
        facility_ids: &[FacilityId],
        ttl: Option<Duration>,
    ) -> Result<OfflineCacheSnapshot> {
        let scope: BTreeSet<FacilityId> = facility_ids.iter().cloned().collect();
        if scope.is_empty() {
            return Err(GateError::invalid("at least one facility id is required"));
        }
        let ttl = self.effective_ttl(ttl)?;

        let mut facilities = Vec::with_capacity(scope.len());
        for id in &scope {
            let facility = self
                .ctx
                .facilities
                .get(id)
                .await?
                .ok_or_else(|| GateError::not_found(format!("facility {id}")))?;
            facilities.push(facility);
        }

        let credentials = self
            .ctx
            .credentials
            .with_permission_on(&scope)
            .await?
            .iter()
            .map(|credential| self.record(credential, &scope))
            .collect::<Result<Vec<_>>>()?;

        let now = self.ctx.now().await?;
        let body = SnapshotBody {
            id: SnapshotId::from_entropy(self.ctx.random.random_bytes_16().await),
            scope,
            facilities,
            credentials,
            rules: self.policy.rules(),
            generated_at: now,
            expires_at: now.saturating_add(ttl),
        };
        let snapshot = OfflineCacheSnapshot::sign(body, &self.signer)?;
        info!(
            snapshot = %snapshot.body.id,
            facilities = snapshot.body.facilities.len(),
            credentials = snapshot.body.credentials.len(),
            ttl_secs = ttl.as_secs(),
            "offline snapshot built"
        );
        Ok(snapshot)
    }

    fn effective_ttl(&self, requested: Option<Duration>) -> Result<Duration> {
        let ttl = requested.unwrap_or(self.policy.default_ttl);
        if ttl.is_zero() {
            return Err(GateError::invalid("snapshot ttl must be positive"));
        }
        if ttl > self.policy.max_ttl {
            debug!(requested_secs = ttl.as_secs(), max_secs = self.policy.max_ttl.as_secs(), "snapshot ttl clamped");
            return Ok(self.policy.max_ttl);
        }
        Ok(ttl)
    }

    fn record(&self, credential: &Credential, scope: &BTreeSet<FacilityId>) -> Result<CredentialRecord> {
        CredentialRecord {
            credential_id: credential.id,
            subject_id: credential.subject_id.clone(),
            secret_hash: PayloadKey::from_secret(&credential.qr_secret).to_hex(),
            access_level: credential.access_level,
            integrity_ok: credential.verify_integrity(),
            active: credential.active,
            expires_at: credential.expires_at,
            permissions: credential
                .permissions
                .iter()
                .filter(|p| scope.contains(&p.facility_id))
                .cloned()
                .collect(),
            signature: String::new(),
        }
        .sign(&self.signer)
    }
}
