//! Offline validation
//!
//! [`OfflineValidator`] is the stateless core: snapshot checks first
//! (expired, then signature and scope), then the same [`evaluate`] the
//! online engine runs, fed from snapshot records. [`OfflineScanner`] is the
//! device model around it: it owns a verified snapshot, numbers attempts
//! from its own buffer, tracks local occupancy, and hands buffered entries
//! over for sync.

use gate_access::engine::{lockdown_override, write_time_flags};
use gate_access::{evaluate, AccessRequest, Decision, Verdict};
use gate_core::effects::{PhysicalTimeEffects, RandomEffects};
use gate_core::{
    AccessLogEntry, AccessResult, DenialReason, DeviceInfo, EntryId, Facility, FacilityId,
    GateError, QrPayload, Result, SubjectId, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::signing::SnapshotVerifier;
use crate::snapshot::OfflineCacheSnapshot;

/// Device-local inputs to one offline decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContext {
    pub now: Timestamp,
    pub entry_id: EntryId,
    /// Prior attempts by the same subject at the same facility in the window
    pub prior_attempts: u32,
    /// Device-local occupancy replacing the snapshot's figure
    pub local_occupancy: Option<u32>,
}

/// Stateless offline decision against a snapshot
#[derive(Debug, Clone)]
pub struct OfflineValidator {
    verifier: SnapshotVerifier,
}

impl OfflineValidator {
    pub fn new(verifier: SnapshotVerifier) -> Self {
        Self { verifier }
    }

    /// Decide one scan; the returned entry is for the device buffer
    pub fn validate(
        &self,
        request: &AccessRequest,
        snapshot: &OfflineCacheSnapshot,
        scan: &ScanContext,
    ) -> AccessLogEntry {
        let rules = snapshot.body.rules;
        let mut entry = AccessLogEntry {
            id: scan.entry_id,
            subject_id: None,
            credential_id: None,
            facility_id: request.facility_id.clone(),
            timestamp: scan.now,
            result: AccessResult::Denied,
            denial_reason: None,
            device: request.device.clone(),
            qr_nonce: None,
            attempt_number: scan.prior_attempts.saturating_add(1),
            security_flags: BTreeSet::new(),
            emergency_override: None,
            extra_requirements: Vec::new(),
            offline: true,
            recorded_at: scan.now,
        };

        let payload = QrPayload::decode(&request.qr_payload).ok();
        if let Some(payload) = &payload {
            entry.subject_id = Some(payload.subject_id.clone());
            entry.credential_id = Some(payload.credential_id);
            entry.qr_nonce = Some(payload.nonce.clone());
        }

        let verdict = self.decide(request, snapshot, scan, payload.as_ref());
        let facility = snapshot.facility(&request.facility_id);
        match verdict {
            Verdict::Granted { extra_requirements } => {
                entry.result = AccessResult::Granted;
                entry.extra_requirements = extra_requirements;
            }
            Verdict::Denied(reason) => {
                entry.denial_reason = Some(reason);
                if reason == DenialReason::FacilityLockdown {
                    entry.emergency_override = lockdown_override(facility);
                }
            }
        }
        entry.security_flags = write_time_flags(
            entry.denial_reason,
            entry.attempt_number,
            rules.high_attempt_threshold,
            true,
        );
        entry
    }

    fn decide(
        &self,
        request: &AccessRequest,
        snapshot: &OfflineCacheSnapshot,
        scan: &ScanContext,
        payload: Option<&QrPayload>,
    ) -> Verdict {
        if snapshot.is_expired(scan.now) {
            return Verdict::Denied(DenialReason::SnapshotExpired);
        }
        if !snapshot.verify(&self.verifier) || !snapshot.body.scope.contains(&request.facility_id) {
            return Verdict::Denied(DenialReason::SnapshotInvalid);
        }
        let Some(payload) = payload else {
            return Verdict::Denied(DenialReason::MalformedPayload);
        };

        let record = snapshot.credential(&payload.credential_id);
        if let Some(record) = record {
            if !record.verify(&self.verifier) {
                return Verdict::Denied(DenialReason::SnapshotInvalid);
            }
        }
        let facts = match record.map(|r| r.facts()).transpose() {
            Ok(facts) => facts,
            Err(_) => return Verdict::Denied(DenialReason::SnapshotInvalid),
        };

        let facility: Option<Facility> = snapshot.facility(&request.facility_id).map(|f| {
            let mut local = f.clone();
            if let Some(occupancy) = scan.local_occupancy {
                local.current_occupancy = occupancy;
            }
            local
        });
        evaluate(
            payload,
            facts.as_ref(),
            facility.as_ref(),
            scan.now,
            &snapshot.body.rules.decision_policy(),
        )
    }
}

/// A disconnected scanner: snapshot, local counters and entry buffer
pub struct OfflineScanner {
    device: DeviceInfo,
    validator: OfflineValidator,
    clock: Arc<dyn PhysicalTimeEffects>,
    random: Arc<dyn RandomEffects>,
    snapshot: Option<OfflineCacheSnapshot>,
    occupancy: BTreeMap<FacilityId, u32>,
    buffer: Vec<AccessLogEntry>,
}

impl OfflineScanner {
    pub fn new(
        device: DeviceInfo,
        verifier: SnapshotVerifier,
        clock: Arc<dyn PhysicalTimeEffects>,
        random: Arc<dyn RandomEffects>,
    ) -> Self {
        Self {
            device,
            validator: OfflineValidator::new(verifier),
            clock,
            random,
            snapshot: None,
            occupancy: BTreeMap::new(),
            buffer: Vec::new(),
        }
    }

    /// Replace the cached snapshot; rejected unless its signature verifies
    pub fn install(&mut self, snapshot: OfflineCacheSnapshot) -> Result<()> {
        if !snapshot.verify(&self.validator.verifier) {
            warn!(device = %self.device.device_id, snapshot = %snapshot.body.id, "rejected unsigned snapshot");
            return Err(GateError::crypto("snapshot signature does not verify"));
        }
        self.occupancy = snapshot
            .body
            .facilities
            .iter()
            .map(|f| (f.id.clone(), f.current_occupancy))
            .collect();
        info!(
            device = %self.device.device_id,
            snapshot = %snapshot.body.id,
            expires_at = snapshot.body.expires_at.as_millis(),
            "snapshot installed"
        );
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Installed snapshot
    pub fn snapshot(&self) -> Option<&OfflineCacheSnapshot> {
        self.snapshot.as_ref()
    }

    /// Decide a scan at `facility_id` and buffer the entry
    pub async fn scan(&mut self, qr_payload: &str, facility_id: &FacilityId) -> Result<Decision> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| GateError::invalid("no snapshot installed; scanner must refuse access"))?;
        let now = self.clock.physical_time().await?;
        let request = AccessRequest {
            qr_payload: qr_payload.to_string(),
            facility_id: facility_id.clone(),
            device: self.device.clone(),
        };

        let window = Duration::from_secs(snapshot.body.rules.attempt_window_secs);
        let subject = QrPayload::decode(qr_payload).ok().map(|p| p.subject_id);
        let scan = ScanContext {
            now,
            entry_id: EntryId::from_entropy(self.random.random_bytes_16().await),
            prior_attempts: self.prior_attempts(subject.as_ref(), facility_id, now.saturating_sub(window)),
            local_occupancy: self.occupancy.get(facility_id).copied(),
        };
        let entry = self.validator.validate(&request, snapshot, &scan);

        if entry.is_granted() {
            if let Some(occupancy) = self.occupancy.get_mut(facility_id) {
                *occupancy = occupancy.saturating_add(1);
            }
        }
        debug!(
            device = %self.device.device_id,
            facility = %facility_id,
            granted = entry.is_granted(),
            reason = ?entry.denial_reason.map(|r| r.as_str()),
            "offline decision"
        );
        let decision = Decision::from_entry(&entry);
        self.buffer.push(entry);
        Ok(decision)
    }

    /// Someone left; local occupancy drops by one, never below zero
    pub fn record_exit(&mut self, facility_id: &FacilityId) -> u32 {
        match self.occupancy.get_mut(facility_id) {
            Some(occupancy) => {
                *occupancy = occupancy.saturating_sub(1);
                *occupancy
            }
            None => 0,
        }
    }

    /// Device-local occupancy
    pub fn local_occupancy(&self, facility_id: &FacilityId) -> Option<u32> {
        self.occupancy.get(facility_id).copied()
    }

    /// Entries waiting for sync
    pub fn buffered(&self) -> &[AccessLogEntry] {
        &self.buffer
    }

    /// Take every buffered entry for sync
    pub fn drain(&mut self) -> Vec<AccessLogEntry> {
        std::mem::take(&mut self.buffer)
    }

    fn prior_attempts(
        &self,
        subject: Option<&SubjectId>,
        facility_id: &FacilityId,
        since: Timestamp,
    ) -> u32 {
        let Some(subject) = subject else {
            return 0;
        };
        let count = self
            .buffer
            .iter()
            .filter(|e| {
                e.timestamp >= since
                    && &e.facility_id == facility_id
                    && e.subject_id.as_ref() == Some(subject)
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

impl std::fmt::Debug for OfflineScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineScanner")
            .field("device", &self.device.device_id)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
