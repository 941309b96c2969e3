//! Access validation engine
//!
//! One call per physical scan. The engine gathers the facts, runs
//! [`evaluate`], claims a capacity slot atomically on grant, and writes
//! exactly one `AccessLogEntry`. Any storage failure on the way denies with
//! `system_unavailable`; the engine never fails open.
//!
//! If the live log rejects the write, the entry is kept in a process-local
//! fallback buffer so it can be reconciled later. A grant whose entry could
//! not be logged is withdrawn (its slot released) and reported as
//! `system_unavailable`, so nothing is admitted without an audit record.

use gate_core::effects::SlotClaim;
use gate_core::{
    AccessLogEntry, AccessResult, DenialClass, DenialReason, DeviceInfo, EmergencyOverride,
    EntryId, ExtraRequirement, Facility, FacilityId, LockdownState, QrPayload, Result,
    SecurityFlag, Timestamp,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::GateContext;
use crate::decision::{evaluate, CredentialFacts, DecisionPolicy, Verdict};

/// Engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnginePolicy {
    pub decision: DecisionPolicy,
    /// Trailing window for attempt numbering
    pub attempt_window: Duration,
    /// Attempt number at which `high_attempt_rate` is flagged
    pub high_attempt_threshold: u32,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            decision: DecisionPolicy::default(),
            attempt_window: Duration::from_secs(300),
            high_attempt_threshold: 5,
        }
    }
}

/// One scan presented at a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub qr_payload: String,
    pub facility_id: FacilityId,
    pub device: DeviceInfo,
}

/// Result of a validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_class: Option<DenialClass>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_requirements: Vec<ExtraRequirement>,
    pub attempt_number: u32,
    pub entry_id: EntryId,
}

impl Decision {
    /// Decision reported for a log entry
    pub fn from_entry(entry: &AccessLogEntry) -> Self {
        Self {
            granted: entry.is_granted(),
            reason: entry.denial_reason,
            reason_class: entry.denial_reason.map(|r| r.class()),
            extra_requirements: entry.extra_requirements.clone(),
            attempt_number: entry.attempt_number,
            entry_id: entry.id,
        }
    }
}

/// Flags known when an entry is written
pub fn write_time_flags(
    reason: Option<DenialReason>,
    attempt_number: u32,
    high_attempt_threshold: u32,
    offline: bool,
) -> BTreeSet<SecurityFlag> {
    let mut flags = BTreeSet::new();
    match reason {
        Some(
            DenialReason::MalformedPayload
            | DenialReason::UnknownCredential
            | DenialReason::InvalidSignature,
        ) => {
            flags.insert(SecurityFlag::TamperedPayload);
        }
        Some(DenialReason::FacilityLockdown) => {
            flags.insert(SecurityFlag::LockdownAttempt);
        }
        Some(DenialReason::SystemUnavailable) => {
            flags.insert(SecurityFlag::FailClosed);
        }
        _ => {}
    }
    if high_attempt_threshold > 0 && attempt_number >= high_attempt_threshold {
        flags.insert(SecurityFlag::HighAttemptRate);
    }
    if offline {
        flags.insert(SecurityFlag::OfflineDecision);
    }
    flags
}

/// Override recorded on entries denied by lockdown
pub fn lockdown_override(facility: Option<&Facility>) -> Option<EmergencyOverride> {
    match facility.map(|f| &f.lockdown) {
        Some(LockdownState::Lockdown {
            reason,
            activated_by,
            ..
        }) => Some(EmergencyOverride {
            actor: activated_by.clone(),
            reason: reason.clone(),
        }),
        _ => None,
    }
}

/// Validates scans against live state
#[derive(Debug)]
pub struct ValidationEngine {
    ctx: GateContext,
    policy: EnginePolicy,
    fallback: Mutex<Vec<AccessLogEntry>>,
}

impl ValidationEngine {
    pub fn new(ctx: GateContext, policy: EnginePolicy) -> Self {
        Self {
            ctx,
            policy,
            fallback: Mutex::new(Vec::new()),
        }
    }

    /// Engine settings
    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    /// Decide one scan and log it
    pub async fn validate(&self, request: AccessRequest) -> Decision {
        let clock = self.ctx.now().await;
        let now = clock.as_ref().copied().unwrap_or_default();
        let mut entry = self.blank_entry(&request, now).await;

        let payload = match QrPayload::decode(&request.qr_payload) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, facility = %request.facility_id, "undecodable payload");
                self.deny(&mut entry, DenialReason::MalformedPayload, None);
                return self.commit(entry, false).await;
            }
        };
        entry.subject_id = Some(payload.subject_id.clone());
        entry.credential_id = Some(payload.credential_id);
        entry.qr_nonce = Some(payload.nonce.clone());

        if let Err(error) = clock {
            warn!(%error, "clock unavailable, failing closed");
            self.deny(&mut entry, DenialReason::SystemUnavailable, None);
            return self.commit(entry, false).await;
        }

        let facts = match self.load(&payload, &request.facility_id, now).await {
            Ok(facts) => facts,
            Err(error) => {
                warn!(%error, facility = %request.facility_id, "storage unavailable, failing closed");
                self.deny(&mut entry, DenialReason::SystemUnavailable, None);
                return self.commit(entry, false).await;
            }
        };
        let (prior, credential, facility) = facts;
        entry.attempt_number = prior.saturating_add(1);

        let credential_facts = credential.as_ref().map(CredentialFacts::from_credential);
        let verdict = evaluate(
            &payload,
            credential_facts.as_ref(),
            facility.as_ref(),
            now,
            &self.policy.decision,
        );

        match verdict {
            Verdict::Denied(reason) => {
                self.deny(&mut entry, reason, facility.as_ref());
                self.commit(entry, false).await
            }
            Verdict::Granted { extra_requirements } => {
                match self.ctx.facilities.try_claim_slot(&request.facility_id).await {
                    Ok(SlotClaim::Claimed { occupancy }) => {
                        debug!(facility = %request.facility_id, occupancy, "slot claimed");
                        entry.result = AccessResult::Granted;
                        entry.extra_requirements = extra_requirements;
                        self.finish_flags(&mut entry);
                        self.commit(entry, true).await
                    }
                    Ok(SlotClaim::Full) => {
                        self.deny(&mut entry, DenialReason::FacilityFull, None);
                        self.commit(entry, false).await
                    }
                    Ok(SlotClaim::NotFound) => {
                        self.deny(&mut entry, DenialReason::UnknownFacility, None);
                        self.commit(entry, false).await
                    }
                    Err(error) => {
                        warn!(%error, facility = %request.facility_id, "slot claim failed, failing closed");
                        self.deny(&mut entry, DenialReason::SystemUnavailable, None);
                        self.commit(entry, false).await
                    }
                }
            }
        }
    }

    /// Hand over entries whose live write failed
    pub fn drain_fallback(&self) -> Vec<AccessLogEntry> {
        std::mem::take(&mut *self.fallback.lock())
    }

    /// Entries waiting in the fallback buffer
    pub fn fallback_len(&self) -> usize {
        self.fallback.lock().len()
    }

    /// Put back entries that could not be reconciled yet
    pub fn requeue_fallback(&self, entries: impl IntoIterator<Item = AccessLogEntry>) {
        self.fallback.lock().extend(entries);
    }

    async fn load(
        &self,
        payload: &QrPayload,
        facility_id: &FacilityId,
        now: Timestamp,
    ) -> Result<(u32, Option<gate_core::Credential>, Option<Facility>)> {
        let since = now.saturating_sub(self.policy.attempt_window);
        let prior = self
            .ctx
            .access_log
            .count_attempts(&payload.subject_id, facility_id, since)
            .await?;
        let credential = self.ctx.credentials.get(&payload.credential_id).await?;
        let facility = self.ctx.facilities.get(facility_id).await?;
        Ok((prior, credential, facility))
    }

    async fn blank_entry(&self, request: &AccessRequest, now: Timestamp) -> AccessLogEntry {
        AccessLogEntry {
            id: self.ctx.next_entry_id().await,
            subject_id: None,
            credential_id: None,
            facility_id: request.facility_id.clone(),
            timestamp: now,
            result: AccessResult::Denied,
            denial_reason: None,
            device: request.device.clone(),
            qr_nonce: None,
            attempt_number: 1,
            security_flags: BTreeSet::new(),
            emergency_override: None,
            extra_requirements: Vec::new(),
            offline: false,
            recorded_at: now,
        }
    }

    fn deny(&self, entry: &mut AccessLogEntry, reason: DenialReason, facility: Option<&Facility>) {
        entry.result = AccessResult::Denied;
        entry.denial_reason = Some(reason);
        entry.extra_requirements.clear();
        if reason == DenialReason::FacilityLockdown {
            entry.emergency_override = lockdown_override(facility);
        }
        self.finish_flags(entry);
    }

    fn finish_flags(&self, entry: &mut AccessLogEntry) {
        entry.security_flags = write_time_flags(
            entry.denial_reason,
            entry.attempt_number,
            self.policy.high_attempt_threshold,
            false,
        );
    }

    /// Write the entry; on failure buffer it and withdraw a grant
    async fn commit(&self, mut entry: AccessLogEntry, slot_claimed: bool) -> Decision {
        if let Err(error) = self.ctx.access_log.append(entry.clone()).await {
            warn!(%error, entry = %entry.id, "access log unavailable, buffering entry");
            if slot_claimed {
                if let Err(error) = self.ctx.facilities.release_slot(&entry.facility_id).await {
                    warn!(%error, facility = %entry.facility_id, "could not release withdrawn slot");
                }
                self.deny(&mut entry, DenialReason::SystemUnavailable, None);
            }
            self.fallback.lock().push(entry.clone());
        }
        self.trace(&entry);
        Decision::from_entry(&entry)
    }

    fn trace(&self, entry: &AccessLogEntry) {
        let subject = entry.subject_id.as_ref().map(ToString::to_string);
        match entry.denial_reason {
            None => info!(
                facility = %entry.facility_id,
                subject = ?subject,
                device = %entry.device.device_id,
                attempt = entry.attempt_number,
                "access granted"
            ),
            Some(reason) if reason.class() == DenialClass::Integrity => warn!(
                facility = %entry.facility_id,
                subject = ?subject,
                device = %entry.device.device_id,
                reason = reason.as_str(),
                "access denied"
            ),
            Some(reason) => debug!(
                facility = %entry.facility_id,
                subject = ?subject,
                reason = reason.as_str(),
                "access denied"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuance::{IssuancePolicy, IssuanceService, IssuedCredential};
    use crate::lockdown::LockdownController;
    use crate::test_support::Harness;
    use gate_core::effects::{AccessLogStore, FacilityStore};
    use gate_core::AccessLogFilter;
    use gate_testkit::fixtures::{device, facility_id, subject_id};
    use gate_testkit::{FailingAccessLog, UnavailableStore};
    use std::sync::Arc;

    async fn issue(h: &Harness, subject: &str) -> IssuedCredential {
        IssuanceService::new(h.ctx.clone(), IssuancePolicy::default())
            .issue(&subject_id(subject))
            .await
            .unwrap()
    }

    fn request(payload: &str, facility: &str) -> AccessRequest {
        AccessRequest {
            qr_payload: payload.to_string(),
            facility_id: facility_id(facility),
            device: device("door-1"),
        }
    }

    #[tokio::test]
    async fn grant_claims_slot_and_logs_once() {
        let log = Arc::new(gate_effects::MemoryAccessLog::new());
        let h = Harness::with_access_log(log.clone()).await;
        let issued = issue(&h, "s-1").await;
        let engine = ValidationEngine::new(h.ctx.clone(), EnginePolicy::default());

        let decision = engine.validate(request(&issued.qr_payload, "LAB")).await;
        assert!(decision.granted, "{decision:?}");
        assert_eq!(decision.extra_requirements, vec![ExtraRequirement::SafetyTraining]);
        assert_eq!(
            h.facilities.get(&facility_id("LAB")).await.unwrap().unwrap().current_occupancy,
            1
        );
        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, decision.entry_id);
        assert_eq!(entries[0].credential_id, Some(issued.credential_id));
    }

    #[tokio::test]
    async fn malformed_payload_is_logged_and_flagged() {
        let log = Arc::new(gate_effects::MemoryAccessLog::new());
        let h = Harness::with_access_log(log.clone()).await;
        let engine = ValidationEngine::new(h.ctx.clone(), EnginePolicy::default());

        let decision = engine.validate(request("!!not-a-payload!!", "LIB")).await;
        assert_eq!(decision.reason, Some(DenialReason::MalformedPayload));
        assert_eq!(decision.reason_class, Some(DenialClass::Integrity));
        let entries = log.snapshot();
        assert!(entries[0].security_flags.contains(&SecurityFlag::TamperedPayload));
        assert!(entries[0].subject_id.is_none());
    }

    #[tokio::test]
    async fn lockdown_denial_records_override() {
        let log = Arc::new(gate_effects::MemoryAccessLog::new());
        let h = Harness::with_access_log(log.clone()).await;
        let issued = issue(&h, "st-1").await;
        LockdownController::new(h.ctx.clone())
            .activate(&subject_id("admin-1"), &[facility_id("LIB")], "intruder")
            .await
            .unwrap();
        let engine = ValidationEngine::new(h.ctx.clone(), EnginePolicy::default());

        let decision = engine.validate(request(&issued.qr_payload, "LIB")).await;
        assert_eq!(decision.reason, Some(DenialReason::FacilityLockdown));
        let entry = &log.snapshot()[0];
        assert!(entry.security_flags.contains(&SecurityFlag::LockdownAttempt));
        assert_eq!(
            entry.emergency_override,
            Some(EmergencyOverride {
                actor: subject_id("admin-1"),
                reason: "intruder".into(),
            })
        );
    }

    #[tokio::test]
    async fn attempts_are_numbered_within_window() {
        let log = Arc::new(gate_effects::MemoryAccessLog::new());
        let h = Harness::with_access_log(log.clone()).await;
        let issued = issue(&h, "s-1").await;
        let engine = ValidationEngine::new(
            h.ctx.clone(),
            EnginePolicy {
                high_attempt_threshold: 3,
                ..EnginePolicy::default()
            },
        );

        let mut last = None;
        for _ in 0..3 {
            last = Some(engine.validate(request(&issued.qr_payload, "LIB")).await);
        }
        let last = last.unwrap();
        assert_eq!(last.attempt_number, 3);
        let flagged = log
            .query(&AccessLogFilter {
                limit: 10,
                ..AccessLogFilter::default()
            })
            .await
            .unwrap()
            .items
            .into_iter()
            .filter(|e| e.security_flags.contains(&SecurityFlag::HighAttemptRate))
            .count();
        assert_eq!(flagged, 1);

        h.clock.advance(Duration::from_secs(301));
        let fresh = issue(&h, "s-1").await;
        assert_eq!(engine.validate(request(&fresh.qr_payload, "LIB")).await.attempt_number, 1);
    }

    #[tokio::test]
    async fn storage_outage_fails_closed() {
        let h = Harness::new().await;
        let issued = issue(&h, "s-1").await;
        let mut ctx = h.ctx.clone();
        ctx.credentials = Arc::new(UnavailableStore);
        let engine = ValidationEngine::new(ctx, EnginePolicy::default());

        let decision = engine.validate(request(&issued.qr_payload, "LIB")).await;
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenialReason::SystemUnavailable));
    }

    #[tokio::test]
    async fn unloggable_grant_is_withdrawn_and_buffered() {
        let log = Arc::new(FailingAccessLog::failing());
        let h = Harness::with_access_log(log.clone()).await;
        let issued = issue(&h, "s-1").await;
        let engine = ValidationEngine::new(h.ctx.clone(), EnginePolicy::default());

        let decision = engine.validate(request(&issued.qr_payload, "LAB")).await;
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenialReason::SystemUnavailable));
        assert_eq!(
            h.facilities.get(&facility_id("LAB")).await.unwrap().unwrap().current_occupancy,
            0
        );
        assert_eq!(engine.fallback_len(), 1);
        let buffered = engine.drain_fallback();
        assert!(buffered[0].security_flags.contains(&SecurityFlag::FailClosed));
        assert_eq!(engine.fallback_len(), 0);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn flags_for_offline_lockdown_attempt() {
        let flags = write_time_flags(Some(DenialReason::FacilityLockdown), 6, 5, true);
        assert_eq!(
            flags,
            BTreeSet::from([
                SecurityFlag::LockdownAttempt,
                SecurityFlag::HighAttemptRate,
                SecurityFlag::OfflineDecision,
            ])
        );
    }
}
