//! The access decision
//!
//! `evaluate` is a pure function of the presented payload, the credential
//! and facility facts, and the current time. The online engine feeds it
//! live records and the offline validator feeds it snapshot records, so the
//! two paths cannot disagree given equivalent state.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! | # | check | reason |
//! |---|-------|--------|
//! | 0 | credential exists | `unknown_credential` |
//! | 1 | signature and binding | `invalid_signature` |
//! | 2 | payload age | `payload_expired` |
//! | 3 | credential active and unexpired | `credential_inactive` |
//! | 3a | facility exists | `unknown_facility` |
//! | 4 | lockdown | `facility_lockdown` |
//! | 5 | permission exists | `no_permission` |
//! | 6 | permission expiry | `permission_expired` |
//! | 7 | time window (`time_limited` only) | `outside_time_window` |
//! | 8 | operating hours | `facility_closed` |
//! | 9 | capacity | `facility_full` |
//!
//! The capacity check here reads a possibly stale occupancy. The caller
//! must still claim the slot atomically before reporting a grant.

use gate_core::{
    AccessLevel, Credential, CredentialId, DenialReason, ExtraRequirement, Facility,
    FacilityPermission, PayloadKey, QrPayload, SubjectId, Timestamp, UtcOffset,
};
use std::time::Duration;

/// Tunables the decision depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    /// Maximum payload age
    pub payload_ttl: Duration,
    /// Campus wall clock used for weekday and time-of-day checks
    pub utc_offset: UtcOffset,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            payload_ttl: Duration::from_secs(60),
            utc_offset: UtcOffset::UTC,
        }
    }
}

/// What the decision needs to know about a credential
#[derive(Debug, Clone)]
pub struct CredentialFacts<'a> {
    pub credential_id: CredentialId,
    pub subject_id: &'a SubjectId,
    pub payload_key: PayloadKey,
    /// Stored integrity hash matches the record
    pub integrity_ok: bool,
    pub active: bool,
    pub expires_at: Timestamp,
    pub access_level: AccessLevel,
    pub permissions: &'a [FacilityPermission],
}

impl<'a> CredentialFacts<'a> {
    /// Facts from a live credential
    pub fn from_credential(credential: &'a Credential) -> Self {
        Self {
            credential_id: credential.id,
            subject_id: &credential.subject_id,
            payload_key: PayloadKey::from_secret(&credential.qr_secret),
            integrity_ok: credential.verify_integrity(),
            active: credential.active,
            expires_at: credential.expires_at,
            access_level: credential.access_level,
            permissions: &credential.permissions,
        }
    }

    fn permission_for(&self, facility: &Facility) -> Option<&'a FacilityPermission> {
        self.permissions
            .iter()
            .find(|p| p.facility_id == facility.id)
    }
}

/// Outcome of `evaluate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every check passed; requirements are for the scanner UI only
    Granted {
        extra_requirements: Vec<ExtraRequirement>,
    },
    Denied(DenialReason),
}

impl Verdict {
    /// Denial reason, if denied
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            Verdict::Granted { .. } => None,
            Verdict::Denied(reason) => Some(*reason),
        }
    }
}

/// Run the ordered checks
pub fn evaluate(
    payload: &QrPayload,
    credential: Option<&CredentialFacts<'_>>,
    facility: Option<&Facility>,
    now: Timestamp,
    policy: &DecisionPolicy,
) -> Verdict {
    use DenialReason::*;

    let Some(credential) = credential else {
        return Verdict::Denied(UnknownCredential);
    };
    let bound = payload.credential_id == credential.credential_id
        && &payload.subject_id == credential.subject_id;
    if !credential.integrity_ok || !bound || !payload.verify(&credential.payload_key) {
        return Verdict::Denied(InvalidSignature);
    }
    if !payload.is_fresh(now, policy.payload_ttl) {
        return Verdict::Denied(PayloadExpired);
    }
    if !credential.active || now >= credential.expires_at {
        return Verdict::Denied(CredentialInactive);
    }

    let Some(facility) = facility else {
        return Verdict::Denied(UnknownFacility);
    };
    if facility.lockdown.is_active() {
        return Verdict::Denied(FacilityLockdown);
    }
    let Some(permission) = credential.permission_for(facility) else {
        return Verdict::Denied(NoPermission);
    };
    if permission.is_expired(now) {
        return Verdict::Denied(PermissionExpired);
    }
    let local = now.to_local(policy.utc_offset);
    if !permission.admits_time(local) {
        return Verdict::Denied(OutsideTimeWindow);
    }
    if !facility.is_open_at(local) {
        return Verdict::Denied(FacilityClosed);
    }
    if facility.is_full() {
        return Verdict::Denied(FacilityFull);
    }

    Verdict::Granted {
        extra_requirements: facility.requirements_for(credential.access_level).to_vec(),
    }
}
