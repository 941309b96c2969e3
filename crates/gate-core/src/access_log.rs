//! Access log and administrative audit records
//!
//! Every access decision, online or reconciled from an offline scanner,
//! becomes exactly one `AccessLogEntry`. Entries are immutable once written;
//! the only permitted change is appending `SecurityFlag`s during anomaly
//! scoring. Administrative overrides (lockdown, revocation, permission
//! changes) are recorded separately as `AdminAuditEvent`s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::facility::ExtraRequirement;
use crate::identifiers::{CredentialId, DeviceId, EntryId, FacilityId, Nonce, SubjectId};
use crate::time::Timestamp;

/// Outcome of an access decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessResult {
    Granted,
    Denied,
}

/// Error class of a denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialClass {
    /// Bad signature or tampered data; never retried automatically
    Integrity,
    /// Expired payload, snapshot or permission; fixed by re-issuing or reconnecting
    Freshness,
    /// Administrative rules; fixed by an administrator
    Policy,
    /// Infrastructure failure; the engine failed closed
    System,
}

/// Specific, non-ambiguous reason for a denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    MalformedPayload,
    UnknownCredential,
    InvalidSignature,
    PayloadExpired,
    CredentialInactive,
    UnknownFacility,
    FacilityLockdown,
    NoPermission,
    PermissionExpired,
    OutsideTimeWindow,
    FacilityClosed,
    FacilityFull,
    SystemUnavailable,
    SnapshotExpired,
    SnapshotInvalid,
}

impl DenialReason {
    /// Wire code (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::MalformedPayload => "malformed_payload",
            DenialReason::UnknownCredential => "unknown_credential",
            DenialReason::InvalidSignature => "invalid_signature",
            DenialReason::PayloadExpired => "payload_expired",
            DenialReason::CredentialInactive => "credential_inactive",
            DenialReason::UnknownFacility => "unknown_facility",
            DenialReason::FacilityLockdown => "facility_lockdown",
            DenialReason::NoPermission => "no_permission",
            DenialReason::PermissionExpired => "permission_expired",
            DenialReason::OutsideTimeWindow => "outside_time_window",
            DenialReason::FacilityClosed => "facility_closed",
            DenialReason::FacilityFull => "facility_full",
            DenialReason::SystemUnavailable => "system_unavailable",
            DenialReason::SnapshotExpired => "snapshot_expired",
            DenialReason::SnapshotInvalid => "snapshot_invalid",
        }
    }

    /// Error class used for display and analytics
    pub fn class(&self) -> DenialClass {
        match self {
            DenialReason::MalformedPayload
            | DenialReason::UnknownCredential
            | DenialReason::InvalidSignature
            | DenialReason::SnapshotInvalid => DenialClass::Integrity,
            DenialReason::PayloadExpired
            | DenialReason::CredentialInactive
            | DenialReason::PermissionExpired
            | DenialReason::SnapshotExpired => DenialClass::Freshness,
            DenialReason::UnknownFacility
            | DenialReason::FacilityLockdown
            | DenialReason::NoPermission
            | DenialReason::OutsideTimeWindow
            | DenialReason::FacilityClosed
            | DenialReason::FacilityFull => DenialClass::Policy,
            DenialReason::SystemUnavailable => DenialClass::System,
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scanner hardware class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerType {
    #[default]
    FixedReader,
    Handheld,
    MobileApp,
    Kiosk,
}

/// Where a scan came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: DeviceId,
    #[serde(default)]
    pub scanner_type: ScannerType,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl DeviceInfo {
    /// Device with only an identifier
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            scanner_type: ScannerType::default(),
            ip_address: None,
            location: None,
        }
    }
}

/// Anomaly tag attached to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityFlag {
    /// Payload failed integrity checks
    TamperedPayload,
    /// Attempt against a locked-down facility
    LockdownAttempt,
    /// Attempt number reached the high-rate threshold
    HighAttemptRate,
    /// Decided on a disconnected scanner
    OfflineDecision,
    /// Denied because a dependency was unavailable
    FailClosed,
    /// Part of a repeated-denial incident (appended by the detector)
    RepeatedDenials,
}

/// Emergency override that shaped a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyOverride {
    pub actor: SubjectId,
    pub reason: String,
}

/// Immutable record of one access decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: EntryId,
    pub subject_id: Option<SubjectId>,
    pub credential_id: Option<CredentialId>,
    pub facility_id: FacilityId,
    /// When the decision was made (scanner clock for offline entries)
    pub timestamp: Timestamp,
    pub result: AccessResult,
    pub denial_reason: Option<DenialReason>,
    pub device: DeviceInfo,
    /// Nonce of the QR payload presented
    pub qr_nonce: Option<Nonce>,
    /// 1-based attempt number for (subject, facility) within the trailing window
    pub attempt_number: u32,
    #[serde(default)]
    pub security_flags: BTreeSet<SecurityFlag>,
    #[serde(default)]
    pub emergency_override: Option<EmergencyOverride>,
    #[serde(default)]
    pub extra_requirements: Vec<ExtraRequirement>,
    #[serde(default)]
    pub offline: bool,
    /// When the central log accepted the entry
    pub recorded_at: Timestamp,
}

impl AccessLogEntry {
    /// Whether access was granted
    pub fn is_granted(&self) -> bool {
        self.result == AccessResult::Granted
    }

    /// Composite deduplication key for offline reconciliation
    pub fn sync_key(&self) -> SyncKey {
        SyncKey {
            device_id: self.device.device_id.clone(),
            subject_id: self.subject_id.clone(),
            facility_id: self.facility_id.clone(),
            timestamp: self.timestamp,
            nonce: self.qr_nonce.clone(),
        }
    }
}

/// Deduplication key: device, subject, facility, timestamp, nonce
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncKey {
    pub device_id: DeviceId,
    pub subject_id: Option<SubjectId>,
    pub facility_id: FacilityId,
    pub timestamp: Timestamp,
    pub nonce: Option<Nonce>,
}

/// Filter for audit export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogFilter {
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
    /// Inclusive lower bound
    #[serde(default)]
    pub from: Option<Timestamp>,
    /// Exclusive upper bound
    #[serde(default)]
    pub to: Option<Timestamp>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

impl AccessLogFilter {
    /// Whether an entry satisfies the subject/facility/date filters
    pub fn matches(&self, entry: &AccessLogEntry) -> bool {
        self.subject_id
            .as_ref()
            .map_or(true, |s| entry.subject_id.as_ref() == Some(s))
            && self
                .facility_id
                .as_ref()
                .map_or(true, |f| &entry.facility_id == f)
            && self.from.map_or(true, |from| entry.timestamp >= from)
            && self.to.map_or(true, |to| entry.timestamp < to)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Administrative action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    LockdownActivated,
    LockdownLifted,
    CredentialRevoked,
    PermissionGranted,
    PermissionRemoved,
}

/// Audit record for an administrative override, attributed to an actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAuditEvent {
    pub id: EntryId,
    pub actor: SubjectId,
    pub action: AdminAction,
    /// Facility or credential identifiers affected
    pub targets: Vec<String>,
    pub reason: Option<String>,
    pub at: Timestamp,
}
