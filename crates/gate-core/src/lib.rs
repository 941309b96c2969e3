//! Campus Gate Core - access control foundation
//!
//! This crate provides the pure types and effect interfaces shared by every
//! other Campus Gate crate. It contains no storage, networking or clock
//! implementations; those live in `gate-effects` and `gate-testkit`.
//!
//! # Contents
//!
//! ## Domain Types
//! - `Credential` / `FacilityPermission`: a subject's durable right to request access
//! - `Facility`: a protected resource with role rules, hours, capacity and lockdown state
//! - `QrPayload`: short-lived signed bearer proof bound to a credential
//! - `AccessLogEntry` / `AdminAuditEvent`: append-only audit records
//!
//! ## Effect Interfaces
//! - `PhysicalTimeEffects`, `RandomEffects`: ambient time and entropy
//! - `IdentityEffects`, `NotificationEffects`: excluded collaborators
//! - `CredentialStore`, `FacilityStore`, `AccessLogStore`, `AdminAuditStore`: persistence

#![forbid(unsafe_code)]

/// Access log entries, denial reasons and administrative audit events
pub mod access_log;

/// Configuration validation helpers
pub mod config;

/// Credentials and per-facility permissions
pub mod credential;

/// Effect and storage interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Facilities, role rules, operating hours and lockdown state
pub mod facility;

/// SHA-256 digests
pub mod hash;

/// Subject, credential, facility and device identifiers
pub mod identifiers;

/// Signed QR payloads
pub mod qr;

/// Timestamps and campus wall-clock time
pub mod time;

pub use access_log::{
    AccessLogEntry, AccessLogFilter, AccessResult, AdminAction, AdminAuditEvent, DenialClass,
    DenialReason, DeviceInfo, EmergencyOverride, Page, ScannerType, SecurityFlag, SyncKey,
};
pub use credential::{AccessLevel, AccessType, Credential, FacilityPermission, TimeRestriction};
pub use errors::{GateError, Result};
pub use facility::{
    DayHours, ExtraRequirement, Facility, LockdownState, OperatingHours, RoleRequirement,
};
pub use identifiers::{
    CredentialId, DeviceId, EntryId, FacilityId, Nonce, QrSecret, SnapshotId, SubjectId,
};
pub use qr::{PayloadKey, QrPayload};
pub use time::{ClockTime, DayOfWeek, LocalMoment, Timestamp, UtcOffset};
