//! Digital credentials and per-facility permissions
//!
//! A `Credential` is one subject's durable right to request access. Exactly
//! one credential per subject is active at a time; older ones are kept
//! (inactive) for audit.
//!
//! The integrity hash is a deterministic function of subject, secret, access
//! level and permissions. Every mutator below recomputes it; stores call
//! `seal()` before persisting so a save can never leave it stale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::hash;
use crate::identifiers::{CredentialId, FacilityId, QrSecret, SubjectId};
use crate::time::{within_inclusive, ClockTime, DayOfWeek, LocalMoment, Timestamp};

/// Role-derived access level carried by a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Enrolled member (student or other ordinary subject)
    #[serde(alias = "subject")]
    Student,
    Staff,
    Admin,
    Visitor,
}

impl AccessLevel {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Student => "student",
            AccessLevel::Staff => "staff",
            AccessLevel::Admin => "admin",
            AccessLevel::Visitor => "visitor",
        }
    }
}

/// Kind of access a permission grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Unrestricted entry
    Full,
    /// Entry with extra requirements surfaced to the scanner UI
    Restricted,
    /// Entry only within the permission's time restriction
    TimeLimited,
}

/// Weekday set plus inclusive clock window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRestriction {
    /// Window start (inclusive)
    pub start: ClockTime,
    /// Window end (inclusive); earlier than `start` means the window wraps midnight
    pub end: ClockTime,
    /// Allowed weekdays; empty means every day
    #[serde(default)]
    pub days: BTreeSet<DayOfWeek>,
}

impl TimeRestriction {
    /// Restriction on the given days between `start` and `end`
    pub fn new(start: ClockTime, end: ClockTime, days: impl IntoIterator<Item = DayOfWeek>) -> Self {
        Self {
            start,
            end,
            days: days.into_iter().collect(),
        }
    }

    /// Whether the local moment is inside the window
    pub fn allows(&self, moment: LocalMoment) -> bool {
        let day_ok = self.days.is_empty() || self.days.contains(&moment.day);
        day_ok && within_inclusive(moment.time, self.start, self.end)
    }
}

/// A credential's grant for one facility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityPermission {
    pub facility_id: FacilityId,
    pub access_type: AccessType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restriction: Option<TimeRestriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl FacilityPermission {
    /// Unrestricted, non-expiring permission
    pub fn full(facility_id: FacilityId) -> Self {
        Self {
            facility_id,
            access_type: AccessType::Full,
            time_restriction: None,
            expires_at: None,
        }
    }

    /// Time-limited permission
    pub fn time_limited(facility_id: FacilityId, restriction: TimeRestriction) -> Self {
        Self {
            facility_id,
            access_type: AccessType::TimeLimited,
            time_restriction: Some(restriction),
            expires_at: None,
        }
    }

    /// Set an expiry
    pub fn expiring_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the permission's own expiry has passed
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whether the time restriction admits `moment`
    ///
    /// Only `time_limited` permissions are window-checked; a time-limited
    /// permission without a restriction admits any time.
    pub fn admits_time(&self, moment: LocalMoment) -> bool {
        match (self.access_type, &self.time_restriction) {
            (AccessType::TimeLimited, Some(restriction)) => restriction.allows(moment),
            _ => true,
        }
    }
}

/// A subject's digital credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub subject_id: SubjectId,
    pub qr_secret: QrSecret,
    pub access_level: AccessLevel,
    /// At most one entry per facility, in grant order
    pub permissions: Vec<FacilityPermission>,
    pub active: bool,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    #[serde(default)]
    pub secret_rotated_at: Option<Timestamp>,
    #[serde(default)]
    pub revoked_at: Option<Timestamp>,
    #[serde(default)]
    pub revocation_reason: Option<String>,
    pub integrity_hash: String,
}

impl Credential {
    /// Create a sealed, active credential
    pub fn new(
        id: CredentialId,
        subject_id: SubjectId,
        qr_secret: QrSecret,
        access_level: AccessLevel,
        permissions: Vec<FacilityPermission>,
        issued_at: Timestamp,
        validity: Duration,
    ) -> Self {
        let mut credential = Self {
            id,
            subject_id,
            qr_secret,
            access_level,
            permissions: Vec::new(),
            active: true,
            issued_at,
            expires_at: issued_at.saturating_add(validity),
            secret_rotated_at: None,
            revoked_at: None,
            revocation_reason: None,
            integrity_hash: String::new(),
        };
        for permission in permissions {
            credential.upsert_permission(permission);
        }
        credential.seal();
        credential
    }

    /// Past its expiry at `now`
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Usable for access at `now`
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.active && !self.is_expired(now)
    }

    /// Administratively revoked (as opposed to merely expired)
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Permission for a facility, if any
    pub fn permission_for(&self, facility_id: &FacilityId) -> Option<&FacilityPermission> {
        self.permissions
            .iter()
            .find(|p| &p.facility_id == facility_id)
    }

    /// Whether any permission targets one of `facilities`
    pub fn has_permission_on(&self, facilities: &BTreeSet<FacilityId>) -> bool {
        self.permissions
            .iter()
            .any(|p| facilities.contains(&p.facility_id))
    }

    /// Replace the secret, invalidating every payload signed with the old one
    pub fn rotate_secret(&mut self, secret: QrSecret, now: Timestamp) {
        self.qr_secret = secret;
        self.secret_rotated_at = Some(now);
        self.seal();
    }

    /// Change the access level
    pub fn set_access_level(&mut self, level: AccessLevel) {
        self.access_level = level;
        self.seal();
    }

    /// Add a permission, replacing any existing one for the same facility
    ///
    /// Returns the replaced permission.
    pub fn grant_permission(&mut self, permission: FacilityPermission) -> Option<FacilityPermission> {
        let replaced = self.upsert_permission(permission);
        self.seal();
        replaced
    }

    /// Remove the permission for a facility
    pub fn remove_permission(&mut self, facility_id: &FacilityId) -> Option<FacilityPermission> {
        let index = self
            .permissions
            .iter()
            .position(|p| &p.facility_id == facility_id)?;
        let removed = self.permissions.remove(index);
        self.seal();
        Some(removed)
    }

    /// Deactivate; the record is kept for audit
    pub fn revoke(&mut self, now: Timestamp, reason: impl Into<String>) {
        self.active = false;
        self.revoked_at = Some(now);
        self.revocation_reason = Some(reason.into());
    }

    /// Deactivate because the credential expired
    pub fn retire(&mut self) {
        self.active = false;
    }

    /// Recompute the integrity hash from the current fields
    pub fn seal(&mut self) {
        self.integrity_hash = self.compute_integrity();
    }

    /// Whether the stored integrity hash matches the fields
    pub fn verify_integrity(&self) -> bool {
        self.integrity_hash == self.compute_integrity()
    }

    fn upsert_permission(&mut self, permission: FacilityPermission) -> Option<FacilityPermission> {
        match self
            .permissions
            .iter_mut()
            .find(|p| p.facility_id == permission.facility_id)
        {
            Some(existing) => Some(std::mem::replace(existing, permission)),
            None => {
                self.permissions.push(permission);
                None
            }
        }
    }

    fn compute_integrity(&self) -> String {
        #[derive(Serialize)]
        struct IntegrityInput<'a> {
            subject_id: &'a SubjectId,
            qr_secret: &'a QrSecret,
            access_level: AccessLevel,
            permissions: &'a [FacilityPermission],
        }

        let input = IntegrityInput {
            subject_id: &self.subject_id,
            qr_secret: &self.qr_secret,
            access_level: self.access_level,
            permissions: &self.permissions,
        };
        // Serializing plain structs and vectors to JSON does not fail.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        hash::hash_hex(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn facility(id: &str) -> FacilityId {
        FacilityId::new(id).unwrap()
    }

    fn credential() -> Credential {
        Credential::new(
            CredentialId::from_entropy([1u8; 16]),
            SubjectId::new("s-1").unwrap(),
            QrSecret::from_bytes([2u8; 32]),
            AccessLevel::Student,
            vec![FacilityPermission::full(facility("LIB"))],
            Timestamp::from_secs(100),
            Duration::from_secs(3_600),
        )
    }

    #[test]
    fn new_credential_is_sealed_and_valid() {
        let c = credential();
        assert!(c.verify_integrity());
        assert!(c.is_valid(Timestamp::from_secs(200)));
        assert!(!c.is_valid(Timestamp::from_secs(3_700)));
    }

    #[test]
    fn mutators_recompute_integrity() {
        let mut c = credential();
        let before = c.integrity_hash.clone();
        c.rotate_secret(QrSecret::from_bytes([3u8; 32]), Timestamp::from_secs(150));
        assert_ne!(before, c.integrity_hash);
        assert!(c.verify_integrity());

        c.set_access_level(AccessLevel::Staff);
        assert!(c.verify_integrity());
    }

    #[test]
    fn direct_field_edit_is_detected() {
        let mut c = credential();
        c.access_level = AccessLevel::Admin;
        assert!(!c.verify_integrity());
    }

    #[test]
    fn duplicate_grant_replaces() {
        let mut c = credential();
        let replaced = c.grant_permission(
            FacilityPermission::full(facility("LIB")).expiring_at(Timestamp::from_secs(500)),
        );
        assert!(replaced.is_some());
        assert_eq!(c.permissions.len(), 1);
        assert_eq!(
            c.permission_for(&facility("LIB")).unwrap().expires_at,
            Some(Timestamp::from_secs(500))
        );
    }

    #[test]
    fn revocation_keeps_record() {
        let mut c = credential();
        c.revoke(Timestamp::from_secs(120), "lost phone");
        assert!(c.is_revoked());
        assert!(!c.is_valid(Timestamp::from_secs(130)));
        assert!(c.verify_integrity());
    }

    #[test]
    fn time_limited_window_matches_weekday_and_clock() {
        let restriction = TimeRestriction::new(
            ClockTime::new(8, 0).unwrap(),
            ClockTime::new(20, 0).unwrap(),
            DayOfWeek::WORKDAYS,
        );
        let permission = FacilityPermission::time_limited(facility("LAB"), restriction);
        let at = |day, h| LocalMoment {
            day,
            time: ClockTime::new(h, 0).unwrap(),
        };
        assert!(permission.admits_time(at(DayOfWeek::Tuesday, 10)));
        assert!(!permission.admits_time(at(DayOfWeek::Tuesday, 21)));
        assert!(!permission.admits_time(at(DayOfWeek::Sunday, 10)));
    }

    proptest! {
        #[test]
        fn at_most_one_permission_per_facility(ids in proptest::collection::vec(0u8..5, 1..20)) {
            let mut c = credential();
            for id in &ids {
                c.grant_permission(FacilityPermission::full(facility(&format!("F{id}"))));
            }
            let distinct: BTreeSet<_> = c.permissions.iter().map(|p| p.facility_id.clone()).collect();
            prop_assert_eq!(distinct.len(), c.permissions.len());
            prop_assert!(c.verify_integrity());
        }
    }
}
