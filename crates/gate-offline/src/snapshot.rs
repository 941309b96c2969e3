//! Offline cache snapshot
//!
//! A snapshot is a signed JSON document. Each credential record carries its
//! own signature so a scanner can reject a single altered record without
//! trusting the rest; the whole body is signed once more so records cannot
//! be added, dropped or swapped between snapshots.
//!
//! Records carry `secret_hash` (the payload HMAC key) instead of the secret,
//! so a scanner can verify payloads but never mint them.

use gate_access::{CredentialFacts, DecisionPolicy};
use gate_core::{
    AccessLevel, CredentialId, Facility, FacilityId, FacilityPermission, PayloadKey, Result,
    SnapshotId, SubjectId, Timestamp, UtcOffset,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::signing::{SnapshotSigner, SnapshotVerifier};

/// Minimal signed view of one credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub credential_id: CredentialId,
    pub subject_id: SubjectId,
    /// Hex SHA-256 of the credential secret
    pub secret_hash: String,
    pub access_level: AccessLevel,
    /// Integrity hash of the live credential matched when exported
    pub integrity_ok: bool,
    pub active: bool,
    pub expires_at: Timestamp,
    /// Only the permissions for the snapshot's facilities
    pub permissions: Vec<FacilityPermission>,
    pub signature: String,
}

#[derive(Serialize)]
struct UnsignedRecord<'a> {
    credential_id: &'a CredentialId,
    subject_id: &'a SubjectId,
    secret_hash: &'a str,
    access_level: AccessLevel,
    integrity_ok: bool,
    active: bool,
    expires_at: Timestamp,
    permissions: &'a [FacilityPermission],
}

impl CredentialRecord {
    fn signing_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&UnsignedRecord {
            credential_id: &self.credential_id,
            subject_id: &self.subject_id,
            secret_hash: &self.secret_hash,
            access_level: self.access_level,
            integrity_ok: self.integrity_ok,
            active: self.active,
            expires_at: self.expires_at,
            permissions: &self.permissions,
        })?)
    }

    /// Fill in the signature
    pub fn sign(mut self, signer: &SnapshotSigner) -> Result<Self> {
        self.signature = signer.sign_hex(&self.signing_bytes()?);
        Ok(self)
    }

    /// Whether the record signature holds
    pub fn verify(&self, verifier: &SnapshotVerifier) -> bool {
        self.signing_bytes()
            .map(|bytes| verifier.verify_hex(&bytes, &self.signature))
            .unwrap_or(false)
    }

    /// Decision facts; the record signature must already be verified
    pub fn facts(&self) -> Result<CredentialFacts<'_>> {
        Ok(CredentialFacts {
            credential_id: self.credential_id,
            subject_id: &self.subject_id,
            payload_key: PayloadKey::from_hex(&self.secret_hash)?,
            integrity_ok: self.integrity_ok,
            active: self.active,
            expires_at: self.expires_at,
            access_level: self.access_level,
            permissions: &self.permissions,
        })
    }
}

/// Policy the scanner must apply, pinned by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRules {
    pub payload_ttl_secs: u64,
    pub utc_offset_minutes: i32,
    pub attempt_window_secs: u64,
    pub high_attempt_threshold: u32,
}

impl SnapshotRules {
    /// Decision policy for offline evaluation
    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            payload_ttl: Duration::from_secs(self.payload_ttl_secs),
            utc_offset: UtcOffset::from_minutes(self.utc_offset_minutes).unwrap_or(UtcOffset::UTC),
        }
    }
}

/// Signed portion of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBody {
    pub id: SnapshotId,
    /// Facilities the snapshot is scoped to
    pub scope: BTreeSet<FacilityId>,
    pub facilities: Vec<Facility>,
    pub credentials: Vec<CredentialRecord>,
    pub rules: SnapshotRules,
    pub generated_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Signed export handed to a scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineCacheSnapshot {
    #[serde(flatten)]
    pub body: SnapshotBody,
    pub signature: String,
}

impl OfflineCacheSnapshot {
    /// Sign a body
    pub fn sign(body: SnapshotBody, signer: &SnapshotSigner) -> Result<Self> {
        let signature = signer.sign_hex(&serde_json::to_vec(&body)?);
        Ok(Self { body, signature })
    }

    /// Whether the body signature holds
    pub fn verify(&self, verifier: &SnapshotVerifier) -> bool {
        serde_json::to_vec(&self.body)
            .map(|bytes| verifier.verify_hex(&bytes, &self.signature))
            .unwrap_or(false)
    }

    /// Past its TTL at `now`
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.body.expires_at
    }

    /// Facility view, if in scope
    pub fn facility(&self, id: &FacilityId) -> Option<&Facility> {
        self.body.facilities.iter().find(|f| &f.id == id)
    }

    /// Credential record, if present
    pub fn credential(&self, id: &CredentialId) -> Option<&CredentialRecord> {
        self.body.credentials.iter().find(|c| &c.credential_id == id)
    }
}
