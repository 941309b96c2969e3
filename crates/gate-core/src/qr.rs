//! Signed QR payloads
//!
//! A payload is a short-lived bearer proof that the holder possesses the
//! current secret of a credential. It carries the credential reference, the
//! subject, an issuance timestamp and a nonce, authenticated with
//! HMAC-SHA256.
//!
//! The HMAC key is the SHA-256 digest of the credential secret (`PayloadKey`).
//! Live validation derives it from the stored secret; offline scanners receive
//! only the digest in their snapshot. Both paths therefore verify with the
//! same key material.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

use crate::errors::{GateError, Result};
use crate::hash;
use crate::identifiers::{CredentialId, Nonce, QrSecret, SubjectId};
use crate::time::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Current payload format version
pub const QR_PAYLOAD_VERSION: u8 = 1;

/// Upper bound on an encoded payload accepted for decoding
const MAX_ENCODED_LEN: usize = 2048;

/// HMAC key for payload signatures, derived from a credential secret
#[derive(Clone, PartialEq, Eq)]
pub struct PayloadKey([u8; 32]);

impl PayloadKey {
    /// Derive the key from the credential's live secret
    pub fn from_secret(secret: &QrSecret) -> Self {
        Self(hash::hash(secret.expose().as_bytes()))
    }

    /// Rebuild the key from its hex digest (as shipped in offline snapshots)
    pub fn from_hex(digest: &str) -> Result<Self> {
        let bytes = hex::decode(digest)?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GateError::crypto("payload key digest must be 32 bytes"))?;
        Ok(Self(key))
    }

    /// Hex form of the digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail for 32 bytes.
        match HmacSha256::new_from_slice(&self.0) {
            Ok(mac) => mac,
            Err(_) => unreachable!("hmac accepts 32-byte keys"),
        }
    }
}

impl std::fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadKey(<redacted>)")
    }
}

/// Signed, time-boxed QR payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// Format version
    #[serde(rename = "v")]
    pub version: u8,
    /// Credential this payload proves possession of
    #[serde(rename = "cid")]
    pub credential_id: CredentialId,
    /// Subject the credential belongs to
    #[serde(rename = "sub")]
    pub subject_id: SubjectId,
    /// When the payload was signed
    #[serde(rename = "iat")]
    pub issued_at: Timestamp,
    /// Random per-payload nonce
    #[serde(rename = "n")]
    pub nonce: Nonce,
    /// Hex HMAC-SHA256 over the canonical message
    #[serde(rename = "sig")]
    pub signature: String,
}

impl QrPayload {
    /// Sign a new payload
    pub fn sign(
        key: &PayloadKey,
        credential_id: CredentialId,
        subject_id: SubjectId,
        issued_at: Timestamp,
        nonce: Nonce,
    ) -> Self {
        let mut mac = key.mac();
        mac.update(&canonical_message(
            &credential_id,
            &subject_id,
            &nonce,
            issued_at,
        ));
        let signature = hex::encode(mac.finalize().into_bytes());
        Self {
            version: QR_PAYLOAD_VERSION,
            credential_id,
            subject_id,
            issued_at,
            nonce,
            signature,
        }
    }

    /// Verify the signature in constant time
    pub fn verify(&self, key: &PayloadKey) -> bool {
        if self.version != QR_PAYLOAD_VERSION {
            return false;
        }
        let Ok(expected) = hex::decode(&self.signature) else {
            return false;
        };
        let mut mac = key.mac();
        mac.update(&canonical_message(
            &self.credential_id,
            &self.subject_id,
            &self.nonce,
            self.issued_at,
        ));
        mac.verify_slice(&expected).is_ok()
    }

    /// Whether the payload is still within its validity window at `now`
    pub fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        now.since(self.issued_at) <= ttl
    }

    /// When the payload stops being accepted
    pub fn expires_at(&self, ttl: Duration) -> Timestamp {
        self.issued_at.saturating_add(ttl)
    }

    /// Encode as the compact string rendered into the QR code
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a scanned QR string
    pub fn decode(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() || encoded.len() > MAX_ENCODED_LEN {
            return Err(GateError::invalid("qr payload has an invalid length"));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| GateError::serialization(format!("qr payload is not base64: {e}")))?;
        let payload: Self = serde_json::from_slice(&bytes)?;
        Ok(payload)
    }
}

fn canonical_message(
    credential_id: &CredentialId,
    subject_id: &SubjectId,
    nonce: &Nonce,
    issued_at: Timestamp,
) -> Vec<u8> {
    format!(
        "campus-gate/qr/v{QR_PAYLOAD_VERSION}|{}|{subject_id}|{nonce}|{}",
        credential_id.0,
        issued_at.as_millis()
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(secret: &QrSecret) -> QrPayload {
        QrPayload::sign(
            &PayloadKey::from_secret(secret),
            CredentialId::from_entropy([3u8; 16]),
            SubjectId::new("s-100").unwrap(),
            Timestamp::from_secs(1_000),
            Nonce::from_bytes([9u8; 16]),
        )
    }

    #[test]
    fn signed_payload_verifies_after_encoding() {
        let secret = QrSecret::from_bytes([1u8; 32]);
        let payload = sample(&secret);
        let decoded = QrPayload::decode(&payload.encode().unwrap()).unwrap();
        assert!(decoded.verify(&PayloadKey::from_secret(&secret)));
    }

    #[test]
    fn rotated_secret_fails_verification() {
        let payload = sample(&QrSecret::from_bytes([1u8; 32]));
        assert!(!payload.verify(&PayloadKey::from_secret(&QrSecret::from_bytes([2u8; 32]))));
    }

    #[test]
    fn digest_key_matches_secret_key() {
        let secret = QrSecret::from_bytes([4u8; 32]);
        let payload = sample(&secret);
        let digest = PayloadKey::from_secret(&secret).to_hex();
        assert!(payload.verify(&PayloadKey::from_hex(&digest).unwrap()));
    }

    #[test]
    fn freshness_window_is_inclusive() {
        let payload = sample(&QrSecret::from_bytes([1u8; 32]));
        let ttl = Duration::from_secs(60);
        assert!(payload.is_fresh(Timestamp::from_secs(1_060), ttl));
        assert!(!payload.is_fresh(Timestamp::from_secs(1_061), ttl));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(QrPayload::decode("").is_err());
        assert!(QrPayload::decode("not base64 !!").is_err());
        assert!(QrPayload::decode(&URL_SAFE_NO_PAD.encode(b"{}")).is_err());
    }

    proptest! {
        #[test]
        fn any_field_change_breaks_signature(issued in 0u64..10_000_000, delta in 1u64..1_000) {
            let secret = QrSecret::from_bytes([5u8; 32]);
            let key = PayloadKey::from_secret(&secret);
            let mut payload = QrPayload::sign(
                &key,
                CredentialId::from_entropy([8u8; 16]),
                SubjectId::new("s-7").unwrap(),
                Timestamp::from_millis(issued),
                Nonce::from_bytes([1u8; 16]),
            );
            prop_assert!(payload.verify(&key));
            payload.issued_at = Timestamp::from_millis(issued + delta);
            prop_assert!(!payload.verify(&key));
        }
    }
}
