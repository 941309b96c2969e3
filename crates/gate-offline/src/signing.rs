//! Ed25519 keys for snapshot signing
//!
//! The server holds the signing seed; scanners are provisioned with the
//! verifying key only.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use gate_core::{GateError, Result};

/// Server-side snapshot signer
#[derive(Clone)]
pub struct SnapshotSigner {
    key: SigningKey,
}

impl SnapshotSigner {
    /// Signer from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Signer from a hex-encoded 32-byte seed
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self> {
        let bytes = hex::decode(seed_hex.trim())?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GateError::crypto("ed25519 seed must be 32 bytes"))?;
        Ok(Self::from_seed(seed))
    }

    /// Matching verifier
    pub fn verifier(&self) -> SnapshotVerifier {
        SnapshotVerifier {
            key: self.key.verifying_key(),
        }
    }

    /// Hex signature over `message`
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for SnapshotSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSigner")
            .field("verifying_key", &self.verifier().to_hex())
            .finish()
    }
}

/// Scanner-side verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVerifier {
    key: VerifyingKey,
}

impl SnapshotVerifier {
    /// Verifier from a hex-encoded 32-byte public key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(key_hex.trim())?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GateError::crypto("ed25519 public key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| GateError::crypto(format!("invalid ed25519 public key: {e}")))?;
        Ok(Self { key })
    }

    /// Hex form of the public key
    pub fn to_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    /// Whether `signature_hex` is a valid signature over `message`
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        self.key.verify_strict(message, &signature).is_ok()
    }
}
