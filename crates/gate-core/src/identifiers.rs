//! Identifiers used across Campus Gate
//!
//! Subject, facility and device identifiers are issued by outside systems
//! (the identity service, the facilities directory, scanner provisioning) and
//! are carried as opaque strings. Credential, entry and snapshot identifiers
//! are minted here from injected randomness.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{GateError, Result};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier, rejecting empty or whitespace-only values
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(GateError::invalid(concat!($label, " must not be empty")));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = GateError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create from a UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Create from caller-provided entropy (effect-injected)
            pub fn from_entropy(entropy: [u8; 16]) -> Self {
                Self(uuid::Builder::from_random_bytes(entropy).into_uuid())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = GateError;

            fn from_str(s: &str) -> Result<Self> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|e| GateError::invalid(format!("invalid {}: {e}", $prefix)))
            }
        }
    };
}

string_id!(
    /// Person identifier supplied by the identity service
    SubjectId,
    "subject id"
);

string_id!(
    /// Facility identifier (door, lab, library wing)
    FacilityId,
    "facility id"
);

string_id!(
    /// Scanner device identifier
    DeviceId,
    "device id"
);

uuid_id!(
    /// Digital credential identifier
    CredentialId,
    "credential"
);

uuid_id!(
    /// Access log entry identifier
    EntryId,
    "entry"
);

uuid_id!(
    /// Offline cache snapshot identifier
    SnapshotId,
    "snapshot"
);

/// Per-payload random nonce, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Encode 16 bytes of injected randomness as a nonce
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Borrow the hex form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque QR secret held by a credential
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QrSecret(String);

impl QrSecret {
    /// Build a secret from 32 bytes of injected randomness
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Raw secret material
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QrSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QrSecret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_trim_and_reject_empty() {
        assert_eq!(FacilityId::new("  LIB-01 ").unwrap().as_str(), "LIB-01");
        assert!(SubjectId::new("   ").is_err());
    }

    #[test]
    fn uuid_ids_parse_with_or_without_prefix() {
        let id = CredentialId::from_entropy([7u8; 16]);
        let printed = id.to_string();
        assert!(printed.starts_with("credential-"));
        assert_eq!(printed.parse::<CredentialId>().unwrap(), id);
        assert_eq!(id.0.to_string().parse::<CredentialId>().unwrap(), id);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = QrSecret::from_bytes([1u8; 32]);
        assert_eq!(format!("{secret:?}"), "QrSecret(<redacted>)");
    }
}
