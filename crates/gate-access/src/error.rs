//! Issuance errors
//!
//! Issuance has two failures callers must tell apart from generic storage
//! or input errors; everything else travels as a wrapped `GateError`.

use gate_core::{CredentialId, GateError, SubjectId};

/// Result alias for issuance operations
pub type IssuanceResult<T> = std::result::Result<T, IssuanceError>;

/// Failure of `issue` or `rotate_secret`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuanceError {
    /// The identity service does not know the subject
    #[error("subject {0} not found")]
    SubjectNotFound(SubjectId),

    /// The credential was revoked or has lapsed; it cannot be reused
    #[error("{0} is inactive")]
    CredentialInactive(CredentialId),

    #[error(transparent)]
    Gate(#[from] GateError),
}
