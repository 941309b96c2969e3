//! Identity collaborator
//!
//! Authentication and session handling are external. This crate only needs
//! to resolve an authenticated subject to its role.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::AccessLevel;
use crate::errors::Result;
use crate::identifiers::SubjectId;

/// What the identity service knows about a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub role: AccessLevel,
}

impl SubjectProfile {
    /// Whether the subject may perform administrative actions
    pub fn is_admin(&self) -> bool {
        self.role == AccessLevel::Admin
    }
}

/// Subject lookup
#[async_trait]
pub trait IdentityEffects: Send + Sync {
    /// Resolve a subject; `None` when the subject does not exist
    async fn lookup_subject(&self, subject_id: &SubjectId) -> Result<Option<SubjectProfile>>;
}
