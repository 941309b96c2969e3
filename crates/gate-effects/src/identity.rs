//! Static identity directory
//!
//! In-memory view of the identity service, seeded at start-up.

use async_trait::async_trait;
use gate_core::effects::{IdentityEffects, SubjectProfile};
use gate_core::{Result, SubjectId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Subject directory held in memory
#[derive(Debug, Default)]
pub struct StaticIdentityDirectory {
    subjects: RwLock<HashMap<SubjectId, SubjectProfile>>,
}

impl StaticIdentityDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory with the given subjects
    pub fn with_subjects(profiles: impl IntoIterator<Item = SubjectProfile>) -> Self {
        let directory = Self::new();
        for profile in profiles {
            directory.insert(profile);
        }
        directory
    }

    /// Add or replace a subject
    pub fn insert(&self, profile: SubjectProfile) {
        self.subjects
            .write()
            .insert(profile.subject_id.clone(), profile);
    }

    /// Remove a subject
    pub fn remove(&self, subject_id: &SubjectId) -> Option<SubjectProfile> {
        self.subjects.write().remove(subject_id)
    }
}

#[async_trait]
impl IdentityEffects for StaticIdentityDirectory {
    async fn lookup_subject(&self, subject_id: &SubjectId) -> Result<Option<SubjectProfile>> {
        Ok(self.subjects.read().get(subject_id).cloned())
    }
}
