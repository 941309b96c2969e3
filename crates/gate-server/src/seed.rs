//! Start-up seed data
//!
//! ```toml
//! [[subjects]]
//! subject_id = "admin-1"
//! display_name = "Security Desk"
//! role = "admin"
//!
//! [[facilities]]
//! id = "LIB"
//! name = "Main Library"
//! capacity = 400
//! access_rules.student = { access_type = "full" }
//! operating_hours.monday = { state = "open", open = "08:00", close = "22:00" }
//! ```

use gate_core::effects::SubjectProfile;
use gate_core::Facility;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::config::ConfigError;
use crate::state::AppState;

/// Facilities and subjects to load
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedData {
    pub subjects: Vec<SubjectProfile>,
    pub facilities: Vec<Facility>,
}

impl SeedData {
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Register every subject and define every facility
    pub async fn apply(self, state: &AppState) -> gate_core::Result<()> {
        let subjects = self.subjects.len();
        for profile in self.subjects {
            state.identity.insert(profile);
        }
        let facilities = self.facilities.len();
        for facility in self.facilities {
            state.registry.define(facility).await?;
        }
        info!(subjects, facilities, "seed data loaded");
        Ok(())
    }
}
