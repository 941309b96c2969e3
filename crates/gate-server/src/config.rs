//! Server configuration
//!
//! `GateConfig` is read from a TOML file, then `GATE_*` environment
//! variables override individual fields, then the whole thing is validated
//! once with an accumulating `ConfigValidator` so every problem is reported
//! together.

use gate_access::{DecisionPolicy, DetectionPolicy, EnginePolicy, IssuancePolicy};
use gate_core::config::{ConfigValidator, ValidationErrors};
use gate_core::{FacilityId, UtcOffset};
use gate_offline::{SnapshotPolicy, SnapshotSigner};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Bind address override
pub const ENV_BIND_ADDRESS: &str = "GATE_BIND_ADDRESS";
/// Payload TTL override
pub const ENV_PAYLOAD_TTL_SECS: &str = "GATE_PAYLOAD_TTL_SECS";
/// Campus UTC offset override
pub const ENV_UTC_OFFSET_MINUTES: &str = "GATE_UTC_OFFSET_MINUTES";
/// Snapshot signing seed override
pub const ENV_SIGNING_SEED_HEX: &str = "GATE_SIGNING_SEED_HEX";
/// Default snapshot TTL override
pub const ENV_SNAPSHOT_TTL_SECS: &str = "GATE_SNAPSHOT_TTL_SECS";
/// Sync clock skew override
pub const ENV_MAX_CLOCK_SKEW_SECS: &str = "GATE_MAX_CLOCK_SKEW_SECS";
/// Detector window override
pub const ENV_DETECTION_WINDOW_SECS: &str = "GATE_DETECTION_WINDOW_SECS";
/// Detector threshold override
pub const ENV_DENIAL_THRESHOLD: &str = "GATE_DENIAL_THRESHOLD";
/// Seed file override
pub const ENV_SEED_PATH: &str = "GATE_SEED_PATH";

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind_address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Issuance and validation policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySection {
    pub payload_ttl_secs: u64,
    pub credential_validity_days: u64,
    pub attempt_window_secs: u64,
    /// Campus wall clock used for weekday and time-of-day checks
    pub utc_offset_minutes: i32,
    pub high_attempt_threshold: u32,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            payload_ttl_secs: 60,
            credential_validity_days: 365,
            attempt_window_secs: 300,
            utc_offset_minutes: 0,
            high_attempt_threshold: 5,
        }
    }
}

/// Offline snapshots and reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OfflineSection {
    pub snapshot_ttl_secs: u64,
    pub max_snapshot_ttl_secs: u64,
    /// Hex ed25519 seed; the server refuses to start without it
    pub signing_seed_hex: Option<String>,
    pub max_clock_skew_secs: u64,
    pub refresh_interval_secs: u64,
    /// Facility sets whose snapshots are pre-built and kept warm
    pub prewarm_scopes: Vec<Vec<String>>,
}

impl Default for OfflineSection {
    fn default() -> Self {
        Self {
            snapshot_ttl_secs: 600,
            max_snapshot_ttl_secs: 3_600,
            signing_seed_hex: None,
            max_clock_skew_secs: 300,
            refresh_interval_secs: 300,
            prewarm_scopes: Vec::new(),
        }
    }
}

/// Suspicious activity detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionSection {
    pub window_secs: u64,
    pub denial_threshold: u32,
    pub sweep_interval_secs: u64,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            window_secs: 300,
            denial_threshold: 5,
            sweep_interval_secs: 60,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub server: ServerSection,
    pub policy: PolicySection,
    pub offline: OfflineSection,
    pub detection: DetectionSection,
    /// Facilities and subjects loaded at start-up
    pub seed: Option<PathBuf>,
}

impl GateConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// File (or defaults), then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GATE_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_BIND_ADDRESS) {
            self.server.bind_address = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_PAYLOAD_TTL_SECS)? {
            self.policy.payload_ttl_secs = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_UTC_OFFSET_MINUTES)? {
            self.policy.utc_offset_minutes = value;
        }
        if let Some(value) = lookup(ENV_SIGNING_SEED_HEX) {
            self.offline.signing_seed_hex = Some(value);
        }
        if let Some(value) = parse_env(&lookup, ENV_SNAPSHOT_TTL_SECS)? {
            self.offline.snapshot_ttl_secs = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_MAX_CLOCK_SKEW_SECS)? {
            self.offline.max_clock_skew_secs = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_DETECTION_WINDOW_SECS)? {
            self.detection.window_secs = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_DENIAL_THRESHOLD)? {
            self.detection.denial_threshold = value;
        }
        if let Some(value) = lookup(ENV_SEED_PATH) {
            self.seed = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Check every section, reporting all violations at once
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut root = ConfigValidator::new();

        let mut server = root.for_field("server");
        server.format("bind_address", &self.server.bind_address, "host:port", |s| {
            s.parse::<SocketAddr>()
        });
        root.merge(server);

        let mut policy = root.for_field("policy");
        policy
            .range("payload_ttl_secs", clamp_i64(self.policy.payload_ttl_secs), Some(1), Some(3_600))
            .range(
                "credential_validity_days",
                clamp_i64(self.policy.credential_validity_days),
                Some(1),
                Some(3_650),
            )
            .range(
                "attempt_window_secs",
                clamp_i64(self.policy.attempt_window_secs),
                Some(1),
                Some(86_400),
            )
            .range(
                "utc_offset_minutes",
                i64::from(self.policy.utc_offset_minutes),
                Some(-720),
                Some(840),
            )
            .range(
                "high_attempt_threshold",
                i64::from(self.policy.high_attempt_threshold),
                Some(1),
                None,
            );
        root.merge(policy);

        let mut offline = root.for_field("offline");
        offline
            .range(
                "max_snapshot_ttl_secs",
                clamp_i64(self.offline.max_snapshot_ttl_secs),
                Some(1),
                None,
            )
            .range(
                "snapshot_ttl_secs",
                clamp_i64(self.offline.snapshot_ttl_secs),
                Some(1),
                Some(clamp_i64(self.offline.max_snapshot_ttl_secs)),
            )
            .range(
                "max_clock_skew_secs",
                clamp_i64(self.offline.max_clock_skew_secs),
                Some(0),
                Some(3_600),
            )
            .range(
                "refresh_interval_secs",
                clamp_i64(self.offline.refresh_interval_secs),
                Some(1),
                None,
            )
            .required("signing_seed_hex", &self.offline.signing_seed_hex);
        if let Some(seed) = &self.offline.signing_seed_hex {
            offline.format("signing_seed_hex", seed, "64 hex characters", |s| {
                SnapshotSigner::from_seed_hex(s)
            });
        }
        offline.custom(
            "prewarm_scopes",
            &self.offline.prewarm_scopes,
            |scopes| {
                scopes
                    .iter()
                    .all(|scope| !scope.is_empty() && scope.iter().all(|id| FacilityId::new(id.as_str()).is_ok()))
            },
            "every scope needs at least one non-empty facility id",
        );
        root.merge(offline);

        let mut detection = root.for_field("detection");
        detection
            .range("window_secs", clamp_i64(self.detection.window_secs), Some(1), None)
            .range(
                "denial_threshold",
                i64::from(self.detection.denial_threshold),
                Some(1),
                None,
            )
            .range(
                "sweep_interval_secs",
                clamp_i64(self.detection.sweep_interval_secs),
                Some(1),
                None,
            );
        root.merge(detection);

        root.result()
    }

    /// Listener address; call after `validate`
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Env {
                key: ENV_BIND_ADDRESS,
                message: e.to_string(),
            })
    }

    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            payload_ttl: Duration::from_secs(self.policy.payload_ttl_secs),
            utc_offset: UtcOffset::from_minutes(self.policy.utc_offset_minutes)
                .unwrap_or(UtcOffset::UTC),
        }
    }

    pub fn engine_policy(&self) -> EnginePolicy {
        EnginePolicy {
            decision: self.decision_policy(),
            attempt_window: Duration::from_secs(self.policy.attempt_window_secs),
            high_attempt_threshold: self.policy.high_attempt_threshold,
        }
    }

    pub fn issuance_policy(&self) -> IssuancePolicy {
        IssuancePolicy {
            payload_ttl: Duration::from_secs(self.policy.payload_ttl_secs),
            credential_validity: Duration::from_secs(
                self.policy.credential_validity_days.saturating_mul(24 * 3_600),
            ),
        }
    }

    pub fn snapshot_policy(&self) -> SnapshotPolicy {
        SnapshotPolicy {
            default_ttl: Duration::from_secs(self.offline.snapshot_ttl_secs),
            max_ttl: Duration::from_secs(self.offline.max_snapshot_ttl_secs),
            engine: self.engine_policy(),
        }
    }

    pub fn detection_policy(&self) -> DetectionPolicy {
        DetectionPolicy {
            window: Duration::from_secs(self.detection.window_secs),
            denial_threshold: self.detection.denial_threshold,
        }
    }

    /// Snapshot signer from the configured seed
    pub fn signer(&self) -> gate_core::Result<SnapshotSigner> {
        let seed = self
            .offline
            .signing_seed_hex
            .as_deref()
            .ok_or_else(|| gate_core::GateError::invalid("offline.signing_seed_hex is not set"))?;
        SnapshotSigner::from_seed_hex(seed)
    }

    /// Parsed pre-warm scopes
    pub fn prewarm_scopes(&self) -> gate_core::Result<Vec<Vec<FacilityId>>> {
        self.offline
            .prewarm_scopes
            .iter()
            .map(|scope| scope.iter().map(|id| FacilityId::new(id.as_str())).collect())
            .collect()
    }
}

fn parse_env<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
                key,
                message: e.to_string(),
            })
        })
        .transpose()
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
