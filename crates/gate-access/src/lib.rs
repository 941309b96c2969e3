//! Campus Gate Access - Layer 4 services
//!
//! The services that sit on top of the `gate-core` effect interfaces:
//!
//! - [`FacilityRegistry`]: facility definitions and exit events
//! - [`LockdownController`]: the `normal`/`lockdown` override per facility
//! - [`IssuanceService`]: credential issuance, secret rotation, QR payloads
//! - [`CredentialAdmin`]: revocation and permission administration
//! - [`ValidationEngine`]: the access decision, with its single log write
//! - [`AccessHistory`]: read-only audit export
//! - [`SuspiciousActivityDetector`]: windowed repeated-denial aggregation
//!
//! The decision itself is the pure [`decision::evaluate`], shared with the
//! offline validator so both paths reach identical verdicts.

#![forbid(unsafe_code)]

mod admin;
pub mod context;
pub mod credentials;
pub mod decision;
pub mod detector;
pub mod engine;
pub mod error;
pub mod history;
pub mod issuance;
pub mod lockdown;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::GateContext;
pub use credentials::CredentialAdmin;
pub use decision::{evaluate, CredentialFacts, DecisionPolicy, Verdict};
pub use detector::{DetectionPolicy, DetectionQuery, Incident, SuspiciousActivityDetector};
pub use engine::{AccessRequest, Decision, EnginePolicy, ValidationEngine};
pub use error::{IssuanceError, IssuanceResult};
pub use history::AccessHistory;
pub use issuance::{IssuancePolicy, IssuanceService, IssuedCredential};
pub use lockdown::LockdownController;
pub use registry::FacilityRegistry;
