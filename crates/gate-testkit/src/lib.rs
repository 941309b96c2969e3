//! Campus Gate Testing Infrastructure
//!
//! Deterministic clocks and entropy, recording collaborators, storage
//! failure injection, fixtures and proptest strategies shared by the test
//! suites of every Layer 4+ crate.
//!
//! ```toml
//! [dev-dependencies]
//! gate-testkit = { path = "../gate-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod notifier;
pub mod random;
pub mod stores;
pub mod strategies;
pub mod time;

pub use notifier::RecordingNotifier;
pub use random::SeededRandom;
pub use stores::{FailingAccessLog, InterleavingCredentials, UnavailableStore};
pub use time::ManualClock;
