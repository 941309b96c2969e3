//! Campus Gate Offline - disconnected scanner support
//!
//! - [`SnapshotBuilder`] exports a signed, time-boxed view of the facilities
//!   and credentials a scanner needs.
//! - [`OfflineValidator`] replays the online decision against a snapshot;
//!   [`OfflineScanner`] adds the device-side buffer and local counters.
//! - [`LogSynchronizer`] merges buffered entries back into the central log,
//!   deduplicating replays.
//! - [`SnapshotCache`] keeps recently built snapshots per facility scope.

#![forbid(unsafe_code)]

pub mod builder;
pub mod cache;
pub mod signing;
pub mod snapshot;
pub mod sync;
pub mod validator;

pub use builder::{SnapshotBuilder, SnapshotPolicy};
pub use cache::SnapshotCache;
pub use signing::{SnapshotSigner, SnapshotVerifier};
pub use snapshot::{CredentialRecord, OfflineCacheSnapshot, SnapshotBody, SnapshotRules};
pub use sync::{EntryOutcome, LogSynchronizer, SyncOutcome, SyncReport, MAX_SYNC_BATCH};
pub use validator::{OfflineScanner, OfflineValidator, ScanContext};
