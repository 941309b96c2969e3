//! Offline log reconciliation
//!
//! Buffered scanner entries are merged into the central access log one by
//! one. A bad entry yields a per-entry error without failing the batch, and
//! replays are detected through the composite sync key, so submitting the
//! same batch twice accepts nothing the second time.
//!
//! Offline grants are never replayed against live occupancy counters.

use gate_access::GateContext;
use gate_core::{AccessLogEntry, EntryId, GateError, Result, SecurityFlag, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest batch accepted in one call
pub const MAX_SYNC_BATCH: usize = 10_000;

/// Per-entry result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Accepted,
    Duplicate,
    Error { message: String },
}

/// Outcome for the entry at `index` in the submitted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOutcome {
    pub index: usize,
    pub entry_id: EntryId,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Batch summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub outcomes: Vec<EntryOutcome>,
}

impl SyncReport {
    fn push(&mut self, index: usize, entry_id: EntryId, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Accepted => self.accepted += 1,
            SyncOutcome::Duplicate => self.duplicates += 1,
            SyncOutcome::Error { .. } => self.errors += 1,
        }
        self.outcomes.push(EntryOutcome {
            index,
            entry_id,
            outcome,
        });
    }
}

/// Merges device buffers into the central log
#[derive(Debug, Clone)]
pub struct LogSynchronizer {
    ctx: GateContext,
    max_clock_skew: Duration,
}

impl LogSynchronizer {
    pub fn new(ctx: GateContext, max_clock_skew: Duration) -> Self {
        Self {
            ctx,
            max_clock_skew,
        }
    }

    /// Reconcile entries buffered by an offline scanner
    pub async fn sync(&self, entries: Vec<AccessLogEntry>) -> Result<SyncReport> {
        self.merge(entries, true).await
    }

    /// Reconcile entries the live engine could not write
    pub async fn replay_fallback(&self, entries: Vec<AccessLogEntry>) -> Result<SyncReport> {
        self.merge(entries, false).await
    }

    async fn merge(&self, entries: Vec<AccessLogEntry>, require_offline: bool) -> Result<SyncReport> {
        if entries.len() > MAX_SYNC_BATCH {
            return Err(GateError::invalid(format!(
                "batch of {} entries exceeds the limit of {MAX_SYNC_BATCH}",
                entries.len()
            )));
        }
        let now = self.ctx.now().await?;
        let horizon = now.saturating_add(self.max_clock_skew);

        let mut report = SyncReport::default();
        for (index, mut entry) in entries.into_iter().enumerate() {
            let entry_id = entry.id;
            if let Err(message) = check(&entry, require_offline, horizon) {
                debug!(index, %entry_id, %message, "sync entry rejected");
                report.push(index, entry_id, SyncOutcome::Error { message });
                continue;
            }
            entry.recorded_at = now;
            let outcome = match self.ctx.access_log.append_unique(entry).await {
                Ok(true) => SyncOutcome::Accepted,
                Ok(false) => SyncOutcome::Duplicate,
                Err(error) => {
                    warn!(index, %entry_id, %error, "sync append failed");
                    SyncOutcome::Error {
                        message: error.to_string(),
                    }
                }
            };
            report.push(index, entry_id, outcome);
        }

        info!(
            accepted = report.accepted,
            duplicates = report.duplicates,
            errors = report.errors,
            "offline log sync finished"
        );
        Ok(report)
    }
}

fn check(entry: &AccessLogEntry, require_offline: bool, horizon: Timestamp) -> std::result::Result<(), String> {
    if entry.device.device_id.as_str().trim().is_empty() {
        return Err("entry has no device id".to_string());
    }
    if require_offline
        && (!entry.offline || !entry.security_flags.contains(&SecurityFlag::OfflineDecision))
    {
        return Err("entry is not an offline decision".to_string());
    }
    if entry.timestamp > horizon {
        return Err(format!(
            "timestamp {} is beyond the allowed clock skew",
            entry.timestamp.as_millis()
        ));
    }
    Ok(())
}
