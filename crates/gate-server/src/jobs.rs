//! Background jobs
//!
//! Periodic work (suspicious-activity sweeps, snapshot regeneration and
//! fallback-log replay) runs as independent interval tasks in a
//! [`JobRegistry`]. Each run is idempotent and keeps no state between runs;
//! shutting the registry down stops every task.

use gate_core::effects::PhysicalTimeEffects;
use gate_core::FacilityId;
use gate_offline::SyncOutcome;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Tracks spawned jobs and stops them together
#[derive(Debug)]
pub struct JobRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Run `f` now and then every `interval` until shutdown or `f` returns false
    pub fn spawn_interval_until<F, Fut>(
        &self,
        name: &'static str,
        clock: Arc<dyn PhysicalTimeEffects>,
        interval: Duration,
        mut f: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
            debug!(job = name, interval_ms, "job started");
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                if !f().await {
                    break;
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    result = clock.sleep_ms(interval_ms) => {
                        if result.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(job = name, "job stopped");
        });
        self.handles.lock().push(handle);
    }

    /// Number of tasks still running
    pub fn running(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Signal every job and abort any that are mid-run
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

/// Intervals for the standard jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSchedule {
    pub sweep_interval: Duration,
    pub refresh_interval: Duration,
    pub prewarm_scopes: Vec<Vec<FacilityId>>,
}

/// Start the detector sweep, snapshot refresh and fallback replay
pub fn start_jobs(registry: &JobRegistry, state: &AppState, schedule: JobSchedule) {
    let clock = state.ctx.clock.clone();

    let sweep_state = state.clone();
    registry.spawn_interval_until("detector-sweep", clock.clone(), schedule.sweep_interval, move || {
        let state = sweep_state.clone();
        async move {
            match state.detector.sweep().await {
                Ok(incidents) if !incidents.is_empty() => {
                    info!(incidents = incidents.len(), "sweep raised incidents");
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "detector sweep failed"),
            }
            true
        }
    });

    let refresh_state = state.clone();
    let scopes = schedule.prewarm_scopes;
    registry.spawn_interval_until(
        "snapshot-refresh",
        clock.clone(),
        schedule.refresh_interval,
        move || {
            let state = refresh_state.clone();
            let scopes = scopes.clone();
            async move {
                if let Err(error) = refresh_snapshots(&state, &scopes).await {
                    warn!(%error, "snapshot refresh failed");
                }
                true
            }
        },
    );

    let replay_state = state.clone();
    registry.spawn_interval_until("fallback-replay", clock, schedule.sweep_interval, move || {
        let state = replay_state.clone();
        async move {
            replay_fallback_once(&state).await;
            true
        }
    });
}

/// Rebuild cached scopes and make sure the configured ones exist
pub async fn refresh_snapshots(state: &AppState, scopes: &[Vec<FacilityId>]) -> gate_core::Result<()> {
    let refreshed = state.snapshots.refresh().await?;
    state.snapshots.warm(scopes).await?;
    debug!(refreshed, warmed = scopes.len(), "snapshots refreshed");
    Ok(())
}

/// Move engine fallback entries into the log; returns how many landed
///
/// Entries whose append failed again go back into the fallback buffer.
pub async fn replay_fallback_once(state: &AppState) -> usize {
    let pending = state.engine.drain_fallback();
    if pending.is_empty() {
        return 0;
    }
    match state.sync.replay_fallback(pending.clone()).await {
        Ok(report) => {
            let retry: Vec<_> = report
                .outcomes
                .iter()
                .filter(|o| matches!(o.outcome, SyncOutcome::Error { .. }))
                .filter_map(|o| pending.get(o.index).cloned())
                .collect();
            if !retry.is_empty() {
                warn!(retry = retry.len(), "fallback entries still pending");
                state.engine.requeue_fallback(retry);
            }
            report.accepted + report.duplicates
        }
        Err(error) => {
            warn!(%error, pending = pending.len(), "fallback replay failed");
            state.engine.requeue_fallback(pending);
            0
        }
    }
}
