//! Suspicious activity detector
//!
//! `scan` is a read-only aggregation: denied entries inside a trailing
//! window, grouped by (subject, facility, device), reported once a group
//! reaches the threshold. `sweep` runs a scan with the configured defaults,
//! tags the entries behind each incident with `repeated_denials`, and
//! notifies for incidents that gained new tags. Detection never locks a
//! facility down by itself.

use gate_core::effects::Notification;
use gate_core::{
    AccessLogEntry, DenialReason, DeviceId, EntryId, FacilityId, GateError, Result,
    SecurityFlag, SubjectId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, warn};

use crate::admin::notify_best_effort;
use crate::context::GateContext;

/// Default window and threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionPolicy {
    pub window: Duration,
    pub denial_threshold: u32,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            denial_threshold: 5,
        }
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetectionQuery {
    #[serde(default)]
    pub window_secs: Option<u64>,
    #[serde(default)]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
}

/// A group of denials that reached the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub subject_id: Option<SubjectId>,
    pub facility_id: FacilityId,
    pub device_id: DeviceId,
    pub denial_count: u32,
    pub reasons: BTreeSet<DenialReason>,
    pub first_attempt: Timestamp,
    pub last_attempt: Timestamp,
    pub entry_ids: Vec<EntryId>,
}

type GroupKey = (Option<SubjectId>, FacilityId, DeviceId);

/// Group denied entries and keep those at or above `threshold`
pub fn aggregate<'a>(
    entries: impl IntoIterator<Item = &'a AccessLogEntry>,
    threshold: u32,
) -> Vec<Incident> {
    let mut groups: BTreeMap<GroupKey, Incident> = BTreeMap::new();
    for entry in entries.into_iter().filter(|e| !e.is_granted()) {
        let key = (
            entry.subject_id.clone(),
            entry.facility_id.clone(),
            entry.device.device_id.clone(),
        );
        let incident = groups.entry(key).or_insert_with(|| Incident {
            subject_id: entry.subject_id.clone(),
            facility_id: entry.facility_id.clone(),
            device_id: entry.device.device_id.clone(),
            denial_count: 0,
            reasons: BTreeSet::new(),
            first_attempt: entry.timestamp,
            last_attempt: entry.timestamp,
            entry_ids: Vec::new(),
        });
        incident.denial_count = incident.denial_count.saturating_add(1);
        incident.reasons.extend(entry.denial_reason);
        incident.first_attempt = incident.first_attempt.min(entry.timestamp);
        incident.last_attempt = incident.last_attempt.max(entry.timestamp);
        incident.entry_ids.push(entry.id);
    }

    let mut incidents: Vec<Incident> = groups
        .into_values()
        .filter(|incident| incident.denial_count >= threshold)
        .collect();
    incidents.sort_by(|a, b| {
        b.denial_count
            .cmp(&a.denial_count)
            .then(b.last_attempt.cmp(&a.last_attempt))
    });
    incidents
}

/// Windowed repeated-denial detection
#[derive(Debug, Clone)]
pub struct SuspiciousActivityDetector {
    ctx: GateContext,
    policy: DetectionPolicy,
}

impl SuspiciousActivityDetector {
    pub fn new(ctx: GateContext, policy: DetectionPolicy) -> Self {
        Self { ctx, policy }
    }

    /// Incidents in the trailing window; no side effects
    pub async fn scan(&self, query: &DetectionQuery) -> Result<Vec<Incident>> {
        let window = query
            .window_secs
            .map_or(self.policy.window, Duration::from_secs);
        let threshold = query.threshold.unwrap_or(self.policy.denial_threshold);
        if threshold == 0 {
            return Err(GateError::invalid("threshold must be at least 1"));
        }
        if window.is_zero() {
            return Err(GateError::invalid("window must be positive"));
        }

        let now = self.ctx.now().await?;
        let entries = self
            .ctx
            .access_log
            .entries_since(now.saturating_sub(window))
            .await?;
        let scoped = entries.iter().filter(|e| {
            query
                .facility_id
                .as_ref()
                .map_or(true, |f| &e.facility_id == f)
        });
        let incidents = aggregate(scoped, threshold);
        debug!(incidents = incidents.len(), window_secs = window.as_secs(), threshold, "suspicious activity scan");
        Ok(incidents)
    }

    /// Scan with defaults, tag entries and notify new incidents
    ///
    /// Returns the incidents that gained at least one new tag. Running it
    /// again over the same entries raises nothing.
    pub async fn sweep(&self) -> Result<Vec<Incident>> {
        let mut raised = Vec::new();
        for incident in self.scan(&DetectionQuery::default()).await? {
            let mut newly_tagged = false;
            for id in &incident.entry_ids {
                newly_tagged |= self
                    .ctx
                    .access_log
                    .add_security_flags(id, &[SecurityFlag::RepeatedDenials])
                    .await?;
            }
            if !newly_tagged {
                continue;
            }
            warn!(
                subject = ?incident.subject_id.as_ref().map(ToString::to_string),
                facility = %incident.facility_id,
                device = %incident.device_id,
                denials = incident.denial_count,
                "suspicious activity"
            );
            notify_best_effort(
                &self.ctx,
                Notification::SuspiciousActivity {
                    subject_id: incident.subject_id.clone(),
                    facility_id: incident.facility_id.clone(),
                    device_id: incident.device_id.clone(),
                    denial_count: incident.denial_count,
                },
            )
            .await;
            raised.push(incident);
        }
        Ok(raised)
    }
}
