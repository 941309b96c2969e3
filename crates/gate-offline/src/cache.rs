//! Snapshot cache keyed by facility scope
//!
//! Scanners poll for snapshots far more often than state changes, so a
//! snapshot built for a scope is reused until it is `refresh_interval` old.
//! Any lockdown or revocation must call [`SnapshotCache::invalidate_all`]
//! so the next request rebuilds from live state. Each invalidation starts a
//! new generation; a build that began in an older generation is returned to
//! its caller but never cached.

use gate_core::{FacilityId, Result};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

use crate::builder::SnapshotBuilder;
use crate::snapshot::OfflineCacheSnapshot;

type Scope = BTreeSet<FacilityId>;

#[derive(Debug, Default)]
struct Entries {
    generation: u64,
    by_scope: HashMap<Scope, OfflineCacheSnapshot>,
}

/// Cached snapshots per scope
#[derive(Debug)]
pub struct SnapshotCache {
    builder: SnapshotBuilder,
    refresh_interval: Duration,
    entries: RwLock<Entries>,
}

impl SnapshotCache {
    pub fn new(builder: SnapshotBuilder, refresh_interval: Duration) -> Self {
        Self {
            builder,
            refresh_interval,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Underlying builder
    pub fn builder(&self) -> &SnapshotBuilder {
        &self.builder
    }

    /// Cached snapshot for the scope, rebuilt when stale
    ///
    /// A request with an explicit TTL always builds fresh and bypasses the cache.
    pub async fn get_or_build(
        &self,
        facility_ids: &[FacilityId],
        ttl: Option<Duration>,
    ) -> Result<OfflineCacheSnapshot> {
        if ttl.is_some() {
            return self.builder.build(facility_ids, ttl).await;
        }
        let scope: Scope = facility_ids.iter().cloned().collect();
        let now = self.builder_now().await?;
        let (generation, cached) = {
            let entries = self.entries.read();
            (entries.generation, entries.by_scope.get(&scope).cloned())
        };
        if let Some(cached) = cached {
            let fresh_until = cached.body.generated_at.saturating_add(self.refresh_interval);
            if now < fresh_until && !cached.is_expired(now) {
                debug!(snapshot = %cached.body.id, "snapshot served from cache");
                return Ok(cached);
            }
        }
        let snapshot = self.builder.build(facility_ids, None).await?;
        self.store(generation, scope, snapshot.clone());
        Ok(snapshot)
    }

    /// Rebuild every scope already cached; returns how many were stored
    pub async fn refresh(&self) -> Result<usize> {
        let (generation, scopes) = {
            let entries = self.entries.read();
            let scopes: Vec<Scope> = entries.by_scope.keys().cloned().collect();
            (entries.generation, scopes)
        };
        let mut refreshed = 0;
        for scope in scopes {
            let ids: Vec<FacilityId> = scope.iter().cloned().collect();
            let snapshot = self.builder.build(&ids, None).await?;
            if self.store(generation, scope, snapshot) {
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    /// Pre-build snapshots for the given scopes
    pub async fn warm(&self, scopes: &[Vec<FacilityId>]) -> Result<()> {
        let generation = self.entries.read().generation;
        for ids in scopes {
            let snapshot = self.builder.build(ids, None).await?;
            self.store(generation, ids.iter().cloned().collect(), snapshot);
        }
        Ok(())
    }

    /// Drop every cached snapshot, including builds still in flight
    pub fn invalidate_all(&self) {
        let dropped = {
            let mut entries = self.entries.write();
            let dropped = entries.by_scope.len();
            entries.by_scope.clear();
            entries.generation += 1;
            dropped
        };
        debug!(dropped, "snapshot cache invalidated");
    }

    /// Number of cached scopes
    pub fn len(&self) -> usize {
        self.entries.read().by_scope.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.read().by_scope.is_empty()
    }

    /// Cache `snapshot` unless an invalidation happened since `generation`
    fn store(&self, generation: u64, scope: Scope, snapshot: OfflineCacheSnapshot) -> bool {
        let mut entries = self.entries.write();
        if entries.generation != generation {
            debug!(snapshot = %snapshot.body.id, "discarding snapshot built before invalidation");
            return false;
        }
        entries.by_scope.insert(scope, snapshot);
        true
    }

    async fn builder_now(&self) -> Result<gate_core::Timestamp> {
        self.builder.context().now().await
    }
}
