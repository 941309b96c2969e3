//! Service wiring shared by handlers and background jobs

use gate_access::{
    AccessHistory, CredentialAdmin, FacilityRegistry, GateContext, IssuanceService,
    LockdownController, SuspiciousActivityDetector, ValidationEngine,
};
use gate_core::effects::{NotificationEffects, PhysicalTimeEffects, RandomEffects};
use gate_effects::{
    MemoryAccessLog, MemoryAdminAuditLog, MemoryCredentialStore, MemoryFacilityStore,
    RealRandomHandler, RealTimeHandler, StaticIdentityDirectory, TracingNotificationHandler,
};
use gate_offline::{LogSynchronizer, OfflineValidator, SnapshotBuilder, SnapshotCache};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GateConfig;

/// Handlers the state is built on
#[derive(Clone)]
pub struct Handlers {
    pub clock: Arc<dyn PhysicalTimeEffects>,
    pub random: Arc<dyn RandomEffects>,
    pub notifier: Arc<dyn NotificationEffects>,
}

impl Handlers {
    /// System clock, OS entropy, tracing notifications
    pub fn production() -> Self {
        Self {
            clock: Arc::new(RealTimeHandler::new()),
            random: Arc::new(RealRandomHandler::new()),
            notifier: Arc::new(TracingNotificationHandler::new()),
        }
    }
}

/// Everything an HTTP handler can reach
#[derive(Clone)]
pub struct AppState {
    pub ctx: GateContext,
    /// Identity directory filled from the seed file
    pub identity: Arc<StaticIdentityDirectory>,
    pub engine: Arc<ValidationEngine>,
    pub issuance: IssuanceService,
    pub credentials: CredentialAdmin,
    pub registry: FacilityRegistry,
    pub lockdown: LockdownController,
    pub history: AccessHistory,
    pub detector: SuspiciousActivityDetector,
    pub snapshots: Arc<SnapshotCache>,
    pub offline: OfflineValidator,
    pub sync: LogSynchronizer,
}

impl AppState {
    /// In-memory stores behind the given handlers
    pub fn in_memory(config: &GateConfig, handlers: Handlers) -> gate_core::Result<Self> {
        let identity = Arc::new(StaticIdentityDirectory::new());
        let ctx = GateContext {
            clock: handlers.clock,
            random: handlers.random,
            identity: identity.clone(),
            notifier: handlers.notifier,
            credentials: Arc::new(MemoryCredentialStore::new()),
            facilities: Arc::new(MemoryFacilityStore::new()),
            access_log: Arc::new(MemoryAccessLog::new()),
            admin_audit: Arc::new(MemoryAdminAuditLog::new()),
        };
        Self::assemble(config, ctx, identity)
    }

    /// Services over an existing context
    pub fn assemble(
        config: &GateConfig,
        ctx: GateContext,
        identity: Arc<StaticIdentityDirectory>,
    ) -> gate_core::Result<Self> {
        let signer = Arc::new(config.signer()?);
        let offline = OfflineValidator::new(signer.verifier());
        let builder = SnapshotBuilder::new(ctx.clone(), signer, config.snapshot_policy());
        let snapshots = Arc::new(SnapshotCache::new(
            builder,
            Duration::from_secs(config.offline.refresh_interval_secs),
        ));

        Ok(Self {
            identity,
            engine: Arc::new(ValidationEngine::new(ctx.clone(), config.engine_policy())),
            issuance: IssuanceService::new(ctx.clone(), config.issuance_policy()),
            credentials: CredentialAdmin::new(ctx.clone()),
            registry: FacilityRegistry::new(ctx.clone()),
            lockdown: LockdownController::new(ctx.clone()),
            history: AccessHistory::new(ctx.clone()),
            detector: SuspiciousActivityDetector::new(ctx.clone(), config.detection_policy()),
            snapshots,
            offline,
            sync: LogSynchronizer::new(
                ctx.clone(),
                Duration::from_secs(config.offline.max_clock_skew_secs),
            ),
            ctx,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cached_snapshots", &self.snapshots.len())
            .field("fallback_entries", &self.engine.fallback_len())
            .finish_non_exhaustive()
    }
}
