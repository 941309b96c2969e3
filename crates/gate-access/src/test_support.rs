//! Harness wiring the services against in-memory stores and a manual clock

use gate_core::effects::{AccessLogStore, FacilityStore};
use gate_effects::{
    MemoryAccessLog, MemoryAdminAuditLog, MemoryCredentialStore, MemoryFacilityStore,
    StaticIdentityDirectory,
};
use gate_testkit::fixtures::{campus_directory, library, research_lab, tuesday_at};
use gate_testkit::{ManualClock, RecordingNotifier, SeededRandom};
use std::sync::Arc;

use crate::context::GateContext;

pub(crate) struct Harness {
    pub ctx: GateContext,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
    pub identity: Arc<StaticIdentityDirectory>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub facilities: Arc<MemoryFacilityStore>,
    pub admin_audit: Arc<MemoryAdminAuditLog>,
}

impl Harness {
    /// Campus with LIB and LAB, clock at Tuesday 10:00 UTC
    pub async fn new() -> Self {
        Self::build(RecordingNotifier::new(), Arc::new(MemoryAccessLog::new())).await
    }

    pub async fn with_failing_notifier() -> Self {
        Self::build(RecordingNotifier::failing(), Arc::new(MemoryAccessLog::new())).await
    }

    pub async fn with_access_log(access_log: Arc<dyn AccessLogStore>) -> Self {
        Self::build(RecordingNotifier::new(), access_log).await
    }

    async fn build(notifier: RecordingNotifier, access_log: Arc<dyn AccessLogStore>) -> Self {
        let clock = ManualClock::at(tuesday_at(10, 0));
        let notifier = Arc::new(notifier);
        let identity = Arc::new(campus_directory());
        let credentials = Arc::new(MemoryCredentialStore::new());
        let facilities = Arc::new(MemoryFacilityStore::new());
        let admin_audit = Arc::new(MemoryAdminAuditLog::new());
        facilities.upsert(library()).await.unwrap();
        facilities.upsert(research_lab()).await.unwrap();

        let ctx = GateContext {
            clock: Arc::new(clock.clone()),
            random: Arc::new(SeededRandom::seeded(7)),
            identity: identity.clone(),
            notifier: notifier.clone(),
            credentials: credentials.clone(),
            facilities: facilities.clone(),
            access_log,
            admin_audit: admin_audit.clone(),
        };
        Self {
            ctx,
            clock,
            notifier,
            identity,
            credentials,
            facilities,
            admin_audit,
        }
    }
}
