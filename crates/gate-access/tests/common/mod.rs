#![allow(dead_code)]

use gate_access::{
    EnginePolicy, GateContext, IssuancePolicy, IssuanceService, IssuedCredential, ValidationEngine,
};
use gate_core::effects::FacilityStore;
use gate_core::SubjectId;
use gate_effects::{
    MemoryAccessLog, MemoryAdminAuditLog, MemoryCredentialStore, MemoryFacilityStore,
    StaticIdentityDirectory,
};
use gate_testkit::fixtures::{campus_directory, library, research_lab, tuesday_at};
use gate_testkit::{ManualClock, RecordingNotifier, SeededRandom};
use std::sync::Arc;

pub struct Campus {
    pub ctx: GateContext,
    pub clock: ManualClock,
    pub identity: Arc<StaticIdentityDirectory>,
    pub facilities: Arc<MemoryFacilityStore>,
    pub log: Arc<MemoryAccessLog>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Campus {
    pub async fn new() -> Self {
        let clock = ManualClock::at(tuesday_at(10, 0));
        let identity = Arc::new(campus_directory());
        let facilities = Arc::new(MemoryFacilityStore::new());
        let log = Arc::new(MemoryAccessLog::new());
        let notifier = Arc::new(RecordingNotifier::new());
        facilities.upsert(library()).await.unwrap();
        facilities.upsert(research_lab()).await.unwrap();
        let ctx = GateContext {
            clock: Arc::new(clock.clone()),
            random: Arc::new(SeededRandom::seeded(99)),
            identity: identity.clone(),
            notifier: notifier.clone(),
            credentials: Arc::new(MemoryCredentialStore::new()),
            facilities: facilities.clone(),
            access_log: log.clone(),
            admin_audit: Arc::new(MemoryAdminAuditLog::new()),
        };
        Self {
            ctx,
            clock,
            identity,
            facilities,
            log,
            notifier,
        }
    }

    pub fn issuance(&self) -> IssuanceService {
        IssuanceService::new(self.ctx.clone(), IssuancePolicy::default())
    }

    pub fn engine(&self) -> ValidationEngine {
        ValidationEngine::new(self.ctx.clone(), EnginePolicy::default())
    }

    pub async fn issue(&self, subject: &str) -> IssuedCredential {
        self.issuance()
            .issue(&SubjectId::new(subject).unwrap())
            .await
            .unwrap()
    }
}
