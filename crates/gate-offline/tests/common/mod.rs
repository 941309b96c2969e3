#![allow(dead_code)]

use gate_access::{
    CredentialAdmin, EnginePolicy, GateContext, IssuancePolicy, IssuanceService, IssuedCredential,
    LockdownController, ValidationEngine,
};
use gate_core::effects::FacilityStore;
use gate_core::{FacilityId, SubjectId};
use gate_effects::{
    MemoryAdminAuditLog, MemoryCredentialStore, MemoryFacilityStore, StaticIdentityDirectory,
};
use gate_offline::{
    LogSynchronizer, OfflineScanner, SnapshotBuilder, SnapshotPolicy, SnapshotSigner,
};
use gate_testkit::fixtures::{campus_directory, device, library, research_lab, tuesday_at};
use gate_testkit::{FailingAccessLog, ManualClock, RecordingNotifier, SeededRandom};
use std::sync::Arc;
use std::time::Duration;

pub const SEED: [u8; 32] = [42u8; 32];

pub struct Campus {
    pub ctx: GateContext,
    pub clock: ManualClock,
    pub identity: Arc<StaticIdentityDirectory>,
    pub facilities: Arc<MemoryFacilityStore>,
    pub log: Arc<FailingAccessLog>,
    pub signer: Arc<SnapshotSigner>,
}

impl Campus {
    /// LIB and LAB seeded, clock at Tuesday 10:00 UTC
    pub async fn new() -> Self {
        let clock = ManualClock::at(tuesday_at(10, 0));
        let identity = Arc::new(campus_directory());
        let facilities = Arc::new(MemoryFacilityStore::new());
        let log = Arc::new(FailingAccessLog::default());
        facilities.upsert(library()).await.unwrap();
        facilities.upsert(research_lab()).await.unwrap();
        let ctx = GateContext {
            clock: Arc::new(clock.clone()),
            random: Arc::new(SeededRandom::seeded(11)),
            identity: identity.clone(),
            notifier: Arc::new(RecordingNotifier::new()),
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
            signer: Arc::new(SnapshotSigner::from_seed(SEED)),
        }
    }

    pub fn engine(&self) -> ValidationEngine {
        ValidationEngine::new(self.ctx.clone(), EnginePolicy::default())
    }

    pub fn builder(&self) -> SnapshotBuilder {
        SnapshotBuilder::new(self.ctx.clone(), self.signer.clone(), SnapshotPolicy::default())
    }

    pub fn synchronizer(&self) -> LogSynchronizer {
        LogSynchronizer::new(self.ctx.clone(), Duration::from_secs(300))
    }

    pub fn lockdown(&self) -> LockdownController {
        LockdownController::new(self.ctx.clone())
    }

    pub fn admin(&self) -> CredentialAdmin {
        CredentialAdmin::new(self.ctx.clone())
    }

    pub async fn issue(&self, subject: &str) -> IssuedCredential {
        IssuanceService::new(self.ctx.clone(), IssuancePolicy::default())
            .issue(&SubjectId::new(subject).unwrap())
            .await
            .unwrap()
    }

    /// Scanner sharing the campus clock, provisioned with the verifying key
    pub fn scanner(&self, device_id: &str) -> OfflineScanner {
        OfflineScanner::new(
            device(device_id),
            self.signer.verifier(),
            Arc::new(self.clock.clone()),
            Arc::new(SeededRandom::seeded(device_id.len() as u64 + 1000)),
        )
    }
}

pub fn ids(raw: &[&str]) -> Vec<FacilityId> {
    raw.iter().map(|id| FacilityId::new(*id).unwrap()).collect()
}
