#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use gate_access::GateContext;
use gate_core::effects::AccessLogStore;
use gate_effects::{MemoryAdminAuditLog, MemoryCredentialStore, MemoryFacilityStore};
use gate_server::{router, AppState, GateConfig, SeedData};
use gate_testkit::fixtures::{campus_directory, library, research_lab, tuesday_at};
use gate_testkit::{ManualClock, RecordingNotifier, SeededRandom};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SEED_HEX: &str = "2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a";

pub fn config() -> GateConfig {
    let mut config = GateConfig::default();
    config.offline.signing_seed_hex = Some(SEED_HEX.to_string());
    config
}

pub struct TestServer {
    pub state: AppState,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestServer {
    /// LIB and LAB defined, campus directory loaded, Tuesday 10:00 UTC
    pub async fn new() -> Self {
        Self::with_log(Arc::new(gate_effects::MemoryAccessLog::new())).await
    }

    pub async fn with_log(access_log: Arc<dyn AccessLogStore>) -> Self {
        let clock = ManualClock::at(tuesday_at(10, 0));
        let notifier = Arc::new(RecordingNotifier::new());
        let identity = Arc::new(campus_directory());
        let ctx = GateContext {
            clock: Arc::new(clock.clone()),
            random: Arc::new(SeededRandom::seeded(5)),
            identity: identity.clone(),
            notifier: notifier.clone(),
            credentials: Arc::new(MemoryCredentialStore::new()),
            facilities: Arc::new(MemoryFacilityStore::new()),
            access_log,
            admin_audit: Arc::new(MemoryAdminAuditLog::new()),
        };
        let state = AppState::assemble(&config(), ctx, identity).unwrap();
        SeedData {
            subjects: Vec::new(),
            facilities: vec![library(), research_lab()],
        }
        .apply(&state)
        .await
        .unwrap();
        Self {
            state,
            clock,
            notifier,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        actor: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(gate_server::api::SUBJECT_HEADER, actor);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str, actor: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, actor, None).await
    }

    pub async fn post(&self, uri: &str, actor: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, actor, Some(body)).await
    }

    /// Issue for `subject` and return the QR payload
    pub async fn issue(&self, subject: &str) -> String {
        let (status, body) = self
            .post(
                "/api/credentials/issue",
                Some(subject),
                serde_json::json!({ "subject_id": subject }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["qr_payload"].as_str().unwrap().to_string()
    }

    pub async fn scan(&self, qr: &str, facility: &str, device: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/access/validate",
                None,
                serde_json::json!({
                    "qr_payload": qr,
                    "facility_id": facility,
                    "device": { "device_id": device },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}
