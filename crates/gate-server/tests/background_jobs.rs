//! Background job registry and the periodic tasks it drives

mod common;

use common::TestServer;
use gate_effects::RealTimeHandler;
use gate_server::jobs::{refresh_snapshots, replay_fallback_once, JobRegistry};
use gate_testkit::fixtures::facility_id;
use gate_testkit::FailingAccessLog;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn interval_job_stops_when_it_returns_false() {
    let server = TestServer::new().await;
    let registry = JobRegistry::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    registry.spawn_interval_until(
        "countdown",
        Arc::new(server.clock.clone()),
        Duration::from_secs(30),
        move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 }
        },
    );

    while registry.running() > 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn shutdown_stops_sleeping_jobs() {
    let registry = JobRegistry::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    registry.spawn_interval_until(
        "slow",
        Arc::new(RealTimeHandler::new()),
        Duration::from_secs(3_600),
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        },
    );

    while runs.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(registry.running(), 1);
    registry.shutdown();
    assert_eq!(registry.running(), 0);
    tokio::task::yield_now().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fallback_entries_are_replayed_once_the_log_recovers() {
    let log = Arc::new(FailingAccessLog::failing());
    let server = TestServer::with_log(log.clone()).await;
    let qr = server.issue("s-1").await;

    let decision = server.scan(&qr, "LIB", "gate-1").await;
    assert_eq!(decision["reason"], "system_unavailable");
    assert_eq!(server.state.engine.fallback_len(), 1);

    assert_eq!(replay_fallback_once(&server.state).await, 0);
    assert_eq!(server.state.engine.fallback_len(), 1);

    log.set_failing(false);
    assert_eq!(replay_fallback_once(&server.state).await, 1);
    assert_eq!(server.state.engine.fallback_len(), 0);
    assert_eq!(log.entries().len(), 1);

    assert_eq!(replay_fallback_once(&server.state).await, 0);
}

#[tokio::test]
async fn refresh_warms_configured_scopes() {
    let server = TestServer::new().await;
    assert!(server.state.snapshots.is_empty());

    let scopes = vec![vec![facility_id("LIB")], vec![facility_id("LIB"), facility_id("LAB")]];
    refresh_snapshots(&server.state, &scopes).await.unwrap();
    assert_eq!(server.state.snapshots.len(), 2);

    let missing = vec![vec![facility_id("NOPE")]];
    assert!(refresh_snapshots(&server.state, &missing).await.is_err());
}
