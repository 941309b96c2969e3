//! Snapshot export and the per-scope cache

mod common;

use common::{ids, Campus};
use gate_core::{AccessLevel, FacilityId, GateError};
use gate_effects::MemoryCredentialStore;
use gate_offline::{SnapshotBuilder, SnapshotCache, SnapshotPolicy, SnapshotVerifier};
use gate_testkit::InterleavingCredentials;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn snapshot_carries_only_in_scope_permissions() {
    let campus = Campus::new().await;
    campus.issue("s-1").await;
    campus.issue("st-1").await;
    let snapshot = campus.builder().build(&ids(&["LIB"]), None).await.unwrap();

    assert_eq!(snapshot.body.facilities.len(), 1);
    assert_eq!(snapshot.body.credentials.len(), 2);
    let lib = FacilityId::new("LIB").unwrap();
    for record in &snapshot.body.credentials {
        assert!(record.permissions.iter().all(|p| p.facility_id == lib));
        assert!(record.integrity_ok);
        assert_eq!(record.secret_hash.len(), 64);
    }
    let levels: Vec<AccessLevel> = snapshot.body.credentials.iter().map(|r| r.access_level).collect();
    assert!(levels.contains(&AccessLevel::Staff));

    let verifier = SnapshotVerifier::from_hex(&campus.signer.verifier().to_hex()).unwrap();
    assert!(snapshot.verify(&verifier));
    assert!(snapshot.body.credentials.iter().all(|r| r.verify(&verifier)));
}

#[tokio::test]
async fn snapshot_round_trips_through_json() {
    let campus = Campus::new().await;
    campus.issue("s-1").await;
    let snapshot = campus.builder().build(&ids(&["LIB", "LAB"]), None).await.unwrap();

    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: gate_offline::OfflineCacheSnapshot = serde_json::from_str(&json).unwrap();
    assert!(parsed.verify(&campus.signer.verifier()));
    assert_eq!(parsed, snapshot);
}

#[tokio::test]
async fn ttl_defaults_and_clamps() {
    let campus = Campus::new().await;
    let builder = campus.builder();

    let default = builder.build(&ids(&["LIB"]), None).await.unwrap();
    assert_eq!(
        default.body.expires_at.since(default.body.generated_at),
        Duration::from_secs(600)
    );
    let clamped = builder
        .build(&ids(&["LIB"]), Some(Duration::from_secs(7_200)))
        .await
        .unwrap();
    assert_eq!(
        clamped.body.expires_at.since(clamped.body.generated_at),
        Duration::from_secs(3_600)
    );
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let campus = Campus::new().await;
    let builder = campus.builder();

    let empty = builder.build(&[], None).await.unwrap_err();
    assert!(matches!(empty, GateError::Invalid { .. }));
    let zero = builder.build(&ids(&["LIB"]), Some(Duration::ZERO)).await.unwrap_err();
    assert!(matches!(zero, GateError::Invalid { .. }));
    let unknown = builder.build(&ids(&["LIB", "GYM"]), None).await.unwrap_err();
    assert!(matches!(unknown, GateError::NotFound { .. }));
}

#[tokio::test]
async fn cache_reuses_until_refresh_interval_or_invalidation() {
    let campus = Campus::new().await;
    let cache = SnapshotCache::new(campus.builder(), Duration::from_secs(300));
    let scope = ids(&["LIB", "LAB"]);
    let reversed = ids(&["LAB", "LIB"]);

    let first = cache.get_or_build(&scope, None).await.unwrap();
    let again = cache.get_or_build(&reversed, None).await.unwrap();
    assert_eq!(first.body.id, again.body.id);
    assert_eq!(cache.len(), 1);

    cache.invalidate_all();
    assert!(cache.is_empty());
    let rebuilt = cache.get_or_build(&scope, None).await.unwrap();
    assert_ne!(rebuilt.body.id, first.body.id);

    campus.clock.advance(Duration::from_secs(301));
    let stale = cache.get_or_build(&scope, None).await.unwrap();
    assert_ne!(stale.body.id, rebuilt.body.id);
}

#[tokio::test]
async fn explicit_ttl_bypasses_the_cache() {
    let campus = Campus::new().await;
    let cache = SnapshotCache::new(campus.builder(), Duration::from_secs(300));
    let scope = ids(&["LIB"]);

    let cached = cache.get_or_build(&scope, None).await.unwrap();
    let custom = cache
        .get_or_build(&scope, Some(Duration::from_secs(120)))
        .await
        .unwrap();
    assert_ne!(cached.body.id, custom.body.id);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn refresh_rebuilds_every_cached_scope() {
    let campus = Campus::new().await;
    let cache = SnapshotCache::new(campus.builder(), Duration::from_secs(300));
    cache.warm(&[ids(&["LIB"]), ids(&["LAB"])]).await.unwrap();
    let before = cache.get_or_build(&ids(&["LIB"]), None).await.unwrap();

    assert_eq!(cache.refresh().await.unwrap(), 2);
    let after = cache.get_or_build(&ids(&["LIB"]), None).await.unwrap();
    assert_ne!(before.body.id, after.body.id);
}

/// Cache over a credential store that can run a callback mid-build
fn interleaved_cache(campus: &Campus) -> (Arc<SnapshotCache>, Arc<InterleavingCredentials>) {
    let store = Arc::new(InterleavingCredentials::new(Arc::new(MemoryCredentialStore::new())));
    let mut ctx = campus.ctx.clone();
    ctx.credentials = store.clone();
    let builder = SnapshotBuilder::new(ctx, campus.signer.clone(), SnapshotPolicy::default());
    (
        Arc::new(SnapshotCache::new(builder, Duration::from_secs(300))),
        store,
    )
}

#[tokio::test]
async fn build_overtaken_by_invalidation_is_not_cached() {
    let campus = Campus::new().await;
    let (cache, store) = interleaved_cache(&campus);
    let invalidating = cache.clone();
    store.during_next_scan(move || invalidating.invalidate_all());

    let served = cache.get_or_build(&ids(&["LIB"]), None).await.unwrap();
    assert!(cache.is_empty());

    let rebuilt = cache.get_or_build(&ids(&["LIB"]), None).await.unwrap();
    assert_ne!(served.body.id, rebuilt.body.id);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn refresh_overtaken_by_invalidation_stores_nothing() {
    let campus = Campus::new().await;
    let (cache, store) = interleaved_cache(&campus);
    cache.warm(&[ids(&["LIB"])]).await.unwrap();
    assert_eq!(cache.len(), 1);

    let invalidating = cache.clone();
    store.during_next_scan(move || invalidating.invalidate_all());
    assert_eq!(cache.refresh().await.unwrap(), 0);
    assert!(cache.is_empty());
}
