//! Route handlers
//!
//! Callers identify themselves with the `x-subject-id` header; the services
//! decide what that subject may do. Authentication happens upstream.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use gate_access::{AccessRequest, Decision, DetectionQuery, Incident, IssuedCredential};
use gate_core::{
    AccessLogEntry, AccessLogFilter, AdminAuditEvent, CredentialId, DeviceInfo, Facility,
    FacilityId, FacilityPermission, LockdownState, Page, SubjectId, Timestamp,
};
use gate_offline::{OfflineCacheSnapshot, ScanContext, SyncReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the authenticated caller
pub const SUBJECT_HEADER: &str = "x-subject-id";

fn actor(headers: &HeaderMap) -> Result<SubjectId, ApiError> {
    let raw = headers
        .get(SUBJECT_HEADER)
        .ok_or_else(|| ApiError::forbidden(format!("missing {SUBJECT_HEADER} header")))?
        .to_str()
        .map_err(|_| ApiError::bad_request(format!("{SUBJECT_HEADER} is not valid text")))?;
    Ok(SubjectId::new(raw)?)
}

fn credential_id(raw: &str) -> Result<CredentialId, ApiError> {
    Ok(raw.parse::<CredentialId>()?)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Deserialize)]
pub struct IssueBody {
    pub subject_id: SubjectId,
}

/// Subjects issue for themselves; admins may issue for anyone
pub async fn issue_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IssueBody>,
) -> ApiResult<IssuedCredential> {
    let actor = actor(&headers)?;
    Ok(Json(state.issuance.issue_as(&actor, &body.subject_id).await?))
}

pub async fn rotate_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<IssuedCredential> {
    let actor = actor(&headers)?;
    let id = credential_id(&id)?;
    let issued = state.issuance.rotate_secret_as(&actor, &id).await?;
    state.snapshots.invalidate_all();
    Ok(Json(issued))
}

#[derive(Debug, Deserialize)]
pub struct RevokeBody {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialStatus {
    pub credential_id: CredentialId,
    pub active: bool,
    pub permissions: Vec<FacilityPermission>,
}

impl CredentialStatus {
    fn of(credential: &gate_core::Credential) -> Self {
        Self {
            credential_id: credential.id,
            active: credential.active,
            permissions: credential.permissions.clone(),
        }
    }
}

pub async fn revoke_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RevokeBody>,
) -> ApiResult<CredentialStatus> {
    let actor = actor(&headers)?;
    let id = credential_id(&id)?;
    let credential = state.credentials.revoke(&actor, &id, &body.reason).await?;
    state.snapshots.invalidate_all();
    Ok(Json(CredentialStatus::of(&credential)))
}

pub async fn grant_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(permission): Json<FacilityPermission>,
) -> ApiResult<CredentialStatus> {
    let actor = actor(&headers)?;
    let id = credential_id(&id)?;
    let credential = state
        .credentials
        .grant_permission(&actor, &id, permission)
        .await?;
    state.snapshots.invalidate_all();
    Ok(Json(CredentialStatus::of(&credential)))
}

pub async fn remove_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, facility_id)): Path<(String, String)>,
) -> ApiResult<CredentialStatus> {
    let actor = actor(&headers)?;
    let id = credential_id(&id)?;
    let facility_id = FacilityId::new(facility_id)?;
    let credential = state
        .credentials
        .remove_permission(&actor, &id, &facility_id)
        .await?;
    state.snapshots.invalidate_all();
    Ok(Json(CredentialStatus::of(&credential)))
}

pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<AccessRequest>,
) -> ApiResult<Decision> {
    Ok(Json(state.engine.validate(request).await))
}

#[derive(Debug, Deserialize)]
pub struct OfflineValidateBody {
    pub qr_payload: String,
    pub facility_id: FacilityId,
    pub device: DeviceInfo,
    pub snapshot: OfflineCacheSnapshot,
}

/// Offline decision plus the entry the device must buffer for sync
#[derive(Debug, Serialize)]
pub struct OfflineDecision {
    #[serde(flatten)]
    pub decision: Decision,
    pub entry: AccessLogEntry,
}

pub async fn validate_offline(
    State(state): State<AppState>,
    Json(body): Json<OfflineValidateBody>,
) -> ApiResult<OfflineDecision> {
    let scan = ScanContext {
        now: state.ctx.now().await?,
        entry_id: state.ctx.next_entry_id().await,
        prior_attempts: 0,
        local_occupancy: None,
    };
    let request = AccessRequest {
        qr_payload: body.qr_payload,
        facility_id: body.facility_id,
        device: body.device,
    };
    let entry = state.offline.validate(&request, &body.snapshot, &scan);
    Ok(Json(OfflineDecision {
        decision: Decision::from_entry(&entry),
        entry,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExitBody {
    pub facility_id: FacilityId,
}

#[derive(Debug, Serialize)]
pub struct Occupancy {
    pub facility_id: FacilityId,
    pub occupancy: u32,
}

pub async fn record_exit(
    State(state): State<AppState>,
    Json(body): Json<ExitBody>,
) -> ApiResult<Occupancy> {
    state.registry.get(&body.facility_id).await?;
    let occupancy = state.registry.record_exit(&body.facility_id).await?;
    Ok(Json(Occupancy {
        facility_id: body.facility_id,
        occupancy,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    pub entries: Vec<AccessLogEntry>,
}

pub async fn sync_offline_logs(
    State(state): State<AppState>,
    Json(body): Json<SyncBody>,
) -> ApiResult<SyncReport> {
    Ok(Json(state.sync.sync(body.entries).await?))
}

#[derive(Debug, Deserialize)]
pub struct CacheParams {
    /// Comma-separated facility ids
    pub facility_ids: String,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

pub async fn offline_cache(
    State(state): State<AppState>,
    Query(params): Query<CacheParams>,
) -> ApiResult<OfflineCacheSnapshot> {
    let ids = params
        .facility_ids
        .split(',')
        .filter(|raw| !raw.trim().is_empty())
        .map(FacilityId::new)
        .collect::<gate_core::Result<Vec<_>>>()?;
    let snapshot = state
        .snapshots
        .get_or_build(&ids, params.ttl_secs.map(Duration::from_secs))
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct LockdownBody {
    pub facility_ids: Vec<FacilityId>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlockBody {
    pub facility_ids: Vec<FacilityId>,
}

#[derive(Debug, Serialize)]
pub struct LockdownChange {
    pub facility_ids: Vec<FacilityId>,
    pub lockdown: bool,
}

pub async fn lockdown(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LockdownBody>,
) -> ApiResult<LockdownChange> {
    let actor = actor(&headers)?;
    let facility_ids = state
        .lockdown
        .activate(&actor, &body.facility_ids, &body.reason)
        .await?;
    state.snapshots.invalidate_all();
    Ok(Json(LockdownChange {
        facility_ids,
        lockdown: true,
    }))
}

pub async fn unlock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UnlockBody>,
) -> ApiResult<LockdownChange> {
    let actor = actor(&headers)?;
    let facility_ids = state.lockdown.lift(&actor, &body.facility_ids).await?;
    state.snapshots.invalidate_all();
    Ok(Json(LockdownChange {
        facility_ids,
        lockdown: false,
    }))
}

pub async fn lockdown_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<LockdownState> {
    let id = FacilityId::new(id)?;
    Ok(Json(state.lockdown.state(&id).await?))
}

pub async fn suspicious_activity(
    State(state): State<AppState>,
    Query(query): Query<DetectionQuery>,
) -> ApiResult<Vec<Incident>> {
    Ok(Json(state.detector.scan(&query).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub facility_id: Option<String>,
    /// Milliseconds since the epoch, inclusive
    #[serde(default)]
    pub from: Option<u64>,
    /// Milliseconds since the epoch, exclusive
    #[serde(default)]
    pub to: Option<u64>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

impl HistoryParams {
    fn into_filter(self) -> gate_core::Result<AccessLogFilter> {
        Ok(AccessLogFilter {
            subject_id: self.subject_id.map(SubjectId::new).transpose()?,
            facility_id: self.facility_id.map(FacilityId::new).transpose()?,
            from: self.from.map(Timestamp::from_millis),
            to: self.to.map(Timestamp::from_millis),
            offset: self.offset,
            limit: self.limit,
        })
    }
}

pub async fn access_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Page<AccessLogEntry>> {
    let filter = params.into_filter()?;
    Ok(Json(state.history.query(filter).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

pub async fn admin_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<AdminAuditEvent>> {
    let actor = actor(&headers)?;
    Ok(Json(
        state
            .history
            .admin_audit(&actor, params.offset, params.limit)
            .await?,
    ))
}

pub async fn list_facilities(State(state): State<AppState>) -> ApiResult<Vec<Facility>> {
    Ok(Json(state.registry.list().await?))
}

pub async fn get_facility(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Facility> {
    let id = FacilityId::new(id)?;
    Ok(Json(state.registry.get(&id).await?))
}
