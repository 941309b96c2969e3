//! HTTP API

pub mod error;
pub mod handlers;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::{ApiError, ApiResult};
pub use handlers::SUBJECT_HEADER;

/// Every route, with tracing and CORS layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/credentials/issue", post(handlers::issue_credential))
        .route("/api/credentials/:id/rotate", post(handlers::rotate_secret))
        .route("/api/credentials/:id/revoke", post(handlers::revoke_credential))
        .route("/api/credentials/:id/permissions", put(handlers::grant_permission))
        .route(
            "/api/credentials/:id/permissions/:facility_id",
            delete(handlers::remove_permission),
        )
        .route("/api/access/validate", post(handlers::validate))
        .route("/api/access/validate-offline", post(handlers::validate_offline))
        .route("/api/access/exit", post(handlers::record_exit))
        .route("/api/access/history", get(handlers::access_history))
        .route("/api/offline/cache", get(handlers::offline_cache))
        .route("/api/offline/sync", post(handlers::sync_offline_logs))
        .route("/api/emergency/lockdown", post(handlers::lockdown))
        .route("/api/emergency/unlock", post(handlers::unlock))
        .route("/api/emergency/state/:id", get(handlers::lockdown_state))
        .route("/api/security/suspicious-activity", get(handlers::suspicious_activity))
        .route("/api/admin/audit", get(handlers::admin_audit))
        .route("/api/facilities", get(handlers::list_facilities))
        .route("/api/facilities/:id", get(handlers::get_facility))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
