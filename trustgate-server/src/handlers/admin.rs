//! Administrative handlers
//!
//! Aggregate registry statistics, gated on the admin role rather than on
//! record ownership.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::handlers::AppState;

/// Registry statistics response
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub success: bool,
    pub message: String,
    /// All records, including revoked and expired
    pub total: u64,
    /// Non-revoked records inside their trust window
    pub active: u64,
    pub revoked: u64,
    /// Non-revoked records past their expiry
    pub expired: u64,
    /// Records carrying the shared-device flag
    pub shared_flagged: u64,
    /// Whether the backing store survives restarts
    pub persistent: bool,
}

/// Get aggregate registry counts
#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Registry statistics", body = StatsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Administrator role required")
    ),
    security(("session_token" = []))
)]
pub async fn get_stats_handler(
    State(state): State<AppState>,
    AdminPrincipal(principal): AdminPrincipal,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.devices.stats().await?;

    tracing::debug!(admin = %principal.id, "Registry stats requested");

    Ok(Json(StatsResponse {
        success: true,
        message: "Registry statistics".to_string(),
        total: stats.total,
        active: stats.active,
        revoked: stats.revoked,
        expired: stats.expired,
        shared_flagged: stats.shared_flagged,
        persistent: stats.persistent,
    }))
}
