//! Device lifecycle handlers
//!
//! Registration, listing, revocation, extension, and renaming of trusted
//! devices for the authenticated principal. Ownership is enforced inside the
//! registry; a device id belonging to another principal behaves exactly like
//! an unknown id.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trustgate_core::{DeviceEnrollment, TrustedDevice};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthPrincipal;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::validation;

/// Device representation returned to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceResponse {
    /// Device record identifier
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Client-generated device fingerprint
    #[schema(example = "fp-4f1c2a")]
    pub device_fingerprint: String,
    /// Human label
    #[schema(example = "Office laptop")]
    pub device_name: String,
    /// Free-form descriptive payload, returned verbatim
    #[schema(example = "Firefox 128 on Windows 11")]
    pub device_info: String,
    /// Shared-device flag (never set via registration)
    pub is_shared_device: bool,
    /// Trust window end
    #[schema(value_type = String, example = "2026-09-05T10:00:00Z")]
    pub expires_at: DateTime<Utc>,
    /// Last successful trust check
    #[schema(value_type = Option<String>)]
    pub last_used: Option<DateTime<Utc>>,
    /// Soft-revocation flag
    pub revoked: bool,
    #[schema(value_type = Option<String>)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, example = "2026-08-06T10:00:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<TrustedDevice> for DeviceResponse {
    fn from(device: TrustedDevice) -> Self {
        Self {
            id: device.id,
            device_fingerprint: device.device_fingerprint,
            device_name: device.device_name,
            device_info: device.device_info,
            is_shared_device: device.is_shared_device,
            expires_at: device.expires_at,
            last_used: device.last_used,
            revoked: device.revoked,
            revoked_at: device.revoked_at,
            created_at: device.created_at,
        }
    }
}

/// Request for registering a trusted device
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterDeviceRequest {
    /// Client-generated device fingerprint
    #[schema(example = "fp-4f1c2a")]
    pub device_fingerprint: String,
    /// Human label for the device
    #[schema(example = "Office laptop")]
    pub device_name: String,
    /// Free-form descriptive payload (browser, OS, ...)
    #[schema(example = "Firefox 128 on Windows 11")]
    pub device_info: String,
    /// Whether the device is shared; shared devices are rejected
    #[serde(default)]
    pub is_shared_device: bool,
    /// Trust window in days (default 30, max 365)
    #[serde(default)]
    pub trust_duration_days: Option<i64>,
}

/// Response for device registration
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterDeviceResponse {
    pub success: bool,
    pub message: String,
    pub device: DeviceResponse,
}

/// Register the calling principal's device as trusted
///
/// Shared devices are categorically rejected: they may still be used, but
/// never marked trusted.
#[utoipa::path(
    post,
    path = "/api/v1/devices",
    tag = "Devices",
    request_body = RegisterDeviceRequest,
    responses(
        (status = 200, description = "Device registered", body = RegisterDeviceResponse),
        (status = 400, description = "Invalid input or shared device"),
        (status = 401, description = "Unauthorized")
    ),
    security(("session_token" = []))
)]
pub async fn register_device_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<RegisterDeviceResponse>, ApiError> {
    validation::validate_device_fields(
        &request.device_fingerprint,
        &request.device_name,
        &request.device_info,
    )?;

    let enrollment = DeviceEnrollment::new(
        request.device_fingerprint,
        request.device_name,
        request.device_info,
        request.is_shared_device,
        request.trust_duration_days,
    )?;

    let device = state
        .devices
        .register(&principal.id, principal.kind, &enrollment)
        .await?;

    tracing::info!(
        device_id = %device.id,
        owner_type = %principal.kind,
        trust_days = enrollment.trust_duration_days(),
        "Trusted device registered"
    );

    Ok(Json(RegisterDeviceResponse {
        success: true,
        message: "Device registered as trusted".to_string(),
        device: device.into(),
    }))
}

/// Query parameters for listing devices
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListDevicesQuery {
    /// Include revoked records (default: false)
    pub include_revoked: Option<bool>,
}

/// Response for device listing
#[derive(Debug, Serialize, ToSchema)]
pub struct ListDevicesResponse {
    pub success: bool,
    pub message: String,
    pub devices: Vec<DeviceResponse>,
}

/// List the calling principal's devices, newest first
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    tag = "Devices",
    params(ListDevicesQuery),
    responses(
        (status = 200, description = "Devices for the caller", body = ListDevicesResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("session_token" = []))
)]
pub async fn list_devices_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Query(query): Query<ListDevicesQuery>,
) -> Result<Json<ListDevicesResponse>, ApiError> {
    let devices = state
        .devices
        .list_for_owner(
            &principal.id,
            principal.kind,
            query.include_revoked.unwrap_or(false),
        )
        .await?;

    Ok(Json(ListDevicesResponse {
        success: true,
        message: format!("{} device(s)", devices.len()),
        devices: devices.into_iter().map(DeviceResponse::from).collect(),
    }))
}

/// Response for single-device revocation
#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeDeviceResponse {
    pub success: bool,
    pub message: String,
}

/// Revoke one of the calling principal's devices
///
/// Unknown ids, other principals' ids, and already-revoked ids all produce
/// the same 404.
#[utoipa::path(
    delete,
    path = "/api/v1/devices/{id}",
    tag = "Devices",
    params(("id" = String, Path, description = "Device record id (UUID)")),
    responses(
        (status = 200, description = "Device revoked", body = RevokeDeviceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Device not found")
    ),
    security(("session_token" = []))
)]
pub async fn revoke_device_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(device_id): Path<Uuid>,
) -> Result<Json<RevokeDeviceResponse>, ApiError> {
    let revoked = state
        .devices
        .revoke(device_id, &principal.id, principal.kind)
        .await?;

    if !revoked {
        return Err(ApiError::not_found("Device not found"));
    }

    tracing::info!(device_id = %device_id, "Trusted device revoked");

    Ok(Json(RevokeDeviceResponse {
        success: true,
        message: "Device revoked".to_string(),
    }))
}

/// Response for bulk revocation
#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAllDevicesResponse {
    pub success: bool,
    pub message: String,
    /// Number of records revoked
    pub revoked: u64,
}

/// Revoke every active device for the calling principal
///
/// "Sign out of all trusted devices."
#[utoipa::path(
    delete,
    path = "/api/v1/devices",
    tag = "Devices",
    responses(
        (status = 200, description = "Active devices revoked", body = RevokeAllDevicesResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("session_token" = []))
)]
pub async fn revoke_all_devices_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<RevokeAllDevicesResponse>, ApiError> {
    let revoked = state
        .devices
        .revoke_all(&principal.id, principal.kind)
        .await?;

    tracing::info!(count = revoked, "All trusted devices revoked for principal");

    Ok(Json(RevokeAllDevicesResponse {
        success: true,
        message: format!("{} device(s) revoked", revoked),
        revoked,
    }))
}

/// Request for extending a device's trust window
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtendDeviceRequest {
    /// Days added to the current expiry (1..=365)
    #[schema(example = 30)]
    pub additional_days: i64,
}

/// Response for trust-window extension
#[derive(Debug, Serialize, ToSchema)]
pub struct ExtendDeviceResponse {
    pub success: bool,
    pub message: String,
    /// The new trust window end
    #[schema(value_type = String)]
    pub expires_at: DateTime<Utc>,
}

/// Extend a device's trust window
///
/// Days are added to the current expiry, not to the current time.
#[utoipa::path(
    post,
    path = "/api/v1/devices/{id}/extend",
    tag = "Devices",
    params(("id" = String, Path, description = "Device record id (UUID)")),
    request_body = ExtendDeviceRequest,
    responses(
        (status = 200, description = "Trust window extended", body = ExtendDeviceResponse),
        (status = 400, description = "Invalid extension length"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Device not found")
    ),
    security(("session_token" = []))
)]
pub async fn extend_device_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(device_id): Path<Uuid>,
    Json(request): Json<ExtendDeviceRequest>,
) -> Result<Json<ExtendDeviceResponse>, ApiError> {
    validation::validate_additional_days(request.additional_days)?;

    let expires_at = state
        .devices
        .extend(
            device_id,
            &principal.id,
            principal.kind,
            request.additional_days,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    tracing::info!(
        device_id = %device_id,
        additional_days = request.additional_days,
        expires_at = %expires_at,
        "Trust window extended"
    );

    Ok(Json(ExtendDeviceResponse {
        success: true,
        message: format!("Trust extended by {} day(s)", request.additional_days),
        expires_at,
    }))
}

/// Request for renaming a device
#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameDeviceRequest {
    /// New human label
    #[schema(example = "Front desk workstation")]
    pub device_name: String,
}

/// Response for device renaming
#[derive(Debug, Serialize, ToSchema)]
pub struct RenameDeviceResponse {
    pub success: bool,
    pub message: String,
}

/// Rename one of the calling principal's devices
#[utoipa::path(
    post,
    path = "/api/v1/devices/{id}/rename",
    tag = "Devices",
    params(("id" = String, Path, description = "Device record id (UUID)")),
    request_body = RenameDeviceRequest,
    responses(
        (status = 200, description = "Device renamed", body = RenameDeviceResponse),
        (status = 400, description = "Invalid name"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Device not found")
    ),
    security(("session_token" = []))
)]
pub async fn rename_device_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(device_id): Path<Uuid>,
    Json(request): Json<RenameDeviceRequest>,
) -> Result<Json<RenameDeviceResponse>, ApiError> {
    validation::validate_device_name(&request.device_name)?;

    let renamed = state
        .devices
        .rename(
            device_id,
            &principal.id,
            principal.kind,
            request.device_name.trim(),
        )
        .await?;

    if !renamed {
        return Err(ApiError::not_found("Device not found"));
    }

    Ok(Json(RenameDeviceResponse {
        success: true,
        message: "Device renamed".to_string(),
    }))
}
