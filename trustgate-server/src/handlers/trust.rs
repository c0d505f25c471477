//! Trust check and MFA evaluation handlers
//!
//! The decision surface of the subsystem. `check` answers "is this device
//! currently trusted"; `evaluate` folds the trust-lookup result together
//! with request-scoped risk signals into a full MFA decision.
//!
//! The evaluate path is fail-closed: a registry failure yields a decision
//! requiring MFA, never a bare 500 that a caller might treat as "skip the
//! challenge".

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use trustgate_core::{MfaDecision, RiskFactors, RiskLevel};
use utoipa::ToSchema;

use crate::auth::AuthPrincipal;
use crate::error::ApiError;
use crate::handlers::devices::DeviceResponse;
use crate::handlers::AppState;

/// Request for a trust check
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrustCheckRequest {
    /// Client-generated device fingerprint
    #[schema(example = "fp-4f1c2a")]
    pub device_fingerprint: String,
}

/// Response for a trust check
#[derive(Debug, Serialize, ToSchema)]
pub struct TrustCheckResponse {
    pub success: bool,
    pub message: String,
    /// Whether the device currently satisfies a trust check
    pub trusted: bool,
    /// The governing record, when one exists
    pub device: Option<DeviceResponse>,
}

/// Check whether the caller's device is currently trusted
///
/// Refreshes the record's last-used timestamp on a successful check.
#[utoipa::path(
    post,
    path = "/api/v1/trust/check",
    tag = "Trust",
    request_body = TrustCheckRequest,
    responses(
        (status = 200, description = "Trust state for the fingerprint", body = TrustCheckResponse),
        (status = 400, description = "Missing fingerprint"),
        (status = 401, description = "Unauthorized")
    ),
    security(("session_token" = []))
)]
pub async fn check_trust_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(request): Json<TrustCheckRequest>,
) -> Result<Json<TrustCheckResponse>, ApiError> {
    if request.device_fingerprint.trim().is_empty() {
        return Err(ApiError::bad_request("device_fingerprint must not be empty"));
    }

    let mut device = state
        .devices
        .find_active(&principal.id, principal.kind, &request.device_fingerprint)
        .await?;

    if let Some(d) = device.as_mut() {
        if touch_last_used(&state, d.id).await {
            d.last_used = Some(Utc::now());
        }
    }

    // A shared-flagged record can only exist via data migration; it never
    // satisfies a trust check.
    let trusted = device.as_ref().is_some_and(|d| !d.is_shared_device);

    Ok(Json(TrustCheckResponse {
        success: true,
        message: if trusted {
            "Device is trusted".to_string()
        } else {
            "Device is not trusted".to_string()
        },
        trusted,
        device: device.map(DeviceResponse::from),
    }))
}

/// Request for an MFA evaluation
#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateMfaRequest {
    /// Client-generated device fingerprint
    #[schema(example = "fp-4f1c2a")]
    pub device_fingerprint: String,
    /// Action identifier being attempted
    #[schema(example = "payment.create")]
    pub action: Option<String>,
    /// Caller IP, recorded for audit
    #[schema(example = "203.0.113.9")]
    pub ip: Option<String>,
    /// Whether the sign-in comes from a location not seen before
    #[serde(default)]
    pub new_location: bool,
}

/// Response carrying the MFA decision and its reason trail
#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluateMfaResponse {
    pub success: bool,
    pub message: String,
    /// Whether a step-up MFA challenge is required
    pub require_mfa: bool,
    /// Human-readable reason trail
    pub reasons: Vec<String>,
    /// Coarse risk classification
    #[schema(value_type = String, example = "low")]
    pub risk_level: RiskLevel,
    /// The trust record consulted, when one exists
    pub trusted_device: Option<DeviceResponse>,
}

impl EvaluateMfaResponse {
    fn from_decision(decision: MfaDecision, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            require_mfa: decision.require_mfa,
            reasons: decision.reasons,
            risk_level: decision.risk_level,
            trusted_device: decision.trusted_device.map(DeviceResponse::from),
        }
    }
}

/// Decide whether the caller must complete a step-up MFA challenge
///
/// Trust reduces friction for routine use, but sensitive actions and
/// new-location sign-ins still require a challenge on trusted devices.
#[utoipa::path(
    post,
    path = "/api/v1/trust/evaluate",
    tag = "Trust",
    request_body = EvaluateMfaRequest,
    responses(
        (status = 200, description = "MFA decision with reason trail", body = EvaluateMfaResponse),
        (status = 400, description = "Missing fingerprint"),
        (status = 401, description = "Unauthorized")
    ),
    security(("session_token" = []))
)]
pub async fn evaluate_mfa_handler(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(request): Json<EvaluateMfaRequest>,
) -> Result<Json<EvaluateMfaResponse>, ApiError> {
    if request.device_fingerprint.trim().is_empty() {
        return Err(ApiError::bad_request("device_fingerprint must not be empty"));
    }

    let factors = RiskFactors {
        action: request.action,
        ip: request.ip,
        new_location: request.new_location,
    };

    let response = match state
        .devices
        .find_active(&principal.id, principal.kind, &request.device_fingerprint)
        .await
    {
        Ok(mut device) => {
            if let Some(d) = device.as_mut() {
                if touch_last_used(&state, d.id).await {
                    d.last_used = Some(Utc::now());
                }
            }
            let decision = state.policy.evaluate(device, &factors, Utc::now());
            EvaluateMfaResponse::from_decision(decision, "Risk evaluation complete")
        }
        Err(e) => {
            // Fail closed: MFA must never silently degrade to optional
            // because the registry could not be consulted.
            tracing::error!(error = %e, "Trust lookup failed, requiring MFA");
            let decision = MfaDecision::fail_closed(
                "trust evaluation unavailable: requiring multi-factor authentication",
            );
            EvaluateMfaResponse::from_decision(decision, "Risk evaluation degraded")
        }
    };

    Ok(Json(response))
}

/// Refresh last-used without failing the request: the trust answer is
/// already computed and a bookkeeping miss must not block sign-in.
/// Returns whether the refresh was recorded.
async fn touch_last_used(state: &AppState, device_id: uuid::Uuid) -> bool {
    match state.devices.touch_last_used(device_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(device_id = %device_id, error = %e, "Failed to refresh last_used");
            false
        }
    }
}
