//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 specification for the Trustgate API.

use utoipa::OpenApi;

use crate::handlers::{
    DeviceResponse, EvaluateMfaRequest, EvaluateMfaResponse, ExtendDeviceRequest,
    ExtendDeviceResponse, HealthResponse, ListDevicesResponse, ReadyResponse,
    RegisterDeviceRequest, RegisterDeviceResponse, RenameDeviceRequest, RenameDeviceResponse,
    RevokeAllDevicesResponse, RevokeDeviceResponse, StatsResponse, TrustCheckRequest,
    TrustCheckResponse,
};

/// Trustgate API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trustgate API",
        version = "0.1.0",
        description = r#"
## Trusted Device & Adaptive MFA API

Trustgate manages per-principal trusted devices and decides, per request,
whether a step-up MFA challenge is required:

- **Device registry** - time-bounded trust grants, soft revocation, audit retention
- **Trust checks** - "is this fingerprint currently trusted for this principal?"
- **Risk evaluation** - trust state combined with action sensitivity and
  location signals; fail-closed on any internal failure
- **Lifecycle operations** - register, list, revoke (single/all), extend, rename

All device operations are scoped to the authenticated principal; another
principal's device ids are indistinguishable from unknown ids.
"#,
        license(
            name = "MIT OR Apache-2.0",
            url = "https://github.com/trustgate/trustgate/blob/main/LICENSE"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Devices", description = "Trusted-device lifecycle operations"),
        (name = "Trust", description = "Trust checks and adaptive MFA decisions"),
        (name = "Admin", description = "Role-gated registry statistics"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::devices::register_device_handler,
        crate::handlers::devices::list_devices_handler,
        crate::handlers::devices::revoke_device_handler,
        crate::handlers::devices::revoke_all_devices_handler,
        crate::handlers::devices::extend_device_handler,
        crate::handlers::devices::rename_device_handler,
        crate::handlers::trust::check_trust_handler,
        crate::handlers::trust::evaluate_mfa_handler,
        crate::handlers::admin::get_stats_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            DeviceResponse,
            RegisterDeviceRequest,
            RegisterDeviceResponse,
            ListDevicesResponse,
            RevokeDeviceResponse,
            RevokeAllDevicesResponse,
            ExtendDeviceRequest,
            ExtendDeviceResponse,
            RenameDeviceRequest,
            RenameDeviceResponse,
            TrustCheckRequest,
            TrustCheckResponse,
            EvaluateMfaRequest,
            EvaluateMfaResponse,
            StatsResponse,
        )
    )
)]
pub struct ApiDoc;
