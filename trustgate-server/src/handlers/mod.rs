//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod admin;
pub mod devices;
pub mod health;
pub mod trust;

pub use crate::state::AppState;
pub use admin::{get_stats_handler, StatsResponse};
pub use devices::{
    extend_device_handler, list_devices_handler, register_device_handler, rename_device_handler,
    revoke_all_devices_handler, revoke_device_handler, DeviceResponse, ExtendDeviceRequest,
    ExtendDeviceResponse, ListDevicesResponse, RegisterDeviceRequest, RegisterDeviceResponse,
    RenameDeviceRequest, RenameDeviceResponse, RevokeAllDevicesResponse, RevokeDeviceResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use trust::{
    check_trust_handler, evaluate_mfa_handler, EvaluateMfaRequest, EvaluateMfaResponse,
    TrustCheckRequest, TrustCheckResponse,
};
