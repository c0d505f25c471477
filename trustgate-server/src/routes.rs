//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application
//! router.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{
    check_trust_handler, evaluate_mfa_handler, extend_device_handler, get_stats_handler, health,
    list_devices_handler, ready, register_device_handler, rename_device_handler,
    revoke_all_devices_handler, revoke_device_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router with custom configuration
pub fn create_router(state: AppState, config: &Config) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::new(Duration::from_secs(config.timeout_secs));

    // Base router with common layers
    let router = Router::new()
        .route(
            "/api/v1/devices",
            post(register_device_handler)
                .get(list_devices_handler)
                .delete(revoke_all_devices_handler),
        )
        .route("/api/v1/devices/{id}", delete(revoke_device_handler))
        .route("/api/v1/devices/{id}/extend", post(extend_device_handler))
        .route("/api/v1/devices/{id}/rename", post(rename_device_handler))
        .route("/api/v1/trust/check", post(check_trust_handler))
        .route("/api/v1/trust/evaluate", post(evaluate_mfa_handler))
        .route("/api/v1/admin/stats", get(get_stats_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    if config.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_sec)
            .burst_size(config.rate_limit_burst)
            .finish()
            .expect("Failed to build rate limiter config");

        tracing::info!(
            "Rate limiting: {} req/s (burst: {})",
            config.rate_limit_per_sec,
            config.rate_limit_burst
        );

        router
            .layer(GovernorLayer::new(Arc::new(governor_conf)))
            .layer(TraceLayer::new_for_http())
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router.layer(TraceLayer::new_for_http())
    }
}
