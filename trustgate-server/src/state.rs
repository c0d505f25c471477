//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use trustgate_core::RiskPolicy;

use crate::auth::{AuthConfigError, AuthVerifier};
use crate::config::Config;
use crate::registry::{DeviceStore, StorageError};

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Device registry (PostgreSQL or in-memory fallback)
    pub devices: Arc<DeviceStore>,
    /// Session-token verifier
    pub verifier: Arc<AuthVerifier>,
    /// Adaptive-MFA decision policy
    pub policy: Arc<RiskPolicy>,
}

/// Raised when shared state cannot be assembled at startup
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthConfigError),
}

impl AppState {
    /// Assemble state from configuration: connect (and migrate) the registry
    /// backend, pick the session key source, and build the risk policy.
    pub async fn from_config(config: &Config) -> Result<Self, StateError> {
        let devices = DeviceStore::from_config(config.database_url.as_deref()).await?;
        let verifier = AuthVerifier::from_config(config)?;

        let policy = match &config.sensitive_actions {
            Some(actions) => RiskPolicy::new(actions.iter().cloned()),
            None => RiskPolicy::default(),
        };

        Ok(Self {
            devices: Arc::new(devices),
            verifier: Arc::new(verifier),
            policy: Arc::new(policy),
        })
    }
}
