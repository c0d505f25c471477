//! Trustgate Core - trusted-device model and adaptive-MFA decision policy
//!
//! This crate holds the storage-agnostic half of the trusted-device
//! subsystem: the `TrustedDevice` record, the validated registration input
//! (`DeviceEnrollment`), and the `RiskPolicy` that decides, per request,
//! whether a step-up MFA challenge is required.
//!
//! The policy is fail-closed: a decision starts at "MFA required" and only
//! the explicit all-checks-passed branch clears it.
//!
//! # Example
//!
//! ```
//! use trustgate_core::{RiskFactors, RiskLevel, RiskPolicy};
//!
//! let policy = RiskPolicy::default();
//!
//! // No trust record for this fingerprint: MFA is required.
//! let decision = policy.evaluate(None, &RiskFactors::default(), chrono::Utc::now());
//! assert!(decision.require_mfa);
//! assert_eq!(decision.risk_level, RiskLevel::High);
//! ```

pub mod device;
pub mod error;
pub mod risk;

// Re-export main types for convenience
pub use device::{DeviceEnrollment, OwnerType, TrustedDevice, DEFAULT_TRUST_DAYS, MAX_TRUST_DAYS};
pub use error::{Result, TrustError};
pub use risk::{MfaDecision, RiskFactors, RiskLevel, RiskPolicy};
