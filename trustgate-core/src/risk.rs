//! Adaptive-MFA risk policy.
//!
//! Combines the trust-lookup result with request-scoped risk signals to decide
//! whether a step-up MFA challenge is required. The decision is fail-closed by
//! construction: it starts at `require_mfa = true` and only the explicit
//! all-checks-passed branch clears it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::TrustedDevice;

/// Coarse risk classification attached to every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Request-scoped risk signals supplied by the caller.
///
/// `ip` is carried for audit logging only; the policy itself keys off the
/// action identifier and the new-location flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskFactors {
    pub action: Option<String>,
    pub ip: Option<String>,
    pub new_location: bool,
}

/// Outcome of a risk evaluation: the MFA verdict plus its reason trail.
#[derive(Debug, Clone, Serialize)]
pub struct MfaDecision {
    pub require_mfa: bool,
    pub reasons: Vec<String>,
    pub risk_level: RiskLevel,
    pub trusted_device: Option<TrustedDevice>,
}

impl MfaDecision {
    /// The storage-failure fallback: MFA must never degrade to optional when
    /// the registry cannot be consulted.
    pub fn fail_closed(reason: impl Into<String>) -> Self {
        Self {
            require_mfa: true,
            reasons: vec![reason.into()],
            risk_level: RiskLevel::High,
            trusted_device: None,
        }
    }
}

/// Default sensitive-action identifiers (destructive or financial operations).
const DEFAULT_SENSITIVE_ACTIONS: &[&str] = &[
    "billing.update",
    "payment.create",
    "payout.approve",
    "password.change",
    "mfa.disable",
    "devices.revoke_all",
    "account.delete",
];

/// The decision policy over trust state and risk factors.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    sensitive_actions: HashSet<String>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_ACTIONS.iter().map(|s| s.to_string()))
    }
}

impl RiskPolicy {
    /// Build a policy with a custom sensitive-action set.
    pub fn new(sensitive_actions: impl IntoIterator<Item = String>) -> Self {
        Self {
            sensitive_actions: sensitive_actions
                .into_iter()
                .map(|a| a.trim().to_ascii_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, action: &str) -> bool {
        self.sensitive_actions
            .contains(&action.trim().to_ascii_lowercase())
    }

    /// Decide whether step-up MFA is required.
    ///
    /// `device` is the trust-lookup result for the requesting fingerprint (or
    /// `None` when no record matched). Risk factors are evaluated
    /// independently of trust state: trust reduces friction for routine use
    /// but does not exempt sensitive actions or new-location sign-ins.
    pub fn evaluate(
        &self,
        device: Option<TrustedDevice>,
        factors: &RiskFactors,
        now: DateTime<Utc>,
    ) -> MfaDecision {
        let mut reasons = Vec::new();
        let mut factor_hits = 0usize;

        let active = device.as_ref().is_some_and(|d| d.is_active(now));
        // The registry refuses to register shared devices, but records can
        // still arrive via data migrations. Defend here rather than assume
        // the registration invariant holds.
        let shared = active && device.as_ref().is_some_and(|d| d.is_shared_device);

        if !active {
            reasons.push("device not trusted: no active trust record for this fingerprint".to_string());
        } else if shared {
            reasons.push("shared device: persistent trust is not honored on shared devices".to_string());
        }

        if let Some(action) = factors.action.as_deref() {
            if self.is_sensitive(action) {
                reasons.push(format!(
                    "sensitive action '{}' requires step-up verification",
                    action
                ));
                factor_hits += 1;
            }
        }
        if factors.new_location {
            reasons.push("sign-in from a new location".to_string());
            factor_hits += 1;
        }

        let mut decision = MfaDecision {
            require_mfa: true,
            reasons,
            risk_level: RiskLevel::High,
            trusted_device: device,
        };

        if decision.reasons.is_empty() {
            // Explicit all-clear: active, non-shared device and no elevated
            // risk factors.
            decision.require_mfa = false;
            decision.risk_level = RiskLevel::Low;
        } else if active && !shared {
            decision.risk_level = if factor_hits >= 2 {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
        }

        tracing::debug!(
            require_mfa = decision.require_mfa,
            risk_level = ?decision.risk_level,
            reason_count = decision.reasons.len(),
            ip = factors.ip.as_deref().unwrap_or("-"),
            "risk evaluation complete"
        );

        decision
    }
}
