//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible
//! defaults. The sensitive-action set and the legacy employee-domain fallback
//! are environment-driven rather than hard-coded.

use std::net::SocketAddr;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 1)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL connection string; falls back to in-memory registry when unset
    pub database_url: Option<String>,
    /// Identity provider JWKS URL for RS256 session tokens
    pub session_jwks_url: Option<String>,
    /// HS256 shared secret for session tokens (development/tests)
    pub session_jwt_secret: Option<String>,
    /// Email domain mapped to the employee namespace when a token lacks
    /// an explicit principal_type claim (legacy fallback, off by default)
    pub legacy_employee_domain: Option<String>,
    /// Override of the built-in sensitive-action identifiers
    pub sensitive_actions: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 1,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            session_jwks_url: None,
            session_jwt_secret: None,
            legacy_employee_domain: None,
            sensitive_actions: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| parse_csv(&origins));

        let body_limit_mb = std::env::var("BODY_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        // Rate limiting enabled by default in production, can be disabled
        // with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limit_per_sec = std::env::var("RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let rate_limit_burst = std::env::var("RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let session_jwks_url = std::env::var("SESSION_JWKS_URL")
            .ok()
            .filter(|v| !v.is_empty());

        let session_jwt_secret = std::env::var("SESSION_JWT_SECRET")
            .ok()
            .filter(|v| !v.is_empty());

        let legacy_employee_domain = std::env::var("LEGACY_EMPLOYEE_DOMAIN")
            .ok()
            .map(|v| v.trim().trim_start_matches('@').to_lowercase())
            .filter(|v| !v.is_empty());

        let sensitive_actions = std::env::var("SENSITIVE_ACTIONS")
            .ok()
            .map(|v| parse_csv(&v))
            .filter(|v| !v.is_empty());

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb,
            timeout_secs,
            rate_limit_enabled,
            rate_limit_per_sec,
            rate_limit_burst,
            database_url,
            session_jwks_url,
            session_jwt_secret,
            legacy_employee_domain,
            sensitive_actions,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(!config.rate_limit_enabled);
        assert!(config.database_url.is_none());
        assert!(config.session_jwt_secret.is_none());
        assert!(config.legacy_employee_domain.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            port: 8080,
            host: [0, 0, 0, 0],
            ..Config::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_csv_trims_and_drops_empty() {
        assert_eq!(
            parse_csv(" a , b ,, c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_csv("  ").is_empty());
    }
}
