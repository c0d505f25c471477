//! Session-token authentication module
//!
//! Provides the `AuthPrincipal` and `AdminPrincipal` extractors for axum
//! handlers. This subsystem does not authenticate users itself: it consumes
//! already-issued session tokens from the identity provider and derives the
//! `(principal id, principal type)` pair every registry operation is scoped
//! by.
//!
//! Two key sources:
//! - **JWKS** (production): RS256 tokens validated against the identity
//!   provider's JSON Web Key Set, fetched over HTTPS and cached with a
//!   1-hour TTL.
//! - **Shared secret** (development/tests): HS256 tokens validated with a
//!   secret from `SESSION_JWT_SECRET`.
//!
//! The principal type is an explicit `principal_type` claim. The legacy
//! email-domain heuristic from the previous generation of this service is
//! available only as an opt-in fallback via `LEGACY_EMPLOYEE_DOMAIN`.

use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, jwk, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use trustgate_core::OwnerType;

use crate::config::Config;
use crate::error::ApiError;
use crate::state::AppState;

/// JWKS cache TTL (1 hour)
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Session-token claims issued by the identity provider
#[derive(Debug, Deserialize)]
struct SessionClaims {
    /// Subject (principal id)
    sub: String,
    /// Expiration time (validated by jsonwebtoken)
    #[allow(dead_code)]
    exp: u64,
    /// Principal email address
    email: String,
    /// Explicit principal namespace: "employee" or "client"
    principal_type: Option<String>,
    /// Elevated role, e.g. "admin"
    role: Option<String>,
}

/// The authenticated caller, as derived from a validated session token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub kind: OwnerType,
    pub email: String,
    pub role: Option<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Cached JWKS keys with timestamp
struct CachedJwks {
    keys: Vec<jwk::Jwk>,
    fetched_at: Instant,
}

/// JWKS cache that fetches and caches the identity provider's key set
pub struct JwksCache {
    keys: RwLock<Option<CachedJwks>>,
    jwks_url: String,
    http_client: reqwest::Client,
}

/// JWKS response structure
#[derive(Deserialize)]
struct JwksResponse {
    keys: Vec<jwk::Jwk>,
}

impl JwksCache {
    /// Create a new JWKS cache for the given URL
    pub fn new(jwks_url: String) -> Self {
        Self {
            keys: RwLock::new(None),
            jwks_url,
            http_client: reqwest::Client::new(),
        }
    }

    /// Get cached JWKS keys, fetching if expired or not yet cached
    async fn get_keys(&self) -> Result<Vec<jwk::Jwk>, ApiError> {
        // Try read lock first (fast path)
        {
            let cache = self.keys.read().await;
            if let Some(ref cached) = *cache {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        // Cache miss or expired — acquire write lock and fetch
        let mut cache = self.keys.write().await;

        // Double-check after acquiring write lock (another task may have refreshed)
        if let Some(ref cached) = *cache {
            if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                return Ok(cached.keys.clone());
            }
        }

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch JWKS from identity provider");
                ApiError::internal("Authentication service temporarily unavailable")
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "JWKS endpoint returned error");
            return Err(ApiError::internal(
                "Authentication service temporarily unavailable",
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            ApiError::internal("Authentication service temporarily unavailable")
        })?;

        let keys = jwks.keys;
        tracing::info!(key_count = keys.len(), "Refreshed JWKS cache");

        *cache = Some(CachedJwks {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }

    /// Find a JWK by key ID
    async fn find_key(&self, kid: &str) -> Result<jwk::Jwk, ApiError> {
        let keys = self.get_keys().await?;
        keys.into_iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| {
                ApiError::auth_error(
                    "AUTH_UNKNOWN_KEY",
                    format!("No matching key found for kid '{}'", kid),
                )
            })
    }
}

/// Where session-token signing keys come from
enum KeySource {
    /// RS256 against the identity provider's JWKS (production)
    Jwks(JwksCache),
    /// HS256 shared secret (development/tests)
    Shared(Vec<u8>),
}

/// Raised when the server starts without any session key source
#[derive(Debug, thiserror::Error)]
pub enum AuthConfigError {
    #[error("no session key source configured: set SESSION_JWKS_URL or SESSION_JWT_SECRET")]
    MissingKeySource,
}

/// Validates session tokens and derives principals from their claims.
pub struct AuthVerifier {
    key_source: KeySource,
    legacy_employee_domain: Option<String>,
}

impl std::fmt::Debug for AuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVerifier")
            .field("legacy_employee_domain", &self.legacy_employee_domain)
            .finish_non_exhaustive()
    }
}

impl AuthVerifier {
    /// Build from configuration; JWKS wins when both sources are set
    pub fn from_config(config: &Config) -> Result<Self, AuthConfigError> {
        if let Some(url) = &config.session_jwks_url {
            tracing::info!(jwks_url = %url, "Session tokens validated against JWKS (RS256)");
            Ok(Self::with_jwks(
                url.clone(),
                config.legacy_employee_domain.clone(),
            ))
        } else if let Some(secret) = &config.session_jwt_secret {
            tracing::warn!("Session tokens validated with shared secret (HS256) - development mode");
            Ok(Self::with_shared_secret(
                secret.clone(),
                config.legacy_employee_domain.clone(),
            ))
        } else {
            Err(AuthConfigError::MissingKeySource)
        }
    }

    pub fn with_jwks(jwks_url: String, legacy_employee_domain: Option<String>) -> Self {
        Self {
            key_source: KeySource::Jwks(JwksCache::new(jwks_url)),
            legacy_employee_domain,
        }
    }

    pub fn with_shared_secret(
        secret: impl Into<String>,
        legacy_employee_domain: Option<String>,
    ) -> Self {
        Self {
            key_source: KeySource::Shared(secret.into().into_bytes()),
            legacy_employee_domain,
        }
    }

    /// Validate a session token and derive the calling principal
    pub async fn principal_from_token(&self, token: &str) -> Result<Principal, ApiError> {
        let claims = self.validate(token).await?;
        self.principal_from_claims(claims)
    }

    async fn validate(&self, token: &str) -> Result<SessionClaims, ApiError> {
        match &self.key_source {
            KeySource::Shared(secret) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.validate_exp = true;
                validation.validate_aud = false;
                decode_claims(token, &DecodingKey::from_secret(secret), &validation)
            }
            KeySource::Jwks(cache) => {
                // Decode header to get kid
                let header = decode_header(token).map_err(|e| {
                    ApiError::auth_error(
                        "AUTH_INVALID_TOKEN",
                        format!("Invalid JWT header: {}", e),
                    )
                })?;

                let kid = header.kid.ok_or_else(|| {
                    ApiError::auth_error("AUTH_INVALID_TOKEN", "JWT header missing 'kid' field")
                })?;

                let jwk = cache.find_key(&kid).await?;

                let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
                    tracing::error!(error = %e, kid = %kid, "Failed to convert JWK to decoding key");
                    ApiError::auth_error("AUTH_INVALID_TOKEN", "Failed to process signing key")
                })?;

                let mut validation = Validation::new(Algorithm::RS256);
                validation.validate_exp = true;
                // Identity provider tokens don't always carry aud
                validation.validate_aud = false;

                decode_claims(token, &decoding_key, &validation)
            }
        }
    }

    fn principal_from_claims(&self, claims: SessionClaims) -> Result<Principal, ApiError> {
        let kind = match claims.principal_type.as_deref() {
            Some(raw) => raw.parse::<OwnerType>().map_err(|_| {
                ApiError::auth_error(
                    "AUTH_INVALID_TOKEN",
                    format!("Unrecognized principal_type claim '{}'", raw),
                )
            })?,
            None => self.infer_legacy_kind(&claims.email)?,
        };

        Ok(Principal {
            id: claims.sub,
            kind,
            email: claims.email,
            role: claims.role,
        })
    }

    /// Legacy fallback for tokens minted before principal_type existed:
    /// an email under the configured company domain maps to the employee
    /// namespace, anything else to client. Off unless explicitly configured.
    fn infer_legacy_kind(&self, email: &str) -> Result<OwnerType, ApiError> {
        let domain = self.legacy_employee_domain.as_deref().ok_or_else(|| {
            ApiError::auth_error(
                "AUTH_INVALID_TOKEN",
                "Session token missing principal_type claim",
            )
        })?;

        let suffix = format!("@{}", domain);
        if email.to_lowercase().ends_with(&suffix) {
            Ok(OwnerType::Employee)
        } else {
            Ok(OwnerType::Client)
        }
    }
}

fn decode_claims(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<SessionClaims, ApiError> {
    let token_data =
        decode::<SessionClaims>(token, key, validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ApiError::auth_error("AUTH_TOKEN_EXPIRED", "Session token has expired")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid session token signature")
            }
            _ => ApiError::auth_error(
                "AUTH_INVALID_TOKEN",
                format!("Session token validation failed: {}", e),
            ),
        })?;

    Ok(token_data.claims)
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Authorization header must use Bearer scheme",
        )
    })
}

/// Authenticated principal extractor.
///
/// Reads `Authorization: Bearer <token>`, validates the session token, and
/// derives the `(id, kind)` pair all registry operations are scoped by.
/// Returns 401 with structured error codes on any failure.
pub struct AuthPrincipal(pub Principal);

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        let principal = state.verifier.principal_from_token(token).await?;
        Ok(AuthPrincipal(principal))
    }
}

/// Principal extractor that additionally requires the admin role.
///
/// The admin gate is role-based, not ownership-based: stats aggregate over
/// every principal's records.
pub struct AdminPrincipal(pub Principal);

impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        let principal = state.verifier.principal_from_token(token).await?;

        if !principal.is_admin() {
            return Err(ApiError::forbidden("Administrator role required"));
        }

        Ok(AdminPrincipal(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    const TEST_SECRET: &str = "test-secret-not-for-production";

    #[derive(Debug, Serialize)]
    struct TestClaims {
        sub: String,
        exp: u64,
        iat: u64,
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        principal_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    }

    fn now_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn mint_token(
        sub: &str,
        email: &str,
        principal_type: Option<&str>,
        role: Option<&str>,
        exp: u64,
    ) -> String {
        let claims = TestClaims {
            sub: sub.to_string(),
            exp,
            iat: now_epoch(),
            email: email.to_string(),
            principal_type: principal_type.map(String::from),
            role: role.map(String::from),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> AuthVerifier {
        AuthVerifier::with_shared_secret(TEST_SECRET, None)
    }

    #[tokio::test]
    async fn test_valid_token_yields_principal() {
        let token = mint_token(
            "u-42",
            "pat@client.example",
            Some("client"),
            None,
            now_epoch() + 3600,
        );

        let principal = verifier().principal_from_token(&token).await.unwrap();
        assert_eq!(principal.id, "u-42");
        assert_eq!(principal.kind, OwnerType::Client);
        assert_eq!(principal.email, "pat@client.example");
        assert!(!principal.is_admin());
    }

    #[tokio::test]
    async fn test_employee_principal_type_claim() {
        let token = mint_token(
            "e-7",
            "sam@corp.example",
            Some("employee"),
            Some("admin"),
            now_epoch() + 3600,
        );

        let principal = verifier().principal_from_token(&token).await.unwrap();
        assert_eq!(principal.kind, OwnerType::Employee);
        assert!(principal.is_admin());
    }

    #[tokio::test]
    async fn test_expired_token() {
        let token = mint_token(
            "u-42",
            "pat@client.example",
            Some("client"),
            None,
            now_epoch() - 3600,
        );

        let err = verifier().principal_from_token(&token).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_TOKEN_EXPIRED"),
            other => panic!("Expected AUTH_TOKEN_EXPIRED, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let claims = TestClaims {
            sub: "u-42".to_string(),
            exp: now_epoch() + 3600,
            iat: now_epoch(),
            email: "pat@client.example".to_string(),
            principal_type: Some("client".to_string()),
            role: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();

        let err = verifier().principal_from_token(&token).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let err = verifier()
            .principal_from_token("not-a-valid-jwt")
            .await
            .unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_principal_type_rejected() {
        let token = mint_token(
            "u-42",
            "pat@client.example",
            Some("vendor"),
            None,
            now_epoch() + 3600,
        );

        let err = verifier().principal_from_token(&token).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_principal_type_without_fallback_rejected() {
        let token = mint_token("u-42", "pat@corp.example", None, None, now_epoch() + 3600);

        let err = verifier().principal_from_token(&token).await.unwrap_err();
        match err {
            ApiError::AuthError { code, message } => {
                assert_eq!(code, "AUTH_INVALID_TOKEN");
                assert!(message.contains("principal_type"));
            }
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_legacy_domain_fallback() {
        let verifier =
            AuthVerifier::with_shared_secret(TEST_SECRET, Some("corp.example".to_string()));

        let employee = mint_token("e-1", "Sam@Corp.Example", None, None, now_epoch() + 3600);
        let principal = verifier.principal_from_token(&employee).await.unwrap();
        assert_eq!(principal.kind, OwnerType::Employee);

        let client = mint_token("c-1", "pat@elsewhere.example", None, None, now_epoch() + 3600);
        let principal = verifier.principal_from_token(&client).await.unwrap();
        assert_eq!(principal.kind, OwnerType::Client);

        // Substring matches outside the domain suffix must not qualify.
        let lookalike = mint_token(
            "c-2",
            "pat@corp.example.attacker.example",
            None,
            None,
            now_epoch() + 3600,
        );
        let principal = verifier.principal_from_token(&lookalike).await.unwrap();
        assert_eq!(principal.kind, OwnerType::Client);
    }

    #[tokio::test]
    async fn test_explicit_claim_wins_over_legacy_domain() {
        let verifier =
            AuthVerifier::with_shared_secret(TEST_SECRET, Some("corp.example".to_string()));

        let token = mint_token(
            "c-9",
            "contractor@corp.example",
            Some("client"),
            None,
            now_epoch() + 3600,
        );
        let principal = verifier.principal_from_token(&token).await.unwrap();
        assert_eq!(principal.kind, OwnerType::Client);
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let (parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();

        let err = extract_bearer_token(&parts).unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_MISSING_TOKEN"),
            other => panic!("Expected AUTH_MISSING_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts();

        let err = extract_bearer_token(&parts).unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_success() {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", "Bearer my-session-token")
            .body(())
            .unwrap()
            .into_parts();

        let token = extract_bearer_token(&parts).unwrap();
        assert_eq!(token, "my-session-token");
    }

    #[test]
    fn test_from_config_prefers_jwks() {
        let config = Config {
            session_jwks_url: Some("https://idp.example/.well-known/jwks.json".to_string()),
            session_jwt_secret: Some("secret".to_string()),
            ..Config::default()
        };
        let verifier = AuthVerifier::from_config(&config).unwrap();
        assert!(matches!(verifier.key_source, KeySource::Jwks(_)));
    }

    #[test]
    fn test_from_config_requires_a_key_source() {
        let err = AuthVerifier::from_config(&Config::default()).unwrap_err();
        assert!(matches!(err, AuthConfigError::MissingKeySource));
    }
}
