//! Authentication Module
//!
//! Agent session tokens (HS256 JWTs issued at login and presented as
//! `Authorization: Bearer`) and the platform access tokens handed to the
//! browser softphone/chat SDKs.

use crate::config::{is_production_environment, PlatformConfig};
use crate::error::{ApiError, ApiResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchboard_core::DeskError;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION (FOR DETERMINISTIC TESTS + CI ROBUSTNESS)
// ============================================================================

/// Clock abstraction for JWT time validation.
///
/// Time checks are done here rather than inside `jsonwebtoken`, so tests can
/// pin the clock and a broken system clock fails loudly instead of panicking.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. May be negative on broken hosts.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// Session signing secret that never shows up in logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, DeskError> {
        if secret.is_empty() {
            return Err(DeskError::validation("jwt_secret", "must not be empty"));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };

    match JwtSecret::new(normalized) {
        Ok(secret) => secret,
        Err(_) => JwtSecret(SecretString::new(INSECURE_DEFAULT_SECRET.to_string().into())),
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Session token configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret used to sign and verify session tokens.
    pub jwt_secret: JwtSecret,

    /// Session lifetime in seconds (default: 8 hours, one shift).
    pub jwt_expiration_secs: i64,

    /// Clock skew tolerance in seconds (default: 60).
    pub jwt_clock_skew_secs: i64,

    /// Clock for JWT time validation (injected for testing).
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let secret_str = std::env::var("SWITCHBOARD_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            jwt_secret: build_jwt_secret(secret_str),
            jwt_expiration_secs: 8 * 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `SWITCHBOARD_JWT_SECRET`: Session signing secret
    /// - `SWITCHBOARD_JWT_EXPIRATION_SECS`: Session lifetime (default: 28800)
    /// - `SWITCHBOARD_JWT_CLOCK_SKEW_SECS`: Clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            jwt_expiration_secs: std::env::var("SWITCHBOARD_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: std::env::var("SWITCHBOARD_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_clock_skew_secs),
            ..defaults
        }
    }

    /// Refuse to start in production with the insecure default or a short
    /// secret. In development, warn and continue.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let is_production = is_production_environment();

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "Cannot start server in production with insecure JWT secret. \
                     Set SWITCHBOARD_JWT_SECRET to a secure value.",
                ));
            }
            tracing::warn!(
                "Using insecure default JWT secret. Set SWITCHBOARD_JWT_SECRET \
                 before deploying (minimum 32 characters)."
            );
        }

        if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            } else if !self.jwt_secret.is_insecure_default() {
                tracing::warn!(
                    length = self.jwt_secret.len(),
                    "JWT secret is short; use at least 32 characters in production"
                );
            }
        }

        Ok(())
    }
}

// ============================================================================
// SESSION CLAIMS
// ============================================================================

/// Session token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Agent id.
    pub sub: String,

    /// TaskRouter worker the agent signs in as.
    pub worker_sid: String,

    /// Normalized `client:agent:<id>` identity.
    pub identity: String,

    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(agent: &AgentContext, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: agent.agent_id.clone(),
            worker_sid: agent.worker_sid.clone(),
            identity: agent.identity.clone(),
            iat: now,
            exp: now + expiration_secs,
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

// ============================================================================
// AGENT CONTEXT
// ============================================================================

/// Signed-in agent, injected into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub agent_id: String,
    pub worker_sid: String,
    pub identity: String,
}

impl AgentContext {
    pub fn new(
        agent_id: impl Into<String>,
        worker_sid: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            worker_sid: worker_sid.into(),
            identity: identity.into(),
        }
    }

    /// Identity as the client SDKs register it (`agent:<id>`).
    pub fn client_name(&self) -> &str {
        self.identity
            .strip_prefix("client:")
            .unwrap_or(&self.identity)
    }
}

impl From<Claims> for AgentContext {
    fn from(claims: Claims) -> Self {
        Self {
            agent_id: claims.sub,
            worker_sid: claims.worker_sid,
            identity: claims.identity,
        }
    }
}

// ============================================================================
// SESSION TOKENS
// ============================================================================

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Verify a session token's signature and lifetime.
///
/// Signature only inside `jsonwebtoken`; expiry is checked against the
/// configured clock.
pub fn validate_session_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();

    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error(
            "Server time configuration error - please contact support",
        ));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Issue a session token for a signed-in agent.
pub fn generate_session_token(config: &AuthConfig, agent: &AgentContext) -> ApiResult<String> {
    let claims = Claims::new(agent, config.jwt_expiration_secs, &*config.clock);
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Authenticate an `Authorization` header value.
pub fn authenticate_bearer(config: &AuthConfig, auth_header: Option<&str>) -> ApiResult<AgentContext> {
    let Some(auth_value) = auth_header else {
        return Err(ApiError::unauthorized(
            "Authentication required: provide Authorization header",
        ));
    };

    let Some(token) = auth_value.strip_prefix("Bearer ") else {
        return Err(ApiError::invalid_token(
            "Authorization header must use Bearer scheme",
        ));
    };

    validate_session_token(config, token.trim()).map(AgentContext::from)
}

// ============================================================================
// PLATFORM ACCESS TOKENS
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct VoiceIncoming {
    allow: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoiceOutgoing {
    application_sid: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoiceGrant {
    incoming: VoiceIncoming,
    #[serde(skip_serializing_if = "Option::is_none")]
    outgoing: Option<VoiceOutgoing>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatGrant {
    service_sid: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Grants {
    identity: String,
    voice: VoiceGrant,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat: Option<ChatGrant>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessTokenClaims {
    jti: String,
    iss: String,
    sub: String,
    nbf: i64,
    exp: i64,
    grants: Grants,
}

/// Minted platform access token.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token: String,
    pub identity: String,
    pub expires_at: i64,
}

/// Mint an access token granting the agent's client identity voice
/// (incoming, plus outgoing through the TwiML app) and chat access.
pub fn generate_access_token(
    platform: &PlatformConfig,
    agent: &AgentContext,
    clock: &dyn JwtClock,
) -> ApiResult<AccessToken> {
    if !platform.can_issue_access_tokens() {
        return Err(ApiError::service_unavailable(
            "Platform API key is not configured",
        ));
    }

    let now = clock.now_epoch_secs();
    let expires_at = now + platform.access_token_ttl_secs;
    let identity = agent.client_name().to_string();

    let claims = AccessTokenClaims {
        jti: format!("{}-{}", platform.api_key_sid, now),
        iss: platform.api_key_sid.clone(),
        sub: platform.account_sid.clone(),
        nbf: now,
        exp: expires_at,
        grants: Grants {
            identity: identity.clone(),
            voice: VoiceGrant {
                incoming: VoiceIncoming { allow: true },
                outgoing: platform
                    .twiml_app_sid
                    .clone()
                    .map(|application_sid| VoiceOutgoing { application_sid }),
            },
            chat: platform
                .chat_service_sid
                .clone()
                .map(|service_sid| ChatGrant { service_sid }),
        },
    };

    let mut header = Header::new(Algorithm::HS256);
    header.cty = Some("twilio-fpa;v=1".to_string());
    let key = EncodingKey::from_secret(platform.api_key_secret.expose_secret().as_bytes());

    let token = encode(&header, &claims, &key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate access token: {}", e)))?;

    Ok(AccessToken {
        token,
        identity,
        expires_at,
    })
}
