//! API Configuration Module
//!
//! Configuration for CORS, the telephony platform account, reconciliation
//! polling, webhook intake and outbound integrations. Everything is loaded
//! from `SWITCHBOARD_*` environment variables with defaults suitable for
//! local development.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use switchboard_core::PollPolicy;
use switchboard_platform::RestGatewayConfig;

use crate::auth::AuthConfig;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// ENV HELPERS
// ============================================================================

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|s| s.parse().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    env_string(key)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_secret(key: &str) -> Option<SecretString> {
    env_string(key).map(|s| SecretString::new(s.into()))
}

/// Check if running in a production environment.
pub fn is_production_environment() -> bool {
    std::env::var("SWITCHBOARD_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server and CORS configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    pub bind_host: String,
    pub port: u16,

    /// Capacity of the push-channel broadcast buffer.
    pub event_channel_capacity: usize,

    /// Number of domain events kept for the recent-events feed.
    pub event_log_capacity: usize,

    /// Deployment environment name ("development", "production", ...).
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            event_channel_capacity: 1000,
            event_log_capacity: switchboard_events::DEFAULT_EVENT_LOG_CAPACITY,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SWITCHBOARD_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `SWITCHBOARD_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `SWITCHBOARD_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `SWITCHBOARD_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `SWITCHBOARD_API_PORT`: Bind port (default: 3000)
    /// - `SWITCHBOARD_WS_CAPACITY`: Push channel buffer (default: 1000)
    /// - `SWITCHBOARD_EVENT_LOG_CAPACITY`: Recent events kept (default: 200)
    /// - `SWITCHBOARD_ENVIRONMENT`: "production" enables strict checks
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = env_string("SWITCHBOARD_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: env_bool("SWITCHBOARD_CORS_ALLOW_CREDENTIALS", false),
            cors_max_age_secs: env_parse("SWITCHBOARD_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            bind_host: env_string("SWITCHBOARD_API_BIND").unwrap_or(defaults.bind_host),
            port: env_parse("PORT")
                .or_else(|| env_parse("SWITCHBOARD_API_PORT"))
                .unwrap_or(defaults.port),
            event_channel_capacity: env_parse("SWITCHBOARD_WS_CAPACITY")
                .unwrap_or(defaults.event_channel_capacity),
            event_log_capacity: env_parse("SWITCHBOARD_EVENT_LOG_CAPACITY")
                .unwrap_or(defaults.event_log_capacity),
            environment: env_string("SWITCHBOARD_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }

    /// Refuse a permissive CORS policy in production.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        if self.cors_origins.is_empty() {
            return Err(ApiError::invalid_input(
                "CORS origins not configured for production. Set SWITCHBOARD_CORS_ORIGINS.",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// PLATFORM CONFIGURATION
// ============================================================================

/// Telephony platform account settings.
#[derive(Clone)]
pub struct PlatformConfig {
    pub account_sid: String,
    pub auth_token: SecretString,

    /// API key pair used to sign client SDK access tokens.
    pub api_key_sid: String,
    pub api_key_secret: SecretString,

    /// TaskRouter workspace holding tasks, workers and activities.
    pub workspace_sid: String,
    /// Workflow that routes chat tasks created from conversations.
    pub chat_workflow_sid: Option<String>,
    pub chat_service_sid: Option<String>,
    /// TwiML application used for outgoing softphone calls.
    pub twiml_app_sid: Option<String>,

    /// Caller id presented on originated legs.
    pub caller_id: Option<String>,
    pub hold_music_url: Option<String>,
    /// Activity workers move to after wrapping a voice task.
    pub post_work_activity_sid: Option<String>,

    /// Overrides every REST base URL (mock servers).
    pub base_url: Option<String>,
    pub http_timeout: Duration,
    pub access_token_ttl_secs: i64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: SecretString::new(String::new().into()),
            api_key_sid: String::new(),
            api_key_secret: SecretString::new(String::new().into()),
            workspace_sid: String::new(),
            chat_workflow_sid: None,
            chat_service_sid: None,
            twiml_app_sid: None,
            caller_id: None,
            hold_music_url: None,
            post_work_activity_sid: None,
            base_url: None,
            http_timeout: Duration::from_secs(10),
            access_token_ttl_secs: 3600,
        }
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("api_key_sid", &self.api_key_sid)
            .field("api_key_secret", &"[REDACTED]")
            .field("workspace_sid", &self.workspace_sid)
            .field("chat_workflow_sid", &self.chat_workflow_sid)
            .field("chat_service_sid", &self.chat_service_sid)
            .field("twiml_app_sid", &self.twiml_app_sid)
            .field("caller_id", &self.caller_id)
            .field("hold_music_url", &self.hold_music_url)
            .field("post_work_activity_sid", &self.post_work_activity_sid)
            .field("base_url", &self.base_url)
            .field("http_timeout", &self.http_timeout)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .finish()
    }
}

impl PlatformConfig {
    /// Load platform settings.
    ///
    /// Environment variables:
    /// - `SWITCHBOARD_ACCOUNT_SID`, `SWITCHBOARD_AUTH_TOKEN`
    /// - `SWITCHBOARD_API_KEY_SID`, `SWITCHBOARD_API_KEY_SECRET`
    /// - `SWITCHBOARD_WORKSPACE_SID`, `SWITCHBOARD_CHAT_WORKFLOW_SID`
    /// - `SWITCHBOARD_CHAT_SERVICE_SID`, `SWITCHBOARD_TWIML_APP_SID`
    /// - `SWITCHBOARD_CALLER_ID`, `SWITCHBOARD_HOLD_MUSIC_URL`
    /// - `SWITCHBOARD_POST_WORK_ACTIVITY_SID`
    /// - `SWITCHBOARD_PLATFORM_BASE_URL`, `SWITCHBOARD_PLATFORM_TIMEOUT_SECS`
    /// - `SWITCHBOARD_ACCESS_TOKEN_TTL_SECS` (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            account_sid: env_string("SWITCHBOARD_ACCOUNT_SID").unwrap_or_default(),
            auth_token: env_secret("SWITCHBOARD_AUTH_TOKEN").unwrap_or(defaults.auth_token),
            api_key_sid: env_string("SWITCHBOARD_API_KEY_SID").unwrap_or_default(),
            api_key_secret: env_secret("SWITCHBOARD_API_KEY_SECRET")
                .unwrap_or(defaults.api_key_secret),
            workspace_sid: env_string("SWITCHBOARD_WORKSPACE_SID").unwrap_or_default(),
            chat_workflow_sid: env_string("SWITCHBOARD_CHAT_WORKFLOW_SID"),
            chat_service_sid: env_string("SWITCHBOARD_CHAT_SERVICE_SID"),
            twiml_app_sid: env_string("SWITCHBOARD_TWIML_APP_SID"),
            caller_id: env_string("SWITCHBOARD_CALLER_ID"),
            hold_music_url: env_string("SWITCHBOARD_HOLD_MUSIC_URL"),
            post_work_activity_sid: env_string("SWITCHBOARD_POST_WORK_ACTIVITY_SID"),
            base_url: env_string("SWITCHBOARD_PLATFORM_BASE_URL"),
            http_timeout: env_parse("SWITCHBOARD_PLATFORM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            access_token_ttl_secs: env_parse("SWITCHBOARD_ACCESS_TOKEN_TTL_SECS")
                .unwrap_or(defaults.access_token_ttl_secs),
        }
    }

    /// Account credentials and workspace are present.
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty()
            && !self.auth_token.expose_secret().is_empty()
            && !self.workspace_sid.is_empty()
    }

    /// Client SDK tokens can be minted.
    pub fn can_issue_access_tokens(&self) -> bool {
        !self.account_sid.is_empty()
            && !self.api_key_sid.is_empty()
            && !self.api_key_secret.expose_secret().is_empty()
    }

    /// Settings for the REST gateway.
    pub fn gateway_config(&self) -> RestGatewayConfig {
        let mut config = RestGatewayConfig::new(
            self.account_sid.clone(),
            self.auth_token.clone(),
            self.workspace_sid.clone(),
        );
        config.chat_service_sid = self.chat_service_sid.clone();
        config.timeout = self.http_timeout;
        match &self.base_url {
            Some(base) => config.with_base_url(base),
            None => config,
        }
    }
}

// ============================================================================
// RECONCILIATION POLLING
// ============================================================================

/// Poll budgets for each kind of eventually-consistent wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    pub conference: PollPolicy,
    pub participant: PollPolicy,
    pub call: PollPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            conference: PollPolicy::conference(),
            participant: PollPolicy::participant(),
            call: PollPolicy::call(),
        }
    }
}

impl ReconcileConfig {
    /// Load poll budgets.
    ///
    /// For each of `CONFERENCE`, `PARTICIPANT` and `CALL`:
    /// - `SWITCHBOARD_POLL_<KIND>_ATTEMPTS`
    /// - `SWITCHBOARD_POLL_<KIND>_DELAY_MS`
    /// - `SWITCHBOARD_POLL_<KIND>_BACKOFF`: "fixed" (default) or "exponential"
    /// - `SWITCHBOARD_POLL_<KIND>_MAX_DELAY_MS`: exponential cap (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            conference: policy_from_env("CONFERENCE", defaults.conference),
            participant: policy_from_env("PARTICIPANT", defaults.participant),
            call: policy_from_env("CALL", defaults.call),
        }
    }

    /// Same policy for every wait. Handy for tests.
    pub fn uniform(policy: PollPolicy) -> Self {
        Self {
            conference: policy,
            participant: policy,
            call: policy,
        }
    }
}

fn policy_from_env(kind: &str, default: PollPolicy) -> PollPolicy {
    let attempts = env_parse(&format!("SWITCHBOARD_POLL_{}_ATTEMPTS", kind))
        .filter(|n: &u32| *n > 0)
        .unwrap_or(default.attempts);
    let delay = env_parse(&format!("SWITCHBOARD_POLL_{}_DELAY_MS", kind))
        .map(Duration::from_millis)
        .unwrap_or(default.delay);

    match env_string(&format!("SWITCHBOARD_POLL_{}_BACKOFF", kind))
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("exponential") => {
            let max_delay = env_parse(&format!("SWITCHBOARD_POLL_{}_MAX_DELAY_MS", kind))
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(5));
            PollPolicy::exponential(attempts, delay, 2.0, max_delay)
        }
        _ => PollPolicy::fixed(attempts, delay),
    }
}

// ============================================================================
// WEBHOOK CONFIGURATION
// ============================================================================

/// Inbound platform webhook settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Verify `X-Twilio-Signature` on every webhook.
    pub validate_signatures: bool,

    /// Public origin the platform calls (e.g. `https://desk.example.com`).
    /// Signatures are computed over this origin plus the request path.
    pub public_base_url: Option<String>,

    /// Longest chat message body the pre-webhook lets through.
    pub max_message_length: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            validate_signatures: true,
            public_base_url: None,
            max_message_length: 1600,
        }
    }
}

impl WebhookConfig {
    /// Environment variables:
    /// - `SWITCHBOARD_WEBHOOK_VALIDATE`: "false" disables signature checks (not in production)
    /// - `SWITCHBOARD_PUBLIC_BASE_URL`
    /// - `SWITCHBOARD_MAX_MESSAGE_LENGTH` (default: 1600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            validate_signatures: env_bool("SWITCHBOARD_WEBHOOK_VALIDATE", true),
            public_base_url: env_string("SWITCHBOARD_PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            max_message_length: env_parse("SWITCHBOARD_MAX_MESSAGE_LENGTH")
                .unwrap_or(defaults.max_message_length),
        }
    }

    /// Signature checks cannot be turned off in production.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        if !self.validate_signatures {
            return Err(ApiError::invalid_input(
                "Webhook signature validation cannot be disabled in production. \
                 Unset SWITCHBOARD_WEBHOOK_VALIDATE.",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// INTEGRATIONS
// ============================================================================

/// Optional analytics sink and CRM service.
#[derive(Clone)]
pub struct IntegrationConfig {
    pub analytics_url: Option<String>,
    pub crm_base_url: Option<String>,
    pub crm_jwt_secret: Option<SecretString>,
    /// Lifetime of the service token sent to the CRM.
    pub crm_token_ttl_secs: i64,
    pub timeout: Duration,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            analytics_url: None,
            crm_base_url: None,
            crm_jwt_secret: None,
            crm_token_ttl_secs: 300,
            timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Debug for IntegrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationConfig")
            .field("analytics_url", &self.analytics_url)
            .field("crm_base_url", &self.crm_base_url)
            .field(
                "crm_jwt_secret",
                &self.crm_jwt_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("crm_token_ttl_secs", &self.crm_token_ttl_secs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl IntegrationConfig {
    /// Environment variables:
    /// - `SWITCHBOARD_ANALYTICS_URL`
    /// - `SWITCHBOARD_CRM_BASE_URL`, `SWITCHBOARD_CRM_JWT_SECRET`
    /// - `SWITCHBOARD_CRM_TOKEN_TTL_SECS` (default: 300)
    /// - `SWITCHBOARD_INTEGRATION_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            analytics_url: env_string("SWITCHBOARD_ANALYTICS_URL"),
            crm_base_url: env_string("SWITCHBOARD_CRM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            crm_jwt_secret: env_secret("SWITCHBOARD_CRM_JWT_SECRET"),
            crm_token_ttl_secs: env_parse("SWITCHBOARD_CRM_TOKEN_TTL_SECS")
                .unwrap_or(defaults.crm_token_ttl_secs),
            timeout: env_parse("SWITCHBOARD_INTEGRATION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn crm_enabled(&self) -> bool {
        self.crm_base_url.is_some() && self.crm_jwt_secret.is_some()
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// Every configuration section the server needs.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub platform: PlatformConfig,
    pub reconcile: ReconcileConfig,
    pub webhook: WebhookConfig,
    pub integrations: IntegrationConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            auth: AuthConfig::from_env(),
            platform: PlatformConfig::from_env(),
            reconcile: ReconcileConfig::from_env(),
            webhook: WebhookConfig::from_env(),
            integrations: IntegrationConfig::from_env(),
        }
    }

    /// Strict checks applied when `api.environment` names production.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        if !self.api.is_production() {
            return Ok(());
        }
        self.api.validate_for_production()?;
        self.auth.validate_for_production()?;
        self.webhook.validate_for_production()?;
        if !self.platform.is_configured() {
            return Err(ApiError::invalid_input(
                "Platform account not configured for production. \
                 Set SWITCHBOARD_ACCOUNT_SID, SWITCHBOARD_AUTH_TOKEN and SWITCHBOARD_WORKSPACE_SID.",
            ));
        }
        Ok(())
    }
}
