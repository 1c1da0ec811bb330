//! Integration Service
//!
//! Outbound calls to the analytics sink and the CRM service. Analytics and
//! interaction logging are fire-and-forget from the caller's point of view:
//! failures are logged and never fail the primary operation. The CRM
//! customer lookup is a plain proxy and does report errors.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use switchboard_core::{Channel, Task, Timestamp};

use crate::config::IntegrationConfig;
use crate::error::{ApiError, ApiResult, ErrorCode};

/// Usage record posted to the analytics sink when a task completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub task_sid: String,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub age_seconds: u64,
    pub completed_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_sid: Option<String>,
}

impl UsageRecord {
    pub fn for_task(task: &Task, worker_sid: Option<&str>) -> Self {
        Self {
            task_sid: task.sid.clone(),
            channel: task.attributes.channel(),
            disposition: task.attributes.disposition().map(str::to_string),
            reason: task
                .reason
                .clone()
                .or_else(|| task.attributes.wrapup_reason().map(str::to_string)),
            age_seconds: task.age,
            completed_at: Utc::now(),
            worker_sid: worker_sid.map(str::to_string),
        }
    }
}

/// Interaction entry written to the CRM for a completed contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub task_sid: String,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_sid: Option<String>,
    pub occurred_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServiceClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// HTTP client for the analytics sink and the CRM.
#[derive(Clone, Debug)]
pub struct IntegrationClient {
    http: Client,
    config: IntegrationConfig,
}

impl IntegrationClient {
    pub fn new(config: IntegrationConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// Short-lived HS256 token the CRM accepts from this backend.
    pub fn crm_token(&self) -> ApiResult<String> {
        let secret = self
            .config
            .crm_jwt_secret
            .as_ref()
            .ok_or_else(|| ApiError::service_unavailable("CRM service is not configured"))?;

        let now = Utc::now().timestamp();
        let claims = ServiceClaims {
            iss: "switchboard".to_string(),
            sub: "agent-desk".to_string(),
            iat: now,
            exp: now + self.config.crm_token_ttl_secs,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
        )
        .map_err(|e| ApiError::internal_error(format!("Failed to sign CRM token: {}", e)))
    }

    fn crm_url(&self, path: &str) -> ApiResult<String> {
        match (&self.config.crm_base_url, self.config.crm_enabled()) {
            (Some(base), true) => Ok(format!("{}{}", base, path)),
            _ => Err(ApiError::service_unavailable("CRM service is not configured")),
        }
    }

    /// Fetch a customer record from the CRM.
    ///
    /// # Errors
    /// 503 when the CRM is not configured, 404 when the CRM does not know the
    /// customer, 502 for transport failures and other CRM errors.
    pub async fn fetch_customer(&self, customer_id: &str) -> ApiResult<serde_json::Value> {
        let url = self.crm_url(&format!("/customers/{}", customer_id))?;
        let token = self.crm_token()?;

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::new(ErrorCode::UpstreamUnreachable, format!("CRM unreachable: {}", e)))?;

        match response.status() {
            status if status.is_success() => response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| ApiError::new(ErrorCode::UpstreamError, format!("Unreadable CRM response: {}", e))),
            StatusCode::NOT_FOUND => Err(ApiError::entity_not_found("Customer", customer_id)),
            status => {
                tracing::warn!(customer_id, status = status.as_u16(), "CRM rejected customer lookup");
                Err(ApiError::new(
                    ErrorCode::UpstreamError,
                    format!("CRM returned {}", status.as_u16()),
                ))
            }
        }
    }

    /// Post a usage record; failures are logged.
    pub async fn record_usage(&self, record: &UsageRecord) {
        let Some(url) = self.config.analytics_url.as_deref() else {
            return;
        };
        match self.http.post(url).json(record).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(task_sid = %record.task_sid, "Usage record delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    task_sid = %record.task_sid,
                    status = response.status().as_u16(),
                    "Analytics sink rejected usage record"
                );
            }
            Err(e) => {
                tracing::warn!(task_sid = %record.task_sid, error = %e, "Analytics sink unreachable");
            }
        }
    }

    async fn post_interaction(&self, customer_id: &str, record: &InteractionRecord) -> ApiResult<()> {
        let url = self.crm_url(&format!("/customers/{}/interactions", customer_id))?;
        let token = self.crm_token()?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(record)
            .send()
            .await
            .map_err(|e| ApiError::new(ErrorCode::UpstreamUnreachable, e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::new(
                ErrorCode::UpstreamError,
                format!("CRM returned {}", response.status().as_u16()),
            ))
        }
    }

    /// Log a completed interaction against a CRM customer; failures are logged.
    pub async fn log_interaction(&self, customer_id: &str, record: &InteractionRecord) {
        if !self.config.crm_enabled() {
            return;
        }
        if let Err(e) = self.post_interaction(customer_id, record).await {
            tracing::warn!(customer_id, task_sid = %record.task_sid, error = %e, "CRM interaction log failed");
        }
    }
}

/// Client with nothing configured, for tests and local runs.
impl Default for IntegrationClient {
    fn default() -> Self {
        Self {
            http: Client::new(),
            config: IntegrationConfig {
                timeout: Duration::from_secs(1),
                ..IntegrationConfig::default()
            },
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use switchboard_core::AssignmentStatus;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crm_client(base: &str) -> ApiResult<IntegrationClient> {
        IntegrationClient::new(IntegrationConfig {
            analytics_url: Some(format!("{}/usage", base)),
            crm_base_url: Some(base.to_string()),
            crm_jwt_secret: Some(SecretString::new("crm-secret".into())),
            ..IntegrationConfig::default()
        })
    }

    #[tokio::test]
    async fn test_fetch_customer_sends_service_token() -> ApiResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/C42"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "C42"})))
            .mount(&server)
            .await;

        let customer = crm_client(&server.uri())?.fetch_customer("C42").await?;
        assert_eq!(customer["id"], "C42");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_customer_is_404() -> ApiResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/NOPE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = crm_client(&server.uri())?
            .fetch_customer("NOPE")
            .await
            .err()
            .map(|e| e.code);
        assert_eq!(err, Some(ErrorCode::EntityNotFound));
        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_crm_is_unavailable() {
        let err = IntegrationClient::default()
            .fetch_customer("C42")
            .await
            .err()
            .map(|e| e.code);
        assert_eq!(err, Some(ErrorCode::ServiceUnavailable));
    }

    #[tokio::test]
    async fn test_usage_record_is_posted() -> ApiResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/usage"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let task = Task::new("WT1", AssignmentStatus::Completed);
        crm_client(&server.uri())?
            .record_usage(&UsageRecord::for_task(&task, Some("WK1")))
            .await;
        Ok(())
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() -> ApiResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let task = Task::new("WT1", AssignmentStatus::Completed);
        let client = crm_client(&server.uri())?;
        client.record_usage(&UsageRecord::for_task(&task, None)).await;
        client
            .log_interaction(
                "C42",
                &InteractionRecord {
                    task_sid: "WT1".to_string(),
                    channel: Channel::Voice,
                    disposition: None,
                    worker_sid: None,
                    occurred_at: Utc::now(),
                },
            )
            .await;
        Ok(())
    }
}
