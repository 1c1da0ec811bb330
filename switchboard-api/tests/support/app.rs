#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use switchboard_api::config::{AppConfig, ReconcileConfig};
use switchboard_api::middleware::{compute_signature, SIGNATURE_HEADER};
use switchboard_api::{create_api_router, generate_session_token, AgentContext, AppState};
use switchboard_core::PollPolicy;
use switchboard_platform::InMemoryPlatform;
use tower::ServiceExt;

pub const AUTH_TOKEN: &str = "test-platform-auth-token";
pub const PUBLIC_BASE_URL: &str = "https://desk.example.com";
pub const CALLER_ID: &str = "+15550009999";

/// Configuration with fast reconciliation and a known signing token.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.reconcile = ReconcileConfig::uniform(PollPolicy::fixed(3, Duration::from_millis(1)));
    config.platform.auth_token = SecretString::new(AUTH_TOKEN.into());
    config.platform.caller_id = Some(CALLER_ID.to_string());
    config.webhook.public_base_url = Some(PUBLIC_BASE_URL.to_string());
    config
}

pub fn test_agent() -> AgentContext {
    AgentContext::new("42", "WK42", "client:agent:42")
}

/// Full router over an in-memory platform.
pub struct TestApp {
    pub platform: Arc<InMemoryPlatform>,
    pub state: AppState,
    pub config: AppConfig,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let platform = Arc::new(InMemoryPlatform::new());
        let state = AppState::new(platform.clone(), &config).expect("state");
        let router = create_api_router(state.clone(), &config).expect("router");
        Self {
            platform,
            state,
            config,
            router,
        }
    }

    pub fn session_token(&self) -> String {
        generate_session_token(&self.config.auth, &test_agent()).expect("session token")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Authenticated GET.
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.session_token()))
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    /// Authenticated JSON POST.
    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.session_token()))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    /// Unauthenticated JSON POST.
    pub async fn post_public(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    /// Form POST carrying a valid platform signature.
    pub async fn post_signed_form(&self, path: &str, params: &[(&str, &str)]) -> (StatusCode, Value) {
        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let signature = compute_signature(AUTH_TOKEN, &format!("{}{}", PUBLIC_BASE_URL, path), &owned);
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(form_encode(params)))
            .expect("request");
        self.send(request).await
    }
}

/// `application/x-www-form-urlencoded` encoding.
pub fn form_encode(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
