//! Platform webhook signature verification.
//!
//! The platform signs every callback with `X-Twilio-Signature`:
//! `base64(HMAC-SHA1(auth_token, url + k1 + v1 + k2 + v2 ...))` where the
//! form parameters are sorted by key. The body is buffered to compute the
//! digest and then handed to the route unchanged.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Form,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use std::sync::Arc;
use thiserror::Error;

use crate::error::ApiError;
use crate::telemetry::METRICS;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Largest webhook body accepted for verification.
const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

type HmacSha1 = Hmac<Sha1>;

/// Verification settings shared by the webhook routes.
#[derive(Clone)]
pub struct SignatureState {
    pub auth_token: Arc<SecretString>,
    /// Public origin the platform was configured with. When absent the
    /// `Host` header is used with an `https` scheme.
    pub public_base_url: Option<String>,
    pub enabled: bool,
}

impl std::fmt::Debug for SignatureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureState")
            .field("auth_token", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing X-Twilio-Signature header")]
    Missing,

    #[error("signature is not valid base64")]
    Malformed,

    #[error("signature does not match request")]
    Mismatch,

    #[error("webhook body could not be read: {0}")]
    Body(String),
}

impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        match self {
            SignatureError::Body(reason) => {
                ApiError::invalid_input(format!("Unreadable webhook body: {}", reason))
                    .into_response()
            }
            other => {
                tracing::warn!(error = %other, "Rejected webhook signature");
                ApiError::invalid_signature().into_response()
            }
        }
    }
}

/// String the platform signs: the URL followed by each form key and value,
/// sorted by key.
fn signing_payload(url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut payload = String::from(url);
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }
    payload
}

fn mac_for(auth_token: &str, url: &str, params: &[(String, String)]) -> Option<HmacSha1> {
    // HMAC accepts keys of any length, so this only fails on an impossible key
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).ok()?;
    mac.update(signing_payload(url, params).as_bytes());
    Some(mac)
}

/// Compute the expected signature for a URL and its form parameters.
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    mac_for(auth_token, url, params)
        .map(|mac| base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

fn verify(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> Result<(), SignatureError> {
    let provided = base64::engine::general_purpose::STANDARD
        .decode(signature.trim())
        .map_err(|_| SignatureError::Malformed)?;

    mac_for(auth_token, url, params)
        .ok_or(SignatureError::Mismatch)?
        .verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

fn public_url(state: &SignatureState, request: &Request) -> String {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match &state.public_base_url {
        Some(base) => format!("{}{}", base, path),
        None => {
            let host = request
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            format!("https://{}{}", host, path)
        }
    }
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

async fn form_params(
    parts: &axum::http::request::Parts,
    bytes: &Bytes,
) -> Result<Vec<(String, String)>, SignatureError> {
    let mut probe = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .body(Body::from(bytes.clone()))
        .map_err(|e| SignatureError::Body(e.to_string()))?;
    *probe.headers_mut() = parts.headers.clone();

    let Form(params) = Form::<Vec<(String, String)>>::from_request(probe, &())
        .await
        .map_err(|e| SignatureError::Body(e.body_text()))?;
    Ok(params)
}

/// Reject platform callbacks whose signature does not verify.
///
/// Disabled when `state.enabled` is false (refused in production by
/// configuration validation).
pub async fn signature_middleware(
    State(state): State<SignatureState>,
    request: Request,
    next: Next,
) -> Result<Response, SignatureError> {
    if !state.enabled {
        return Ok(next.run(request).await);
    }

    let url = public_url(&state, &request);
    let Some(signature) = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
    else {
        record_rejection(request.uri().path());
        return Err(SignatureError::Missing);
    };

    let form = is_form(&request);
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY)
        .await
        .map_err(|e| SignatureError::Body(e.to_string()))?;

    let params = if form {
        form_params(&parts, &bytes).await?
    } else {
        Vec::new()
    };

    if let Err(e) = verify(state.auth_token.expose_secret(), &url, &params, &signature) {
        record_rejection(parts.uri.path());
        return Err(e);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

fn record_rejection(path: &str) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_webhook(path, "rejected");
    }
}
