//! Middleware modules for the switchboard API
//!
//! - `auth`: agent session authentication
//! - `signature`: platform webhook signature verification
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .nest("/taskrouter", protected_routes)
//!     // agent routes: bearer session token
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//!
//! Router::new()
//!     .nest("/webhooks", webhook_routes)
//!     // platform callbacks: X-Twilio-Signature
//!     .layer(middleware::from_fn_with_state(signature_state, signature_middleware))
//! ```

mod auth;
mod signature;

pub use auth::{auth_middleware, AuthExtractor, AuthMiddlewareError, AuthMiddlewareState};
pub use signature::{
    compute_signature, signature_middleware, SignatureError, SignatureState, SIGNATURE_HEADER,
};
