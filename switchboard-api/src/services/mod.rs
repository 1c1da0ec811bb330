//! Service Layer
//!
//! Business logic behind the routes. Services talk to the platform through
//! `PlatformGateway`, record through the injected stores and publish
//! domain events; routes only translate HTTP to and from these calls.

mod conference_service;
mod hold_service;
mod integration_service;
mod lifecycle_service;
mod poll_service;
mod presence_service;
mod recording_service;
mod router_service;
mod transfer_service;

pub use conference_service::*;
pub use hold_service::*;
pub use integration_service::*;
pub use lifecycle_service::*;
pub use poll_service::*;
pub use presence_service::*;
pub use recording_service::*;
pub use router_service::*;
pub use transfer_service::*;
