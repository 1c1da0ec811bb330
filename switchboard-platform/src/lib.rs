//! Switchboard Platform - Telephony Platform Gateway
//!
//! Typed access to the external platform's calls, conferences,
//! participants, recordings, tasks, workers and conversations through the
//! [`PlatformGateway`] trait, with two implementations:
//!
//! - [`RestGateway`]: the platform's REST API over `reqwest`
//! - [`InMemoryPlatform`]: a process-local platform for development and tests
//!
//! Also home to the TwiML builder used to redirect live call legs.

pub mod gateway;
pub mod memory;
pub mod rest;
pub mod twiml;

pub use gateway::{ClaimOutcome, CreateCall, NewTask, PlatformGateway, TaskUpdate};
pub use memory::{HoldUpdate, InMemoryPlatform, Redirect};
pub use rest::{RestGateway, RestGatewayConfig};
pub use twiml::{ConferenceDial, DialTarget, VoiceResponse};
