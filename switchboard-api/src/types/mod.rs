//! API Request and Response Types
//!
//! Request bodies, query strings and response payloads of the agent-facing
//! API and the platform webhooks. Field names are camelCase on the wire
//! except where the platform dictates its own casing.

// Session and token types
mod auth;
pub use auth::*;

// Task lifecycle types
mod task;
pub use task::*;

// Transfer types
mod transfer;
pub use transfer::*;

// Hold and recording types
mod voice;
pub use voice::*;

// Chat conversation types
mod chat;
pub use chat::*;

// Presence and event feed types
mod presence;
pub use presence::*;

// Platform webhook payloads
mod webhook;
pub use webhook::*;
