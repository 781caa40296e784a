//! WebSocket Gatekeeper Library
//!
//! Admits WebSocket connections behind bearer-token authentication against
//! an OpenID Connect realm:
//!
//! - Sessions that present `Authorization: Bearer <jwt>` at upgrade are
//!   verified and connected directly
//! - Sessions without credentials are quarantined until their first text
//!   frame, which must be `Bearer <jwt>`
//! - Connected sessions are pinged periodically; unresponsive ones are closed
//!
//! # Architecture
//!
//! ```text
//! handlers/ws.rs -> gatekeeper.rs -> auth/{jwt,jwks}.rs
//!                         |
//!                         +-> registry.rs <- tasks/heartbeat.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Signing key provider and token verifier
//! - `config` - Service configuration from environment
//! - `errors` - Error taxonomy and close reasons
//! - `gatekeeper` - Admission state machine
//! - `handlers` - HTTP and WebSocket handlers
//! - `observability` - Metrics
//! - `registry` - Quarantined / connected session sets
//! - `routes` - Axum router setup
//! - `session` - Session and message handler capabilities
//! - `tasks` - Heartbeat

pub mod auth;
pub mod config;
pub mod errors;
pub mod gatekeeper;
pub mod handlers;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod session;
pub mod tasks;
