//! Common utilities and types shared across gatekeeper components.

#![warn(clippy::pedantic)]

/// Module for identifier types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (structure, activity, size limits)
pub mod jwt;
