//! # Gatekeeper Test Utilities
//!
//! Shared test utilities for the WebSocket gatekeeper.
//!
//! This crate provides:
//! - Deterministic RSA fixtures (fixed keys for reproducible tests)
//! - Token builders that sign with those keys
//! - A mock realm serving the JWKS endpoint (wiremock)
//! - Recording session and message handler doubles
//! - Server test harness (`TestGatekeeperServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gk_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let realm = MockRealm::start("acme").await;
//!
//!     let token = TestTokenBuilder::new()
//!         .with_tenant("acme-corp")
//!         .sign(TestKey::Primary);
//!
//!     let verifier = realm.verifier();
//!     assert_eq!(verifier.verify(&token).await.unwrap().as_str(), "acme-corp");
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_jwks;
pub mod mock_session;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_jwks::*;
pub use mock_session::*;
pub use server_harness::*;
pub use token_builders::*;
