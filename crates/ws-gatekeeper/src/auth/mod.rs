//! Bearer token authentication against an OpenID Connect realm.
//!
//! - `jwks` - fetches and caches the realm signing key
//! - `jwt` - verifies tokens and extracts the tenant claim
//! - `claims` - verified claims

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::AccessClaims;
pub use jwks::{jwks_url, KeyProvider, SigningKey};
pub use jwt::TokenVerifier;
