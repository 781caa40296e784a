//! Builder patterns for test tokens
//!
//! Produces realm-shaped access tokens signed with the fixture keys.

use crate::crypto_fixtures::TestKey;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Map, Value};

/// Issuer used by default; deliberately not the mock realm URL.
pub const TEST_ISSUER: &str = "http://localhost:8080/realms/acme";

/// Tenant used by default.
pub const TEST_TENANT: &str = "acme-corp";

/// Builder for signed test access tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .with_tenant("globex")
///     .expires_in(60)
///     .sign(TestKey::Primary);
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    algorithm: Algorithm,
}

impl TestTokenBuilder {
    /// Create a builder for an active token with issuer, subject and tenant.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("tenant_id".to_string(), json!(TEST_TENANT));

        Self {
            claims,
            algorithm: Algorithm::RS256,
        }
    }

    /// Set the `tenant_id` claim
    pub fn with_tenant(self, tenant: &str) -> Self {
        self.with_claim("tenant_id", json!(tenant))
    }

    /// Set expiration in seconds from now (negative for expired tokens)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    /// Set the audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set any claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sign with a different RSA algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign the claims with a fixture key
    pub fn sign(self, key: TestKey) -> String {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(key.kid().to_string());
        encode(&header, &Value::Object(self.claims), &key.encoding_key())
            .expect("signing test token")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_active_claims() {
        let claims = TestTokenBuilder::new().with_tenant("globex").build();

        assert_eq!(claims["tenant_id"], "globex");
        assert_eq!(claims["iss"], TEST_ISSUER);
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_without_removes_claim() {
        let claims = TestTokenBuilder::new().without("tenant_id").build();
        assert!(claims.get("tenant_id").is_none());
    }

    #[test]
    fn test_sign_produces_compact_token() {
        let token = TestTokenBuilder::new().sign(TestKey::Primary);
        assert_eq!(token.split('.').count(), 3);
    }
}
