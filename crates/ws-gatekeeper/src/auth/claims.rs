//! Access token claims.
//!
//! Contains the claims extracted from verified tokens. The `sub` field is
//! redacted in Debug output to prevent exposure in logs.

use common::types::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claims of a verified access token.
///
/// Standard registered claims are typed; everything else (including the
/// tenant claim, whose name is configurable) lands in `extra`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issuer. Required, but not matched against the realm URL.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Subject (user id) - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience, either a single string or an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    /// Remaining claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("extra_claims", &self.extra.len())
            .finish()
    }
}

impl AccessClaims {
    /// Tenant identifier carried in `claim`.
    ///
    /// Returns `None` if the claim is absent, not a string, or blank.
    pub fn tenant(&self, claim: &str) -> Option<TenantId> {
        let value = match claim {
            "iss" => Some(self.iss.as_str()),
            "sub" => self.sub.as_deref(),
            other => self.extra.get(other).and_then(Value::as_str),
        }?;

        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(TenantId::from(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims_from(json: Value) -> AccessClaims {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let claims = claims_from(serde_json::json!({
            "iss": "https://sso.example.com/realms/acme",
            "exp": 1234567890,
            "sub": "secret-user-id",
            "tenant_id": "acme"
        }));

        let debug_str = format!("{:?}", claims);

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain actual sub value"
        );
        assert!(
            debug_str.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
    }

    #[test]
    fn test_tenant_from_custom_claim() {
        let claims = claims_from(serde_json::json!({
            "iss": "issuer",
            "exp": 1234567890,
            "org": "globex"
        }));

        assert_eq!(claims.tenant("org"), Some(TenantId::from("globex")));
        assert_eq!(claims.tenant("tenant_id"), None);
    }

    #[test]
    fn test_tenant_rejects_non_string_and_blank() {
        let claims = claims_from(serde_json::json!({
            "iss": "issuer",
            "exp": 1234567890,
            "tenant_id": 42,
            "blank": "  "
        }));

        assert_eq!(claims.tenant("tenant_id"), None);
        assert_eq!(claims.tenant("blank"), None);
    }

    #[test]
    fn test_tenant_from_registered_claim() {
        let claims = claims_from(serde_json::json!({
            "iss": "issuer",
            "exp": 1234567890,
            "sub": "user-1"
        }));

        assert_eq!(claims.tenant("sub"), Some(TenantId::from("user-1")));
        assert_eq!(claims.tenant("iss"), Some(TenantId::from("issuer")));
    }

    #[test]
    fn test_audience_accepts_string_or_array() {
        let single = claims_from(serde_json::json!({
            "iss": "issuer", "exp": 1, "aud": "ws-clients"
        }));
        let many = claims_from(serde_json::json!({
            "iss": "issuer", "exp": 1, "aud": ["ws-clients", "account"]
        }));

        assert!(single.aud.unwrap().is_string());
        assert!(many.aud.unwrap().is_array());
    }
}
