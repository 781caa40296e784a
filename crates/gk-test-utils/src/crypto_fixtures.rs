//! Deterministic cryptographic fixtures for testing
//!
//! Two fixed 2048-bit RSA keypairs: `Primary` is the one published by the
//! mock realm, `Other` signs tokens that must be rejected.

use jsonwebtoken::EncodingKey;
use serde_json::{json, Value};

/// PKCS#1 private key of the realm's published key.
pub const PRIMARY_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/rsa_primary.pem");

/// PKCS#1 private key unknown to the realm.
pub const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/rsa_other.pem");

/// base64url modulus of [`PRIMARY_PRIVATE_PEM`].
pub const PRIMARY_N: &str = "0KM0mWzUQT1AfcvardOLTnw-l94siJeDrP5o8ZbmlcfPQJSJHa-sle6VQSo8gnJ4Qma_BU02rHukVMa2coZuNrkTKwv9kO2ySN8Wtwq1bN8DoiFFv1pyl65WVTlmsoG1GHreJyFcqoNZ-mG6z5sqfTTeqRkH315Hk4NyfCGlqxtvliJ2FZWd90TtHoA5PbFtdfVgaaKv5NZ4L3U4dhISe2S8wNDFBiCP3-9pTSYTgy-wPB4ReUcT2avYehLxf3jbYEhpluZItD0LnrApYNIbQkQ8DhY3pG9m_63qJhBQkCfXRby2Z-IHuaiiq5jJa7YXyhe60b6fguIc6G5MN97cpQ";

/// base64url modulus of [`OTHER_PRIVATE_PEM`].
pub const OTHER_N: &str = "xi9qmzyGr_brWD4dd6m7S0Ch2piLbJw8c40jqNEBPv6t6OcMZhVNlOpT6nvxl2AQRlzhhC6BuWXS8BhjmULOOSnsMISTPsY60e-XBei1GTrhR_tAFz8iXFwCpJF6lzm5ii-Y1z3vd7Zr4PrsGJB7knwD56xZyjQdxgZaG6Ph8DS7L1d-lTZrhMgVTxVloaHaxxx6VlBlQ0WPmPxGoL1m5ni3JX0Ebsc0dtODUJ8IkqJCXO0V7sEGirmm4DyI0SSFN8bEP5XZIoiLnDD3u3Z0aVnQnbNbUACS6ZDiJSJej0Vwhzg5rbX360AYy_iSRWp1-I2yny7ImAF7VELAOPSXLw";

/// Public exponent shared by both keys (65537).
pub const RSA_E: &str = "AQAB";

/// One of the fixed test keypairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKey {
    Primary,
    Other,
}

impl TestKey {
    /// Key ID published in the JWK.
    pub fn kid(self) -> &'static str {
        match self {
            TestKey::Primary => "test-primary",
            TestKey::Other => "test-other",
        }
    }

    /// Private key for signing.
    pub fn encoding_key(self) -> EncodingKey {
        let pem = match self {
            TestKey::Primary => PRIMARY_PRIVATE_PEM,
            TestKey::Other => OTHER_PRIVATE_PEM,
        };
        EncodingKey::from_rsa_pem(pem).expect("fixture PEM is a valid RSA key")
    }

    /// Public JWK as published by a Keycloak realm.
    pub fn jwk_json(self) -> Value {
        let n = match self {
            TestKey::Primary => PRIMARY_N,
            TestKey::Other => OTHER_N,
        };
        json!({
            "kid": self.kid(),
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": n,
            "e": RSA_E,
        })
    }
}

/// JWKS body publishing `keys` in order.
pub fn jwks_json(keys: &[TestKey]) -> Value {
    json!({
        "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}
