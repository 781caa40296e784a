//! Realm signing key provider.
//!
//! Fetches the realm's JSON Web Key Set from the OpenID Connect server and
//! caches the first published key for the lifetime of the provider.
//!
//! # Security
//!
//! - Only `keys[0]` is used; multi-key sets and key rotation are not supported
//! - A failed fetch caches nothing, so the next verification retries
//! - HTTPS should be used in production (enforced by deployment config)

use crate::errors::KeyFetchError;
use crate::observability::metrics;
use common::jwt::decode_jwk_component;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// HTTP timeout for a single JWKS request.
const JWKS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the JWKS endpoint URL for a realm.
///
/// Trailing slashes on `host` and stray slashes around `realm` are ignored.
pub fn jwks_url(host: &str, realm: &str) -> String {
    format!(
        "{}/realms/{}/protocol/openid-connect/certs",
        host.trim().trim_end_matches('/'),
        realm.trim().trim_matches('/')
    )
}

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for realm signing keys).
    #[serde(default)]
    pub kty: Option<String>,

    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm hint (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// Published keys, in server order.
    pub keys: Vec<Jwk>,
}

/// RSA public key derived from the first JWK of the realm.
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a JWK.
    ///
    /// # Errors
    ///
    /// Returns `KeyFetchError::InvalidKey` if the key is not RSA, lacks `n`
    /// or `e`, or either component is not base64url.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyFetchError> {
        if let Some(kty) = jwk.kty.as_deref() {
            if kty != "RSA" {
                return Err(KeyFetchError::InvalidKey(format!(
                    "unsupported key type '{}'",
                    kty
                )));
            }
        }

        let modulus = decode_component(jwk.n.as_deref(), "n")?;
        let exponent = decode_component(jwk.e.as_deref(), "e")?;

        Ok(Self {
            kid: jwk.kid.clone(),
            decoding_key: DecodingKey::from_rsa_raw_components(&modulus, &exponent),
        })
    }

    /// Key ID published with the key, if any.
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Key for signature verification.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

fn decode_component(value: Option<&str>, name: &str) -> Result<Vec<u8>, KeyFetchError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KeyFetchError::InvalidKey(format!("missing '{}' component", name)))?;

    let bytes = decode_jwk_component(value).map_err(|e| {
        KeyFetchError::InvalidKey(format!("'{}' is not base64url: {}", name, e))
    })?;

    if bytes.is_empty() {
        return Err(KeyFetchError::InvalidKey(format!(
            "empty '{}' component",
            name
        )));
    }
    Ok(bytes)
}

/// Fetches and caches the realm signing key.
///
/// Thread-safe. The key is fetched lazily on first use; concurrent
/// first-use callers wait on a single in-flight request.
pub struct KeyProvider {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached key, `None` until a fetch succeeds.
    cache: RwLock<Option<Arc<SigningKey>>>,

    /// Serializes fetches.
    fetch_lock: Mutex<()>,
}

impl KeyProvider {
    /// Create a provider bound to a JWKS endpoint.
    ///
    /// No request is made until [`KeyProvider::ensure_key`] is called.
    pub fn new(jwks_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(JWKS_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gk.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(()),
        }
    }

    /// JWKS endpoint this provider fetches from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Return the signing key, fetching it if nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns `KeyFetchError` if the endpoint cannot be reached, answers
    /// with a non-success status, or publishes no usable key. Nothing is
    /// cached in that case.
    pub async fn ensure_key(&self) -> Result<Arc<SigningKey>, KeyFetchError> {
        if let Some(key) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(key));
        }

        let _fetch_guard = self.fetch_lock.lock().await;

        // Another caller may have finished the fetch while we waited.
        if let Some(key) = self.cache.read().await.as_ref() {
            tracing::debug!(target: "gk.auth.jwks", "Signing key fetched by concurrent caller");
            return Ok(Arc::clone(key));
        }

        let key = Arc::new(self.fetch().await?);
        *self.cache.write().await = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Drop the cached key so the next call refetches.
    pub async fn reset(&self) {
        let mut cache = self.cache.write().await;
        if cache.take().is_some() {
            tracing::info!(target: "gk.auth.jwks", "Signing key cache cleared");
        }
    }

    /// Whether a key is currently cached.
    pub async fn is_cached(&self) -> bool {
        self.cache.read().await.is_some()
    }

    #[instrument(skip_all, name = "gk.auth.jwks.fetch")]
    async fn fetch(&self) -> Result<SigningKey, KeyFetchError> {
        let result = self.fetch_inner().await;
        metrics::record_jwks_fetch(if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn fetch_inner(&self) -> Result<SigningKey, KeyFetchError> {
        tracing::debug!(target: "gk.auth.jwks", url = %self.jwks_url, "Fetching realm JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gk.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeyFetchError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "gk.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gk.auth.jwks", error = %e, "Failed to parse JWKS response");
            KeyFetchError::Parse(e.to_string())
        })?;

        let first = jwks.keys.first().ok_or_else(|| {
            tracing::error!(target: "gk.auth.jwks", "JWKS contains no keys");
            KeyFetchError::EmptyKeySet
        })?;

        if jwks.keys.len() > 1 {
            tracing::warn!(
                target: "gk.auth.jwks",
                key_count = jwks.keys.len(),
                "JWKS publishes several keys, only the first is used"
            );
        }

        let key = SigningKey::from_jwk(first).map_err(|e| {
            tracing::error!(target: "gk.auth.jwks", error = %e, "JWKS key is unusable");
            e
        })?;

        tracing::info!(
            target: "gk.auth.jwks",
            kid = key.kid().unwrap_or("<none>"),
            "Realm signing key cached"
        );

        Ok(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_jwks_url_construction() {
        assert_eq!(
            jwks_url("https://sso.example.com", "acme"),
            "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
        );
        assert_eq!(
            jwks_url("https://sso.example.com/", "/acme/"),
            "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
        );
        assert_eq!(
            jwks_url("http://localhost:8080//", "master"),
            "http://localhost:8080/realms/master/protocol/openid-connect/certs"
        );
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kid": "abc",
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": "AQAB",
            "e": "AQAB",
            "x5c": ["ignored"]
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();
        assert_eq!(jwk.kid.as_deref(), Some("abc"));
        assert_eq!(jwk.kty.as_deref(), Some("RSA"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
    }

    #[test]
    fn test_signing_key_from_valid_jwk() {
        let jwk = Jwk {
            kty: Some("RSA".to_string()),
            kid: Some("k1".to_string()),
            n: Some("0KM0mWzUQT1AfcvardOLTnw".to_string()),
            e: Some("AQAB".to_string()),
            alg: None,
        };

        let key = SigningKey::from_jwk(&jwk).unwrap();
        assert_eq!(key.kid(), Some("k1"));
    }

    #[test]
    fn test_signing_key_accepts_padded_components() {
        let jwk = Jwk {
            kty: None,
            kid: None,
            n: Some("AQID".to_string()),
            e: Some("AQA=".to_string()),
            alg: None,
        };

        assert!(SigningKey::from_jwk(&jwk).is_ok());
    }

    #[test]
    fn test_signing_key_rejects_missing_components() {
        let jwk = Jwk {
            kty: Some("RSA".to_string()),
            kid: None,
            n: None,
            e: Some("AQAB".to_string()),
            alg: None,
        };

        let err = SigningKey::from_jwk(&jwk).unwrap_err();
        assert!(matches!(err, KeyFetchError::InvalidKey(msg) if msg.contains("'n'")));
    }

    #[test]
    fn test_signing_key_rejects_bad_base64() {
        let jwk = Jwk {
            kty: Some("RSA".to_string()),
            kid: None,
            n: Some("!!!not-base64!!!".to_string()),
            e: Some("AQAB".to_string()),
            alg: None,
        };

        assert!(matches!(
            SigningKey::from_jwk(&jwk),
            Err(KeyFetchError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_signing_key_rejects_non_rsa() {
        let jwk = Jwk {
            kty: Some("OKP".to_string()),
            kid: None,
            n: None,
            e: None,
            alg: Some("EdDSA".to_string()),
        };

        assert!(matches!(
            SigningKey::from_jwk(&jwk),
            Err(KeyFetchError::InvalidKey(msg)) if msg.contains("OKP")
        ));
    }

    #[test]
    fn test_signing_key_debug_omits_key_material() {
        let jwk = Jwk {
            kty: None,
            kid: Some("k1".to_string()),
            n: Some("AQID".to_string()),
            e: Some("AQAB".to_string()),
            alg: None,
        };

        let debug_str = format!("{:?}", SigningKey::from_jwk(&jwk).unwrap());
        assert!(debug_str.contains("k1"));
        assert!(!debug_str.contains("AQID"));
    }

    #[tokio::test]
    async fn test_new_provider_has_empty_cache() {
        let provider = KeyProvider::new(jwks_url("http://127.0.0.1:1", "acme"));
        assert!(!provider.is_cached().await);
        assert_eq!(
            provider.jwks_url(),
            "http://127.0.0.1:1/realms/acme/protocol/openid-connect/certs"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_caches_nothing() {
        let provider = KeyProvider::new(jwks_url("http://127.0.0.1:1", "acme"));

        let result = provider.ensure_key().await;
        assert!(matches!(result, Err(KeyFetchError::Request(_))));
        assert!(!provider.is_cached().await);
    }
}
