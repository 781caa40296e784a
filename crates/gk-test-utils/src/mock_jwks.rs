//! Mock OpenID Connect realm
//!
//! Serves the realm JWKS endpoint from a `wiremock` server so verifiers can
//! be pointed at it like at a real Keycloak.

use crate::crypto_fixtures::{jwks_json, TestKey};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ws_gatekeeper::auth::{jwks_url, KeyProvider, TokenVerifier};

/// Default realm name.
pub const TEST_REALM: &str = "acme";

/// A realm whose JWKS endpoint is served by wiremock.
pub struct MockRealm {
    server: MockServer,
    realm: String,
}

impl MockRealm {
    /// Start a realm publishing [`TestKey::Primary`].
    pub async fn start(realm: &str) -> Self {
        let mock = Self::start_empty(realm).await;
        mock.publish(&[TestKey::Primary]).await;
        mock
    }

    /// Start a realm with no JWKS mounted (every request gets 404).
    pub async fn start_empty(realm: &str) -> Self {
        Self {
            server: MockServer::start().await,
            realm: realm.to_string(),
        }
    }

    /// Base URL, as configured in `KEYCLOAK_HOST`.
    pub fn host(&self) -> String {
        self.server.uri()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Path of the JWKS endpoint.
    pub fn jwks_path(&self) -> String {
        format!("/realms/{}/protocol/openid-connect/certs", self.realm)
    }

    /// Full JWKS URL.
    pub fn jwks_url(&self) -> String {
        jwks_url(&self.host(), &self.realm)
    }

    /// Replace every mounted response with a JWKS publishing `keys`.
    pub async fn publish(&self, keys: &[TestKey]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .await;
    }

    /// Replace every mounted response with an error status.
    pub async fn fail_with(&self, status: u16) {
        self.respond_with(ResponseTemplate::new(status)).await;
    }

    /// Replace every mounted response with `template`.
    ///
    /// Resets the server, so previously received requests are forgotten.
    pub async fn respond_with(&self, template: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Number of JWKS requests received since the last reset.
    pub async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Key provider bound to this realm.
    pub fn key_provider(&self) -> Arc<KeyProvider> {
        Arc::new(KeyProvider::new(self.jwks_url()))
    }

    /// Verifier bound to this realm with the default tenant claim.
    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(self.key_provider(), "tenant_id", 300)
    }
}
