//! Access token verification.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Activity (`exp` / `nbf`) is checked strictly before the key is needed
//! - Only RSA algorithms (`RS*`, `PS*`) are accepted
//! - Signature and claims are two independent gates; both must pass
//! - The issuer claim must be present but is NOT matched against the realm
//!   URL, so tokens minted under an alternate hostname (loopback, internal
//!   DNS) are still accepted

use crate::auth::claims::AccessClaims;
use crate::auth::jwks::{KeyProvider, SigningKey};
use crate::errors::{AuthError, VerifyError};
use crate::observability::metrics;
use common::jwt::{decode_unverified_claims, is_active, split_compact};
use common::types::TenantId;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Claims consulted before the signature is checked.
#[derive(Debug, Deserialize)]
struct ActivityClaims {
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
}

/// Verifies bearer tokens against the realm signing key.
pub struct TokenVerifier {
    /// Source of the realm signing key.
    keys: Arc<KeyProvider>,

    /// Claim holding the tenant identifier.
    tenant_claim: String,

    /// Required audience, if configured.
    audience: Option<String>,

    /// Leeway in seconds for the claims gate.
    clock_skew_seconds: i64,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Arguments
    ///
    /// * `keys` - Provider for the realm signing key
    /// * `tenant_claim` - Name of the claim carrying the tenant identifier
    /// * `clock_skew_seconds` - Leeway for `exp` / `nbf` in the claims gate
    pub fn new(keys: Arc<KeyProvider>, tenant_claim: impl Into<String>, clock_skew_seconds: i64) -> Self {
        Self {
            keys,
            tenant_claim: tenant_claim.into(),
            audience: None,
            clock_skew_seconds,
        }
    }

    /// Require `aud` to contain `audience`.
    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Key provider backing this verifier.
    pub fn key_provider(&self) -> &Arc<KeyProvider> {
        &self.keys
    }

    /// Verify a bare JWT and return its tenant identifier.
    ///
    /// # Errors
    ///
    /// - `AuthError::Malformed` - empty, oversized or structurally invalid
    /// - `AuthError::Inactive` - expired or not yet valid
    /// - `KeyFetchError` - the realm key could not be obtained
    /// - `AuthError::BadSignature` - non-RSA algorithm or signature mismatch
    /// - `AuthError::PolicyRejected` - claims rejected by the claims gate
    #[instrument(skip_all, name = "gk.auth.verify")]
    pub async fn verify(&self, token: &str) -> Result<TenantId, VerifyError> {
        let start = Instant::now();
        let result = self.verify_inner(token).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(VerifyError::Auth(_)) => "rejected",
            Err(VerifyError::KeyFetch(_)) => "key_unavailable",
        };
        metrics::record_token_verification(outcome, start.elapsed());

        result
    }

    async fn verify_inner(&self, token: &str) -> Result<TenantId, VerifyError> {
        if token.trim().is_empty() {
            tracing::debug!(target: "gk.auth.jwt", "Empty token");
            return Err(AuthError::Malformed.into());
        }

        // 1. Structure (size check happens in split_compact)
        let parts = split_compact(token).map_err(|e| {
            tracing::debug!(target: "gk.auth.jwt", error = ?e, "Token structure rejected");
            AuthError::Malformed
        })?;

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "gk.auth.jwt", error = %e, "Token header rejected");
            AuthError::Malformed
        })?;

        let activity: ActivityClaims = decode_unverified_claims(token).map_err(|e| {
            tracing::debug!(target: "gk.auth.jwt", error = ?e, "Token payload rejected");
            AuthError::Malformed
        })?;

        // 2. Activity, strict
        if !is_active(activity.exp, activity.nbf) {
            tracing::debug!(
                target: "gk.auth.jwt",
                exp = ?activity.exp,
                nbf = ?activity.nbf,
                "Token is not active"
            );
            return Err(AuthError::Inactive.into());
        }

        // 3. Signature
        let key = self.keys.ensure_key().await?;

        if !is_rsa(header.alg) {
            tracing::debug!(target: "gk.auth.jwt", alg = ?header.alg, "Unsupported token algorithm");
            return Err(AuthError::BadSignature.into());
        }

        let signing_input = token
            .get(..parts.signing_input_len())
            .ok_or(AuthError::Malformed)?;

        match jsonwebtoken::crypto::verify(
            parts.signature,
            signing_input.as_bytes(),
            key.decoding_key(),
            header.alg,
        ) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(target: "gk.auth.jwt", "Token signature mismatch");
                return Err(AuthError::BadSignature.into());
            }
            Err(e) => {
                tracing::debug!(target: "gk.auth.jwt", error = %e, "Token signature could not be checked");
                return Err(AuthError::BadSignature.into());
            }
        }

        // 4. Claims
        let claims = self.check_claims(token, header.alg, &key)?;

        let tenant = claims.tenant(&self.tenant_claim).ok_or_else(|| {
            tracing::debug!(
                target: "gk.auth.jwt",
                claim = %self.tenant_claim,
                "Tenant claim missing or not a string"
            );
            AuthError::PolicyRejected(format!("missing tenant claim '{}'", self.tenant_claim))
        })?;

        tracing::debug!(target: "gk.auth.jwt", tenant = %tenant, "Token verified");
        Ok(tenant)
    }

    fn check_claims(
        &self,
        token: &str,
        alg: Algorithm,
        key: &SigningKey,
    ) -> Result<AccessClaims, AuthError> {
        let mut validation = Validation::new(alg);
        validation.leeway = u64::try_from(self.clock_skew_seconds).unwrap_or(0);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss"]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        decode::<AccessClaims>(token, key.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "gk.auth.jwt", error = %e, "Token claims rejected");
                AuthError::PolicyRejected(e.to_string())
            })
    }
}

fn is_rsa(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}
