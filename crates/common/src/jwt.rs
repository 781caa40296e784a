//! JWT utilities shared across gatekeeper components.
//!
//! This module provides the structural, signature-independent part of token
//! handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for claims validation
//! - `Bearer ` prefix handling for header and in-band credentials
//! - Compact-serialization splitting and unverified claims decoding
//! - Activity (`exp` / `nbf`) evaluation
//! - Lenient base64url decoding for JWK key components
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing in here verifies a signature; claims decoded by
//!   [`decode_unverified_claims`] MUST NOT be trusted until the token has
//!   been verified against the realm key
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{strip_bearer_prefix, decode_unverified_claims, is_active_at};
//!
//! let token = strip_bearer_prefix(header_value).ok_or(AuthError::Malformed)?;
//! let claims: MyClaims = decode_unverified_claims(token)?;
//! if !is_active_at(claims.exp, claims.nbf, now) {
//!     return Err(AuthError::Inactive);
//! }
//! ```

use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Typical access tokens issued by an OpenID Connect
/// realm are 800-2000 bytes, so 8KB leaves room for custom claims.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would let stale tokens through.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Scheme prefix carried by both the `Authorization` header and the in-band
/// late-authentication message.
pub const BEARER_PREFIX: &str = "Bearer ";

/// base64url engine that accepts both padded and unpadded input.
///
/// Identity providers disagree on whether JWK components are padded.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =============================================================================
// Error Types
// =============================================================================

/// Structural errors found before any signature check.
///
/// Messages are intentionally generic; details are logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Types
// =============================================================================

/// The three dot-separated segments of a compact JWS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactToken<'a> {
    /// base64url header segment.
    pub header: &'a str,
    /// base64url payload segment.
    pub payload: &'a str,
    /// base64url signature segment.
    pub signature: &'a str,
}

impl CompactToken<'_> {
    /// Length of the signing input (`header.payload`) within the original token.
    #[must_use]
    pub fn signing_input_len(&self) -> usize {
        self.header.len() + 1 + self.payload.len()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Strip the `Bearer ` scheme prefix from a credential value.
///
/// Returns `None` when the prefix is missing or nothing but whitespace
/// follows it. The comparison is exact (case-sensitive, single space) to
/// match what clients are told to send.
#[must_use]
pub fn strip_bearer_prefix(value: &str) -> Option<&str> {
    value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Split a compact JWS into its three segments.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not exactly three non-empty header/payload segments
pub fn split_compact(token: &str) -> Result<CompactToken<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() =>
        {
            Ok(CompactToken {
                header,
                payload,
                signature,
            })
        }
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Decode the payload of a compact JWS into `T` WITHOUT verifying it.
///
/// Used to evaluate cheap structural and activity checks before the realm
/// key is needed. The result must not be trusted on its own.
///
/// # Errors
///
/// Returns `TokenTooLarge` or `MalformedToken` (bad segment count, bad
/// base64url, payload that does not deserialize into `T`).
pub fn decode_unverified_claims<T: DeserializeOwned>(
    token: &str,
) -> Result<T, JwtValidationError> {
    let parts = split_compact(token)?;

    let payload_bytes = URL_SAFE_NO_PAD.decode(parts.payload).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT payload base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&payload_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT payload JSON");
        JwtValidationError::MalformedToken
    })
}

/// Whether a token with the given `exp` / `nbf` is active at `now`.
///
/// A missing or zero `exp` means the token never expires; a missing or zero
/// `nbf` means it is valid immediately. No skew is applied here.
#[must_use]
pub fn is_active_at(exp: Option<i64>, nbf: Option<i64>, now: i64) -> bool {
    let expired = matches!(exp, Some(exp) if exp != 0 && now > exp);
    let not_yet_valid = matches!(nbf, Some(nbf) if nbf != 0 && now < nbf);
    !expired && !not_yet_valid
}

/// Whether a token with the given `exp` / `nbf` is active right now.
#[must_use]
pub fn is_active(exp: Option<i64>, nbf: Option<i64>) -> bool {
    is_active_at(exp, nbf, chrono::Utc::now().timestamp())
}

/// Decode a JWK numeric component (RSA `n` / `e`) from base64url.
///
/// Accepts padded and unpadded input.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not base64url.
pub fn decode_jwk_component(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct SampleClaims {
        sub: String,
        #[serde(default)]
        exp: Option<i64>,
    }

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        format!("{header}.{payload}.c2ln")
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_clock_skew_bounds() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
    }

    // -------------------------------------------------------------------------
    // strip_bearer_prefix
    // -------------------------------------------------------------------------

    #[test]
    fn test_strip_bearer_prefix() {
        assert_eq!(strip_bearer_prefix("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(strip_bearer_prefix("Bearer   abc  "), Some("abc"));
    }

    #[test]
    fn test_strip_bearer_prefix_rejects_other_values() {
        assert_eq!(strip_bearer_prefix(""), None);
        assert_eq!(strip_bearer_prefix("Bearer "), None);
        assert_eq!(strip_bearer_prefix("Bearer    "), None);
        assert_eq!(strip_bearer_prefix("bearer abc"), None);
        assert_eq!(strip_bearer_prefix("Basic dXNlcjpwYXNz"), None);
        assert_eq!(strip_bearer_prefix("abc.def.ghi"), None);
    }

    // -------------------------------------------------------------------------
    // split_compact
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_compact_valid() {
        let parts = split_compact("aaa.bbb.ccc").unwrap();
        assert_eq!(parts.header, "aaa");
        assert_eq!(parts.payload, "bbb");
        assert_eq!(parts.signature, "ccc");
        assert_eq!(parts.signing_input_len(), "aaa.bbb".len());
    }

    #[test]
    fn test_split_compact_wrong_segment_count() {
        assert_eq!(split_compact("single"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_compact("only.two"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_compact("a.b.c.d"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_compact(""), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_compact(".b.c"), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_split_compact_oversized() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(split_compact(&oversized), Err(JwtValidationError::TokenTooLarge));
    }

    #[test]
    fn test_split_compact_at_size_limit() {
        let remaining = MAX_JWT_SIZE_BYTES - 2;
        let token = format!(
            "{}.{}.{}",
            "a".repeat(remaining / 2),
            "b".repeat(remaining - remaining / 2 - 1),
            "c"
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert!(split_compact(&token).is_ok());
    }

    // -------------------------------------------------------------------------
    // decode_unverified_claims
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_unverified_claims() {
        let token = token_with_payload(r#"{"sub":"alice","exp":42}"#);
        let claims: SampleClaims = decode_unverified_claims(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, Some(42));
    }

    #[test]
    fn test_decode_unverified_claims_invalid_base64() {
        let result: Result<SampleClaims, _> = decode_unverified_claims("aaa.!!!.ccc");
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_decode_unverified_claims_not_json() {
        let token = token_with_payload("not json");
        let result: Result<SampleClaims, _> = decode_unverified_claims(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_decode_unverified_claims_wrong_shape() {
        // sub must be a string
        let token = token_with_payload(r#"{"sub":12}"#);
        let result: Result<SampleClaims, _> = decode_unverified_claims(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    // -------------------------------------------------------------------------
    // is_active_at
    // -------------------------------------------------------------------------

    #[test]
    fn test_is_active_at_window() {
        let now = 1_700_000_000_i64;
        assert!(is_active_at(Some(now + 60), None, now));
        assert!(is_active_at(Some(now), None, now), "exp == now is still active");
        assert!(!is_active_at(Some(now - 1), None, now));
        assert!(is_active_at(Some(now + 60), Some(now), now));
        assert!(!is_active_at(Some(now + 60), Some(now + 1), now));
    }

    #[test]
    fn test_is_active_at_zero_and_missing_claims() {
        let now = 1_700_000_000_i64;
        assert!(is_active_at(None, None, now));
        assert!(is_active_at(Some(0), Some(0), now));
    }

    #[test]
    fn test_is_active_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(is_active(Some(now + 3600), None));
        assert!(!is_active(Some(now - 3600), None));
    }

    // -------------------------------------------------------------------------
    // decode_jwk_component
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_jwk_component_padding_indifferent() {
        // 65537
        assert_eq!(decode_jwk_component("AQAB").unwrap(), vec![1, 0, 1]);
        assert_eq!(decode_jwk_component("AQ").unwrap(), vec![1]);
        assert_eq!(decode_jwk_component("AQ==").unwrap(), vec![1]);
    }

    #[test]
    fn test_decode_jwk_component_rejects_standard_alphabet() {
        assert!(decode_jwk_component("a+b/").is_err());
    }
}
