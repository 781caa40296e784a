//! Gatekeeper configuration.
//!
//! Configuration is loaded from environment variables. The realm location
//! is mandatory; everything else has a default.

use crate::auth::jwks::jwks_url;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default route for WebSocket upgrades.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default name of the claim carrying the tenant identifier.
pub const DEFAULT_TENANT_CLAIM: &str = "tenant_id";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 30;

/// Gatekeeper configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OpenID Connect server (e.g. "https://sso.example.com").
    pub keycloak_host: String,

    /// Realm whose signing key validates access tokens.
    pub keycloak_realm: String,

    /// JWKS endpoint derived from host and realm.
    pub jwks_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Route serving WebSocket upgrades (default: "/ws").
    pub ws_path: String,

    /// Claim holding the tenant identifier (default: "tenant_id").
    pub tenant_claim: String,

    /// Required `aud` value, if any.
    pub jwt_audience: Option<String>,

    /// JWT clock skew tolerance in seconds for claims validation.
    pub jwt_clock_skew_seconds: i64,

    /// Seconds between heartbeat pings to connected peers (default: 30).
    pub heartbeat_interval_seconds: u64,

    /// Accept a bare JWT in the `token` query parameter when no
    /// `Authorization` header is present (default: false).
    pub allow_query_token: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let keycloak_host = required_non_blank(vars, "KEYCLOAK_HOST")?;
        let keycloak_realm = required_non_blank(vars, "KEYCLOAK_REALM")?;
        let jwks_url = jwks_url(&keycloak_host, &keycloak_realm);

        let bind_address = vars
            .get("GK_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let ws_path = vars
            .get("GK_WS_PATH")
            .cloned()
            .unwrap_or_else(|| DEFAULT_WS_PATH.to_string());
        if !ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "GK_WS_PATH must start with '/', got '{}'",
                ws_path
            )));
        }

        let tenant_claim = vars
            .get("GK_TENANT_CLAIM")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TENANT_CLAIM.to_string());

        let jwt_audience = vars
            .get("GK_JWT_AUDIENCE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let heartbeat_interval_seconds =
            if let Some(value_str) = vars.get("GK_HEARTBEAT_INTERVAL_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "GK_HEARTBEAT_INTERVAL_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidValue(
                        "GK_HEARTBEAT_INTERVAL_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_HEARTBEAT_INTERVAL_SECONDS
            };

        let allow_query_token = match vars.get("GK_ALLOW_QUERY_TOKEN") {
            Some(value) => parse_bool("GK_ALLOW_QUERY_TOKEN", value)?,
            None => false,
        };

        Ok(Config {
            keycloak_host,
            keycloak_realm,
            jwks_url,
            bind_address,
            ws_path,
            tenant_claim,
            jwt_audience,
            jwt_clock_skew_seconds,
            heartbeat_interval_seconds,
            allow_query_token,
        })
    }

    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

fn required_non_blank(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    let value = vars
        .get(name)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;

    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue(format!(
            "{} must not be empty",
            name
        )));
    }

    Ok(value.trim().to_string())
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "KEYCLOAK_HOST".to_string(),
                "https://sso.example.com".to_string(),
            ),
            ("KEYCLOAK_REALM".to_string(), "acme".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.keycloak_host, "https://sso.example.com");
        assert_eq!(config.keycloak_realm, "acme");
        assert_eq!(
            config.jwks_url,
            "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
        );
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.ws_path, DEFAULT_WS_PATH);
        assert_eq!(config.tenant_claim, DEFAULT_TENANT_CLAIM);
        assert!(config.jwt_audience.is_none());
        assert_eq!(
            config.jwt_clock_skew_seconds,
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        );
        assert_eq!(
            config.heartbeat_interval_seconds,
            DEFAULT_HEARTBEAT_INTERVAL_SECONDS
        );
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert!(!config.allow_query_token);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("GK_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("GK_WS_PATH".to_string(), "/realtime".to_string());
        vars.insert("GK_TENANT_CLAIM".to_string(), "org".to_string());
        vars.insert("GK_JWT_AUDIENCE".to_string(), "ws-clients".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert(
            "GK_HEARTBEAT_INTERVAL_SECONDS".to_string(),
            "5".to_string(),
        );
        vars.insert("GK_ALLOW_QUERY_TOKEN".to_string(), "true".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.ws_path, "/realtime");
        assert_eq!(config.tenant_claim, "org");
        assert_eq!(config.jwt_audience.as_deref(), Some("ws-clients"));
        assert_eq!(config.jwt_clock_skew_seconds, 120);
        assert_eq!(config.heartbeat_interval_seconds, 5);
        assert!(config.allow_query_token);
    }

    #[test]
    fn test_from_vars_missing_host() {
        let mut vars = base_vars();
        vars.remove("KEYCLOAK_HOST");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "KEYCLOAK_HOST"));
    }

    #[test]
    fn test_from_vars_blank_realm() {
        let mut vars = base_vars();
        vars.insert("KEYCLOAK_REALM".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("KEYCLOAK_REALM")));
    }

    #[test]
    fn test_ws_path_must_be_absolute() {
        let mut vars = base_vars();
        vars.insert("GK_WS_PATH".to_string(), "ws".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_blank_tenant_claim_falls_back_to_default() {
        let mut vars = base_vars();
        vars.insert("GK_TENANT_CLAIM".to_string(), " ".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.tenant_claim, DEFAULT_TENANT_CLAIM);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("positive")));
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("600")));
    }

    #[test]
    fn test_jwt_clock_skew_accepts_max() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "five".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwtClockSkew(_))
        ));
    }

    #[test]
    fn test_heartbeat_interval_rejects_zero() {
        let mut vars = base_vars();
        vars.insert(
            "GK_HEARTBEAT_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("greater than 0")));
    }

    #[test]
    fn test_allow_query_token_rejects_garbage() {
        let mut vars = base_vars();
        vars.insert("GK_ALLOW_QUERY_TOKEN".to_string(), "maybe".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
