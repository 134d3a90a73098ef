//! Gateway configuration.
//!
//! Configuration is loaded from environment variables. The signing secret and
//! database URL are redacted in Debug output.

use crate::auth::codec::MIN_SECRET_BYTES;
use crate::auth::jwks::GOOGLE_JWKS_URL;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default session token lifetime (10 hours).
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 36_000;

/// Longest accepted session token lifetime (one year).
pub const MAX_TOKEN_TTL_SECONDS: u64 = 31_536_000;

/// Default bcrypt cost factor for password hashing.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost factor.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost factor.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default timeout for fetching the remote key set.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for the key set fetch timeout.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for the graceful-shutdown drain period.
pub const MAX_DRAIN_SECONDS: u64 = 300;

/// Default path scope guarded by the authentication gate.
pub const DEFAULT_GATE_PATH_PREFIX: &str = "/api/";

/// Paths that skip authentication by exact match.
pub const DEFAULT_BYPASS_PATHS: &[&str] = &[
    "/api/v1/authentication/login",
    "/api/v1/authentication/signin",
];

/// Paths that skip authentication by prefix match.
pub const DEFAULT_BYPASS_PREFIXES: &[&str] = &["/api/v1/authentication/oauth", "/api/v1/storage"];

/// Origins allowed by default (local storefront dev server).
pub const DEFAULT_CORS_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173"];

/// Issuers Google uses in ID tokens.
pub const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// Which browser origins receive CORS grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// `Access-Control-Allow-Origin: *`, no credentials.
    AnyOrigin,

    /// Exact-match allow-list; the matching origin is echoed back with credentials.
    AllowList(Vec<String>),
}

/// Request gate settings.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    /// Only paths under this prefix are gated.
    pub path_prefix: String,

    /// Paths that skip the token check when matched exactly.
    pub bypass_paths: Vec<String>,

    /// Paths that skip the token check when matched by prefix.
    pub bypass_prefixes: Vec<String>,

    /// CORS headers attached to gated responses.
    pub cors: CorsPolicy,
}

impl GatePolicy {
    /// Whether the gate handles this path at all.
    pub fn in_scope(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }

    /// Whether this path proceeds without a principal.
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
            || self
                .bypass_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            path_prefix: DEFAULT_GATE_PATH_PREFIX.to_string(),
            bypass_paths: to_owned_list(DEFAULT_BYPASS_PATHS),
            bypass_prefixes: to_owned_list(DEFAULT_BYPASS_PREFIXES),
            cors: CorsPolicy::AllowList(to_owned_list(DEFAULT_CORS_ALLOWED_ORIGINS)),
        }
    }
}

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// HS256 secret for session tokens. At least 32 bytes.
    pub jwt_secret: SecretString,

    /// Session token lifetime in seconds.
    pub token_ttl_seconds: u64,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// PostgreSQL connection URL. Unset selects the in-memory user store.
    pub database_url: Option<String>,

    /// Request gate settings.
    pub gate: GatePolicy,

    /// Google JWKS endpoint.
    pub google_jwks_url: String,

    /// Expected `aud` of Google ID tokens. Audience is not checked when unset.
    pub google_client_id: Option<String>,

    /// Key set fetch timeout in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Key set cache lifetime in seconds. Zero disables caching.
    pub jwks_cache_ttl_seconds: u64,

    /// Bcrypt cost factor for new password hashes.
    pub bcrypt_cost: u32,

    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("bind_address", &self.bind_address)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gate", &self.gate)
            .field("google_jwks_url", &self.google_jwks_url)
            .field("google_client_id", &self.google_client_id)
            .field(
                "jwks_fetch_timeout_seconds",
                &self.jwks_fetch_timeout_seconds,
            )
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Secret key must be at least 256 bits (32 bytes) long")]
    WeakSecret,

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid gate configuration: {0}")]
    InvalidGate(String),

    #[error("Invalid shutdown configuration: {0}")]
    InvalidShutdown(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = vars
            .get("JWT_SECRET_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET_KEY".to_string()))?;
        if jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret);
        }
        let jwt_secret = SecretString::from(jwt_secret.clone());

        let token_ttl_seconds = match vars.get("TOKEN_TTL_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidTokenTtl(format!(
                        "TOKEN_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&value) {
                    return Err(ConfigError::InvalidTokenTtl(format!(
                        "TOKEN_TTL_SECONDS must be between 1 and {}, got {}",
                        MAX_TOKEN_TTL_SECONDS, value
                    )));
                }
                value
            }
            None => DEFAULT_TOKEN_TTL_SECONDS,
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let database_url = vars
            .get("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let path_prefix = vars
            .get("GATE_PATH_PREFIX")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GATE_PATH_PREFIX.to_string());
        if !path_prefix.starts_with('/') {
            return Err(ConfigError::InvalidGate(format!(
                "GATE_PATH_PREFIX must start with '/', got '{}'",
                path_prefix
            )));
        }

        let bypass_paths = vars
            .get("AUTH_BYPASS_PATHS")
            .map(|raw| parse_list(raw))
            .unwrap_or_else(|| to_owned_list(DEFAULT_BYPASS_PATHS));

        let bypass_prefixes = vars
            .get("AUTH_BYPASS_PREFIXES")
            .map(|raw| parse_list(raw))
            .unwrap_or_else(|| to_owned_list(DEFAULT_BYPASS_PREFIXES));

        let cors = match vars.get("CORS_ALLOWED_ORIGINS") {
            Some(raw) if raw.trim() == "*" => CorsPolicy::AnyOrigin,
            Some(raw) => {
                let origins = parse_list(raw);
                if origins.iter().any(|o| o == "*") {
                    return Err(ConfigError::InvalidGate(
                        "CORS_ALLOWED_ORIGINS cannot mix '*' with explicit origins".to_string(),
                    ));
                }
                CorsPolicy::AllowList(origins)
            }
            None => CorsPolicy::AllowList(to_owned_list(DEFAULT_CORS_ALLOWED_ORIGINS)),
        };

        let google_jwks_url = vars
            .get("GOOGLE_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| GOOGLE_JWKS_URL.to_string());

        let google_client_id = vars
            .get("GOOGLE_CLIENT_ID")
            .filter(|id| !id.trim().is_empty())
            .cloned();

        let jwks_fetch_timeout_seconds = match vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwks(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if !(1..=MAX_JWKS_FETCH_TIMEOUT_SECONDS).contains(&value) {
                    return Err(ConfigError::InvalidJwks(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                        MAX_JWKS_FETCH_TIMEOUT_SECONDS, value
                    )));
                }
                value
            }
            None => DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        };

        let jwks_cache_ttl_seconds = match vars.get("JWKS_CACHE_TTL_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        let bcrypt_cost = match vars.get("BCRYPT_COST") {
            Some(value_str) => {
                let value: u32 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidBcryptCost(format!(
                        "BCRYPT_COST must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                    return Err(ConfigError::InvalidBcryptCost(format!(
                        "BCRYPT_COST must be between {} and {}, got {}",
                        MIN_BCRYPT_COST, MAX_BCRYPT_COST, value
                    )));
                }
                value
            }
            None => DEFAULT_BCRYPT_COST,
        };

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidShutdown(format!(
                        "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value > MAX_DRAIN_SECONDS {
                    return Err(ConfigError::InvalidShutdown(format!(
                        "DRAIN_SECONDS must be at most {}, got {}",
                        MAX_DRAIN_SECONDS, value
                    )));
                }
                value
            }
            None => 0,
        };

        Ok(Config {
            jwt_secret,
            token_ttl_seconds,
            bind_address,
            database_url,
            gate: GatePolicy {
                path_prefix,
                bypass_paths,
                bypass_prefixes,
                cors,
            },
            google_jwks_url,
            google_client_id,
            jwks_fetch_timeout_seconds,
            jwks_cache_ttl_seconds,
            bcrypt_cost,
            drain_seconds,
        })
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
