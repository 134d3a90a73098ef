//! Remote key set (JWKS) provider.
//!
//! Fetches Google's published RSA signing keys and rebuilds a verification
//! key for a given `kid` from the base64url modulus and exponent.
//!
//! # Security
//!
//! - Key material only ever comes from the fetched key set; a token header
//!   can select a key, never supply one
//! - Moduli shorter than 2048 bits and even or trivial exponents are refused
//! - The HTTP client has a bounded timeout
//! - Nothing is cached unless a [`CachedKeySetSource`] is put in front

use crate::observability::metrics::record_jwks_fetch;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// Google's OAuth 2.0 certificate endpoint (JWK format).
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Smallest RSA modulus accepted for signature verification.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// RSA modulus (base64url, big-endian).
    pub n: String,

    /// RSA public exponent (base64url, big-endian).
    pub e: String,

    /// Key type (always "RSA" for Google).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// A fetched key set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<Jwk>,
}

impl KeySet {
    /// Find a key by ID.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyProviderError {
    #[error("Key set endpoint unavailable")]
    UpstreamUnavailable,

    #[error("Key set response is malformed")]
    MalformedKeySet,

    #[error("Key ID not present in key set")]
    UnknownKeyId,

    #[error("Public key could not be reconstructed: {0}")]
    KeyReconstruction(&'static str),
}

/// Where trusted key sets come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set.
    async fn fetch_key_set(&self) -> Result<KeySet, KeyProviderError>;
}

/// Fetches the key set over HTTPS on every call.
pub struct HttpKeySetSource {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for `jwks_url` with the given request timeout.
    pub fn new(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[instrument(skip_all, name = "gateway.auth.jwks.fetch")]
    async fn fetch_key_set(&self) -> Result<KeySet, KeyProviderError> {
        let start = Instant::now();
        let result = self.fetch().await;
        let status = match &result {
            Ok(_) => "success",
            Err(KeyProviderError::MalformedKeySet) => "malformed",
            Err(_) => "error",
        };
        record_jwks_fetch(status, start.elapsed());
        result
    }
}

impl HttpKeySetSource {
    async fn fetch(&self) -> Result<KeySet, KeyProviderError> {
        tracing::debug!(target: "gateway.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeyProviderError::UpstreamUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gateway.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeyProviderError::UpstreamUnavailable);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to read JWKS response");
            KeyProviderError::UpstreamUnavailable
        })?;

        let key_set: KeySet = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to parse JWKS response");
            KeyProviderError::MalformedKeySet
        })?;

        tracing::debug!(
            target: "gateway.auth.jwks",
            key_count = key_set.keys.len(),
            "JWKS fetched"
        );

        Ok(key_set)
    }
}

/// Fixed key set, for tests and offline deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySetSource {
    key_set: KeySet,
}

impl StaticKeySetSource {
    pub fn new(key_set: KeySet) -> Self {
        Self { key_set }
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch_key_set(&self) -> Result<KeySet, KeyProviderError> {
        Ok(self.key_set.clone())
    }
}

struct CachedKeySet {
    key_set: KeySet,
    expires_at: Instant,
}

/// Time-bounded cache in front of another source.
///
/// A cached set is served until its TTL lapses; the next call after that
/// refetches. Failed fetches are not cached.
pub struct CachedKeySetSource {
    inner: Arc<dyn KeySetSource>,
    cache: RwLock<Option<CachedKeySet>>,
    ttl: Duration,
}

impl CachedKeySetSource {
    pub fn new(inner: Arc<dyn KeySetSource>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
            ttl,
        }
    }

    /// Drop the cached set so the next call refetches.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

#[async_trait]
impl KeySetSource for CachedKeySetSource {
    async fn fetch_key_set(&self) -> Result<KeySet, KeyProviderError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    tracing::debug!(target: "gateway.auth.jwks", "JWKS cache hit");
                    return Ok(cached.key_set.clone());
                }
            }
        }

        let key_set = self.inner.fetch_key_set().await?;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeySet {
            key_set: key_set.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        tracing::info!(
            target: "gateway.auth.jwks",
            key_count = key_set.keys.len(),
            "JWKS cache refreshed"
        );

        Ok(key_set)
    }
}

/// Rebuild the RSA verification key for `kid` from a trusted key set.
///
/// # Errors
///
/// - `UnknownKeyId` when no key in the set carries `kid`
/// - `KeyReconstruction` when `n`/`e` are not valid base64url, the modulus is
///   zero or shorter than [`MIN_RSA_MODULUS_BITS`], or the exponent is even
///   or not greater than 1
pub fn resolve_public_key(kid: &str, key_set: &KeySet) -> Result<DecodingKey, KeyProviderError> {
    let jwk = key_set.find(kid).ok_or_else(|| {
        tracing::debug!(target: "gateway.auth.jwks", kid = %kid, "Key not found in JWKS");
        KeyProviderError::UnknownKeyId
    })?;

    let n = jwk.n.trim_end_matches('=');
    let e = jwk.e.trim_end_matches('=');

    let modulus = decode_unsigned(n).ok_or(KeyProviderError::KeyReconstruction(
        "modulus is not valid base64url",
    ))?;
    let exponent = decode_unsigned(e).ok_or(KeyProviderError::KeyReconstruction(
        "exponent is not valid base64url",
    ))?;

    let modulus_bits = bit_length(modulus);
    if modulus_bits == 0 {
        return Err(KeyProviderError::KeyReconstruction("modulus is zero"));
    }
    if modulus_bits < MIN_RSA_MODULUS_BITS {
        tracing::warn!(
            target: "gateway.auth.jwks",
            kid = %kid,
            modulus_bits,
            "Refusing short RSA modulus"
        );
        return Err(KeyProviderError::KeyReconstruction("modulus is too short"));
    }

    match exponent.last().copied() {
        None => return Err(KeyProviderError::KeyReconstruction("exponent is zero")),
        Some(low) if low % 2 == 0 => {
            return Err(KeyProviderError::KeyReconstruction("exponent is even"))
        }
        Some(1) if exponent.len() == 1 => {
            return Err(KeyProviderError::KeyReconstruction("exponent is one"))
        }
        Some(_) => {}
    }

    DecodingKey::from_rsa_components(n, e).map_err(|err| {
        tracing::debug!(target: "gateway.auth.jwks", kid = %kid, error = %err, "RSA key rejected");
        KeyProviderError::KeyReconstruction("invalid RSA components")
    })
}

/// Decode a base64url big-endian integer, stripping leading zero bytes.
fn decode_unsigned(value: &str) -> Option<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    Some(bytes.get(first_nonzero..).unwrap_or_default().to_vec())
}

fn bit_length(magnitude: Vec<u8>) -> usize {
    match magnitude.first() {
        None => 0,
        Some(top) => (magnitude.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
    }
}
