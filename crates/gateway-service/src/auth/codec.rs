//! Session token codec.
//!
//! Encodes `{sub, iat, exp}` into a compact HS256 JWT signed with the
//! gateway's symmetric secret, and decodes it back.
//!
//! # Security
//!
//! - The secret must be at least 256 bits; construction fails otherwise
//! - Tokens are size-checked BEFORE parsing
//! - Only HS256 is accepted; any other `alg` is treated as malformed
//! - `validate` checks signature and structure only; expiry is a separate
//!   question answered against the injected clock

use crate::auth::claims::Claims;
use common::clock::Clock;
use common::jwt::{check_token_size, is_expired_at};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Minimum secret length in bytes (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Default session token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(10 * 60 * 60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Secret key must be at least 256 bits (32 bytes) long")]
    WeakSecret,

    #[error("Token lifetime is out of range")]
    InvalidTtl,

    #[error("Token subject must not be empty")]
    EmptySubject,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// HS256 encoder/decoder for session tokens.
pub struct ClaimsCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ClaimsCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimsCodec")
            .field("key", &"[REDACTED]")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl ClaimsCodec {
    /// Build a codec from the configured secret.
    ///
    /// # Errors
    ///
    /// - `WeakSecret` if the secret is shorter than [`MIN_SECRET_BYTES`]
    /// - `InvalidTtl` if `ttl` is zero or does not fit in i64 seconds
    pub fn new(
        secret: &SecretString,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CodecError> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(CodecError::WeakSecret);
        }

        let ttl_seconds = i64::try_from(ttl.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(CodecError::InvalidTtl)?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_seconds,
            clock,
        })
    }

    /// Token lifetime in seconds.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for `subject` valid from now until now + ttl.
    pub fn issue(&self, subject: &str) -> Result<String, CodecError> {
        if subject.is_empty() {
            return Err(CodecError::EmptySubject);
        }

        let iat = self.clock.now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl_seconds),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());

        encode(&header, &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "gateway.auth.codec", error = %e, "Token signing failed");
            CodecError::Signing(e.to_string())
        })
    }

    /// Verify signature and structure, returning the claims.
    ///
    /// Expired tokens decode successfully; ask [`ClaimsCodec::is_expired`]
    /// or compare `exp` yourself.
    pub fn validate(&self, token: &str) -> Result<Claims, CodecError> {
        check_token_size(token).map_err(|_| CodecError::Malformed)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "gateway.auth.codec", error = %e, "Token decode failed");
            match e.kind() {
                ErrorKind::InvalidSignature => CodecError::InvalidSignature,
                _ => CodecError::Malformed,
            }
        })?;

        if data.claims.sub.is_empty() {
            tracing::debug!(target: "gateway.auth.codec", "Token rejected: empty subject");
            return Err(CodecError::Malformed);
        }

        Ok(data.claims)
    }

    /// Whether the token's expiry instant has been reached.
    ///
    /// The signature is verified first; a forged token is an error, not
    /// "expired".
    pub fn is_expired(&self, token: &str) -> Result<bool, CodecError> {
        let claims = self.validate(token)?;
        Ok(self.is_claims_expired(&claims))
    }

    /// Expiry check for claims that were already validated.
    pub fn is_claims_expired(&self, claims: &Claims) -> bool {
        is_expired_at(claims.exp, self.clock.now().timestamp())
    }

    /// Subject of a verified token.
    pub fn subject_of(&self, token: &str) -> Result<String, CodecError> {
        self.validate(token).map(|claims| claims.sub)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use common::clock::ManualClock;

    const SECRET: &str = "storefront-session-secret-0123456789";
    const OTHER_SECRET: &str = "a-completely-different-secret-9876543210";
    const START: i64 = 1_700_000_000;

    fn codec_with(secret: &str, ttl: Duration) -> (ClaimsCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(START));
        let codec = ClaimsCodec::new(&SecretString::from(secret), ttl, clock.clone()).unwrap();
        (codec, clock)
    }

    fn codec() -> (ClaimsCodec, Arc<ManualClock>) {
        codec_with(SECRET, DEFAULT_TOKEN_TTL)
    }

    #[test]
    fn test_rejects_short_secret() {
        let result = ClaimsCodec::new(
            &SecretString::from("x".repeat(31)),
            DEFAULT_TOKEN_TTL,
            Arc::new(ManualClock::at_unix(START)),
        );
        assert_eq!(result.unwrap_err(), CodecError::WeakSecret);
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let result = ClaimsCodec::new(
            &SecretString::from(SECRET),
            Duration::ZERO,
            Arc::new(ManualClock::at_unix(START)),
        );
        assert_eq!(result.unwrap_err(), CodecError::InvalidTtl);
    }

    #[test]
    fn test_issue_sets_ten_hour_window() {
        let (codec, _clock) = codec();
        let token = codec.issue("shopper@example.com").unwrap();

        let claims = codec.validate(&token).unwrap();
        assert_eq!(claims.sub, "shopper@example.com");
        assert_eq!(claims.iat, START);
        assert_eq!(claims.exp, START + 36_000);
    }

    #[test]
    fn test_issue_uses_hs256_jwt_header() {
        let (codec, _clock) = codec();
        let token = codec.issue("shopper@example.com").unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_issue_rejects_empty_subject() {
        let (codec, _clock) = codec();
        assert_eq!(codec.issue("").unwrap_err(), CodecError::EmptySubject);
    }

    #[test]
    fn test_subject_of_round_trip() {
        let (codec, _clock) = codec();
        let token = codec.issue("shopper@example.com").unwrap();
        assert_eq!(codec.subject_of(&token).unwrap(), "shopper@example.com");
    }

    #[test]
    fn test_is_expired_follows_clock() {
        let (codec, clock) = codec();
        let token = codec.issue("shopper@example.com").unwrap();
        assert!(!codec.is_expired(&token).unwrap());

        clock.advance(Duration::from_secs(36_000 - 1));
        assert!(!codec.is_expired(&token).unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(
            codec.is_expired(&token).unwrap(),
            "token is expired once its expiry instant is reached"
        );
    }

    #[test]
    fn test_expired_token_still_validates_structurally() {
        let (codec, clock) = codec_with(SECRET, Duration::from_secs(1));
        let token = codec.issue("shopper@example.com").unwrap();

        clock.advance(Duration::from_secs(5));
        assert!(codec.validate(&token).is_ok());
        assert!(codec.is_expired(&token).unwrap());
    }

    #[test]
    fn test_foreign_secret_is_signature_error() {
        let (codec, _clock) = codec();
        let (foreign, _) = codec_with(OTHER_SECRET, DEFAULT_TOKEN_TTL);
        let token = foreign.issue("shopper@example.com").unwrap();

        assert_eq!(
            codec.validate(&token).unwrap_err(),
            CodecError::InvalidSignature
        );
        assert_eq!(
            codec.is_expired(&token).unwrap_err(),
            CodecError::InvalidSignature
        );
    }

    #[test]
    fn test_tampered_payload_is_signature_error() {
        let (codec, _clock) = codec();
        let token = codec.issue("shopper@example.com").unwrap();
        let mut parts = token.split('.');
        let header = parts.next().unwrap();
        let signature = parts.nth(1).unwrap();

        let forged_payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"sub":"admin@example.com","iat":{START},"exp":{}}}"#,
            START + 36_000
        ));
        let forged = format!("{header}.{forged_payload}.{signature}");

        assert_eq!(
            codec.validate(&forged).unwrap_err(),
            CodecError::InvalidSignature
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (codec, _clock) = codec();
        for garbage in ["", "garbage", "a.b", "a.b.c", "not.a.jwt.at.all"] {
            assert_eq!(
                codec.validate(garbage).unwrap_err(),
                CodecError::Malformed,
                "input {garbage:?}"
            );
        }
    }

    #[test]
    fn test_oversized_token_is_malformed() {
        let (codec, _clock) = codec();
        let oversized = "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(codec.validate(&oversized).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn test_other_algorithm_is_malformed() {
        let (codec, _clock) = codec();
        let claims = Claims {
            sub: "shopper@example.com".to_string(),
            iat: START,
            exp: START + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.validate(&token).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn test_missing_claims_are_malformed() {
        let (codec, _clock) = codec();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({"sub": "shopper@example.com", "exp": START + 60}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.validate(&token).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn test_debug_redacts_key() {
        let (codec, _clock) = codec();
        let debug = format!("{:?}", codec);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("[REDACTED]"));
    }
}
