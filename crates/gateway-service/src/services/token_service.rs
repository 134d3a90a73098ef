//! Token service.
//!
//! Composes the session codec and the remote key provider behind one API:
//! issue and validate first-party session tokens, and verify third-party
//! (Google) identity tokens.
//!
//! Identity verification failures are collapsed into
//! [`TokenError::InvalidIdentityToken`]. The specific reason is logged at
//! debug level and counted, never returned.

use crate::auth::claims::IdentityClaims;
use crate::auth::codec::{ClaimsCodec, CodecError};
use crate::auth::identity::{verify_identity_token, IdentityError, IdentityValidation};
use crate::auth::jwks::KeySetSource;
use crate::config::{Config, GOOGLE_ISSUERS};
use crate::observability::metrics::record_token_validation;
use common::clock::Clock;
use common::jwt::extract_kid;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is invalid: {0}")]
    Invalid(CodecError),

    #[error("Identity token is invalid")]
    InvalidIdentityToken,
}

impl TokenError {
    /// Bounded label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Expired => "expired",
            TokenError::Invalid(CodecError::InvalidSignature) => "signature",
            TokenError::Invalid(_) => "malformed",
            TokenError::InvalidIdentityToken => "identity",
        }
    }
}

pub struct TokenService {
    codec: ClaimsCodec,
    key_source: Arc<dyn KeySetSource>,
    identity_validation: IdentityValidation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        codec: ClaimsCodec,
        key_source: Arc<dyn KeySetSource>,
        identity_validation: IdentityValidation,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec,
            key_source,
            identity_validation,
            clock,
        }
    }

    /// Build the service from configuration.
    ///
    /// Fails with `CodecError::WeakSecret` or `CodecError::InvalidTtl` when
    /// the session settings are unusable.
    pub fn from_config(
        config: &Config,
        key_source: Arc<dyn KeySetSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CodecError> {
        let codec = ClaimsCodec::new(
            &config.jwt_secret,
            Duration::from_secs(config.token_ttl_seconds),
            clock.clone(),
        )?;
        let identity_validation = IdentityValidation::new(
            GOOGLE_ISSUERS.iter().map(ToString::to_string).collect(),
            config.google_client_id.clone(),
        );

        Ok(Self::new(codec, key_source, identity_validation, clock))
    }

    /// Issue a session token for `subject`.
    pub fn issue_first_party_token(&self, subject: &str) -> Result<String, TokenError> {
        self.codec.issue(subject).map_err(TokenError::Invalid)
    }

    /// Validate a session token and return its subject.
    ///
    /// The signature is checked before expiry, so a token signed with another
    /// secret is always `Invalid`, never `Expired`.
    #[instrument(skip_all, name = "gateway.token.validate")]
    pub fn validate_first_party_token(&self, token: &str) -> Result<String, TokenError> {
        let result = self
            .codec
            .validate(token)
            .map_err(TokenError::Invalid)
            .and_then(|claims| {
                if self.codec.is_claims_expired(&claims) {
                    Err(TokenError::Expired)
                } else {
                    Ok(claims.sub)
                }
            });

        match &result {
            Ok(_) => record_token_validation("session", None),
            Err(e) => {
                tracing::debug!(target: "gateway.token", reason = e.reason(), "Session token rejected");
                record_token_validation("session", Some(e.reason()));
            }
        }

        result
    }

    /// Whether a session token has reached its expiry instant.
    pub fn is_expired(&self, token: &str) -> Result<bool, TokenError> {
        self.codec.is_expired(token).map_err(TokenError::Invalid)
    }

    /// Subject of a session token, without an expiry check.
    pub fn subject_of(&self, token: &str) -> Result<String, TokenError> {
        self.codec.subject_of(token).map_err(TokenError::Invalid)
    }

    /// Session token lifetime in seconds.
    pub fn token_ttl_seconds(&self) -> i64 {
        self.codec.ttl_seconds()
    }

    /// Verify a Google ID token against the current remote key set.
    #[instrument(skip_all, name = "gateway.token.verify_identity")]
    pub async fn verify_third_party_token(
        &self,
        id_token: &str,
    ) -> Result<IdentityClaims, TokenError> {
        match self.verify_identity(id_token).await {
            Ok(claims) => {
                record_token_validation("identity", None);
                Ok(claims)
            }
            Err(e) => {
                tracing::debug!(
                    target: "gateway.token",
                    reason = e.reason(),
                    error = %e,
                    "Identity token rejected"
                );
                record_token_validation("identity", Some(e.reason()));
                Err(TokenError::InvalidIdentityToken)
            }
        }
    }

    async fn verify_identity(&self, id_token: &str) -> Result<IdentityClaims, IdentityError> {
        // Reject unusable headers before going to the network.
        extract_kid(id_token).map_err(IdentityError::Header)?;

        let key_set = self.key_source.fetch_key_set().await?;
        verify_identity_token(
            id_token,
            &key_set,
            &self.identity_validation,
            self.clock.now().timestamp(),
        )
    }
}
