//! Google ID token verification.
//!
//! [`verify_identity_token`] is pure: it takes the token, a key set the
//! caller already trusts, the expected issuer/audience and the current time.
//! Fetching the key set is the caller's job (see `services::token_service`).
//!
//! Every failure carries a specific [`IdentityError`] for debug logging.
//! Callers collapse them into a single client-facing error.

use crate::auth::claims::IdentityClaims;
use crate::auth::jwks::{resolve_public_key, KeyProviderError, KeySet};
use common::jwt::{extract_kid, is_expired_at, JwtValidationError};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, Validation};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("token header rejected: {0:?}")]
    Header(JwtValidationError),

    #[error("key resolution failed: {0}")]
    Key(#[from] KeyProviderError),

    #[error("signature verification failed")]
    Signature,

    #[error("token structure or claims invalid")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("unexpected issuer")]
    Issuer,

    #[error("unexpected audience")]
    Audience,
}

impl IdentityError {
    /// Bounded label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            IdentityError::Header(_) => "header",
            IdentityError::Key(KeyProviderError::UpstreamUnavailable) => "upstream_unavailable",
            IdentityError::Key(KeyProviderError::MalformedKeySet) => "malformed_key_set",
            IdentityError::Key(KeyProviderError::UnknownKeyId) => "unknown_kid",
            IdentityError::Key(KeyProviderError::KeyReconstruction(_)) => "key_reconstruction",
            IdentityError::Signature => "signature",
            IdentityError::Malformed => "malformed",
            IdentityError::Expired => "expired",
            IdentityError::Issuer => "issuer",
            IdentityError::Audience => "audience",
        }
    }
}

/// What a valid identity token must look like besides its signature.
#[derive(Debug, Clone)]
pub struct IdentityValidation {
    /// Accepted `iss` values.
    pub issuers: Vec<String>,

    /// Required `aud`, when configured.
    pub audience: Option<String>,
}

impl IdentityValidation {
    pub fn new(issuers: Vec<String>, audience: Option<String>) -> Self {
        Self { issuers, audience }
    }
}

/// Verify an RS256 identity token against a trusted key set.
///
/// Steps, in order: read `kid` from the header, resolve the key, verify the
/// signature, check `exp` against `now`, check issuer, check audience.
pub fn verify_identity_token(
    id_token: &str,
    key_set: &KeySet,
    expected: &IdentityValidation,
    now: i64,
) -> Result<IdentityClaims, IdentityError> {
    let kid = extract_kid(id_token).map_err(IdentityError::Header)?;
    let decoding_key = resolve_public_key(&kid, key_set)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<IdentityClaims>(id_token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature => IdentityError::Signature,
            _ => IdentityError::Malformed,
        }
    })?;
    let claims = data.claims;

    if is_expired_at(claims.exp, now) {
        return Err(IdentityError::Expired);
    }

    if !expected.issuers.iter().any(|iss| *iss == claims.iss) {
        return Err(IdentityError::Issuer);
    }

    if let Some(audience) = &expected.audience {
        if claims.aud != *audience {
            return Err(IdentityError::Audience);
        }
    }

    Ok(claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use gateway_test_utils::{IdentityTokenBuilder, TestRsaKey};

    const NOW: i64 = 1_700_000_000;
    const CLIENT_ID: &str = "storefront-web.apps.googleusercontent.com";

    fn key_set_of(keys: &[&TestRsaKey]) -> KeySet {
        serde_json::from_value(gateway_test_utils::jwks_json(keys)).unwrap()
    }

    fn google() -> IdentityValidation {
        IdentityValidation::new(
            vec![
                "accounts.google.com".to_string(),
                "https://accounts.google.com".to_string(),
            ],
            Some(CLIENT_ID.to_string()),
        )
    }

    fn token() -> IdentityTokenBuilder {
        IdentityTokenBuilder::new(NOW)
            .audience(CLIENT_ID)
            .email("shopper@example.com")
    }

    #[test]
    fn test_valid_token_verifies() {
        let key = TestRsaKey::primary();
        let id_token = token().sign_with(&key);

        let claims = verify_identity_token(&id_token, &key_set_of(&[&key]), &google(), NOW).unwrap();
        assert_eq!(claims.email.as_deref(), Some("shopper@example.com"));
        assert_eq!(claims.aud, CLIENT_ID);
    }

    #[test]
    fn test_key_selected_by_kid_among_several() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        let set = key_set_of(&[&primary, &secondary]);

        let id_token = token().sign_with(&secondary);
        assert!(verify_identity_token(&id_token, &set, &google(), NOW).is_ok());
    }

    #[test]
    fn test_absent_kid_fails() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        let id_token = token().sign_with(&secondary);

        assert_eq!(
            verify_identity_token(&id_token, &key_set_of(&[&primary]), &google(), NOW)
                .unwrap_err(),
            IdentityError::Key(KeyProviderError::UnknownKeyId)
        );
    }

    #[test]
    fn test_kid_pointing_at_wrong_key_fails_signature() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        // Signed by the secondary key but claims the primary's kid.
        let id_token = token().sign_with_kid(&secondary, &primary.kid);

        assert_eq!(
            verify_identity_token(&id_token, &key_set_of(&[&primary]), &google(), NOW)
                .unwrap_err(),
            IdentityError::Signature
        );
    }

    #[test]
    fn test_missing_kid_header_fails() {
        let key = TestRsaKey::primary();
        let id_token = token().sign_without_kid(&key);

        assert_eq!(
            verify_identity_token(&id_token, &key_set_of(&[&key]), &google(), NOW).unwrap_err(),
            IdentityError::Header(JwtValidationError::MissingKid)
        );
    }

    #[test]
    fn test_expired_token_fails() {
        let key = TestRsaKey::primary();
        let id_token = token().expires_at(NOW).sign_with(&key);

        assert_eq!(
            verify_identity_token(&id_token, &key_set_of(&[&key]), &google(), NOW).unwrap_err(),
            IdentityError::Expired
        );
    }

    #[test]
    fn test_wrong_issuer_fails() {
        let key = TestRsaKey::primary();
        let id_token = token().issuer("https://evil.example.com").sign_with(&key);

        assert_eq!(
            verify_identity_token(&id_token, &key_set_of(&[&key]), &google(), NOW).unwrap_err(),
            IdentityError::Issuer
        );
    }

    #[test]
    fn test_both_google_issuer_forms_accepted() {
        let key = TestRsaKey::primary();
        let set = key_set_of(&[&key]);
        for iss in ["accounts.google.com", "https://accounts.google.com"] {
            let id_token = token().issuer(iss).sign_with(&key);
            assert!(verify_identity_token(&id_token, &set, &google(), NOW).is_ok());
        }
    }

    #[test]
    fn test_wrong_audience_fails() {
        let key = TestRsaKey::primary();
        let id_token = token().audience("someone-else").sign_with(&key);

        assert_eq!(
            verify_identity_token(&id_token, &key_set_of(&[&key]), &google(), NOW).unwrap_err(),
            IdentityError::Audience
        );
    }

    #[test]
    fn test_audience_unchecked_when_not_configured() {
        let key = TestRsaKey::primary();
        let id_token = token().audience("someone-else").sign_with(&key);
        let expected = IdentityValidation::new(google().issuers, None);

        assert!(verify_identity_token(&id_token, &key_set_of(&[&key]), &expected, NOW).is_ok());
    }

    #[test]
    fn test_hs256_token_is_rejected() {
        let key = TestRsaKey::primary();
        let header = jsonwebtoken::Header {
            kid: Some(key.kid.clone()),
            ..jsonwebtoken::Header::new(Algorithm::HS256)
        };
        let forged = jsonwebtoken::encode(
            &header,
            &token().claims(),
            &jsonwebtoken::EncodingKey::from_secret(key.n.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            verify_identity_token(&forged, &key_set_of(&[&key]), &google(), NOW).unwrap_err(),
            IdentityError::Malformed
        );
    }

    #[test]
    fn test_reason_labels_are_distinct() {
        let errors = [
            IdentityError::Header(JwtValidationError::MalformedToken),
            IdentityError::Key(KeyProviderError::UpstreamUnavailable),
            IdentityError::Key(KeyProviderError::MalformedKeySet),
            IdentityError::Key(KeyProviderError::UnknownKeyId),
            IdentityError::Key(KeyProviderError::KeyReconstruction("x")),
            IdentityError::Signature,
            IdentityError::Malformed,
            IdentityError::Expired,
            IdentityError::Issuer,
            IdentityError::Audience,
        ];
        let labels: HashSet<&str> = errors.iter().map(IdentityError::reason).collect();
        assert_eq!(labels.len(), errors.len());
    }
}
