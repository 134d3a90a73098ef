//! Builder patterns for test tokens.
//!
//! - `IdentityTokenBuilder` - RS256 Google-style ID tokens signed with a
//!   [`TestRsaKey`]
//! - `SessionTokenBuilder` - HS256 session tokens signed with any secret, for
//!   forging tokens the gateway did not issue

use crate::crypto_fixtures::{TestRsaKey, TEST_GOOGLE_CLIENT_ID};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

/// Builder for Google ID tokens.
///
/// # Example
/// ```rust,ignore
/// let id_token = IdentityTokenBuilder::new(now)
///     .email("ada@example.com")
///     .sign_with(&TestRsaKey::primary());
/// ```
#[derive(Debug, Clone)]
pub struct IdentityTokenBuilder {
    sub: String,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

impl IdentityTokenBuilder {
    /// Token issued at `now`, valid for one hour, from the https issuer.
    pub fn new(now: i64) -> Self {
        Self {
            sub: "110169484474386276334".to_string(),
            iss: "https://accounts.google.com".to_string(),
            aud: TEST_GOOGLE_CLIENT_ID.to_string(),
            iat: now,
            exp: now + 3600,
            email: None,
            email_verified: None,
            name: None,
        }
    }

    pub fn subject(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    pub fn issuer(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    pub fn audience(mut self, aud: &str) -> Self {
        self.aud = aud.to_string();
        self
    }

    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = exp;
        self
    }

    /// Set the email and mark it verified.
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self.email_verified = Some(true);
        self
    }

    pub fn email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Claims as a JSON value.
    pub fn claims(&self) -> serde_json::Value {
        let mut claims = json!({
            "sub": self.sub,
            "iss": self.iss,
            "aud": self.aud,
            "iat": self.iat,
            "exp": self.exp,
        });
        if let Some(email) = &self.email {
            claims["email"] = json!(email);
        }
        if let Some(verified) = self.email_verified {
            claims["email_verified"] = json!(verified);
        }
        if let Some(name) = &self.name {
            claims["name"] = json!(name);
        }
        claims
    }

    /// Sign with `key`, naming it in the header.
    pub fn sign_with(&self, key: &TestRsaKey) -> String {
        self.sign(key, Some(&key.kid))
    }

    /// Sign with `key` but put `kid` in the header.
    pub fn sign_with_kid(&self, key: &TestRsaKey, kid: &str) -> String {
        self.sign(key, Some(kid))
    }

    /// Sign with `key` and leave `kid` out of the header.
    pub fn sign_without_kid(&self, key: &TestRsaKey) -> String {
        self.sign(key, None)
    }

    fn sign(&self, key: &TestRsaKey, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(ToString::to_string);

        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_pem.as_bytes()).expect("test RSA key parses");
        encode(&header, &self.claims(), &encoding_key).expect("signing test token succeeds")
    }
}

/// Builder for HS256 session tokens with arbitrary claims.
///
/// # Example
/// ```rust,ignore
/// let forged = SessionTokenBuilder::new("ada@example.com", now)
///     .sign(OTHER_SESSION_SECRET);
/// ```
#[derive(Debug, Clone)]
pub struct SessionTokenBuilder {
    sub: String,
    iat: i64,
    exp: i64,
}

impl SessionTokenBuilder {
    /// Token for `subject` issued at `now`, valid for ten hours.
    pub fn new(subject: &str, now: i64) -> Self {
        Self {
            sub: subject.to_string(),
            iat: now,
            exp: now + 36_000,
        }
    }

    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = exp;
        self
    }

    pub fn claims(&self) -> serde_json::Value {
        json!({
            "sub": self.sub,
            "iat": self.iat,
            "exp": self.exp,
        })
    }

    /// Sign with an HS256 `secret`.
    pub fn sign(&self, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &self.claims(),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("signing test token succeeds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_claims_defaults() {
        let claims = IdentityTokenBuilder::new(1_000).claims();
        assert_eq!(claims["iss"], "https://accounts.google.com");
        assert_eq!(claims["exp"], 4_600);
        assert!(claims.get("email").is_none());
    }

    #[test]
    fn test_email_marks_verified() {
        let claims = IdentityTokenBuilder::new(0).email("ada@example.com").claims();
        assert_eq!(claims["email"], "ada@example.com");
        assert_eq!(claims["email_verified"], true);

        let unverified = IdentityTokenBuilder::new(0)
            .email("ada@example.com")
            .email_verified(false)
            .claims();
        assert_eq!(unverified["email_verified"], false);
    }

    #[test]
    fn test_sign_with_puts_kid_in_header() {
        let key = TestRsaKey::primary();
        let token = IdentityTokenBuilder::new(0).sign_with(&key);
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("test-key-a"));
        assert_eq!(header.alg, Algorithm::RS256);

        let no_kid = IdentityTokenBuilder::new(0).sign_without_kid(&key);
        assert!(jsonwebtoken::decode_header(&no_kid).unwrap().kid.is_none());
    }

    #[test]
    fn test_session_token_is_hs256() {
        let token = SessionTokenBuilder::new("ada@example.com", 0).sign("secret");
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
    }
}
