//! Account flows: password login, registration and Google sign-in.
//!
//! These functions resolve a [`User`]; the handlers turn the result into a
//! session token.

use crate::auth::claims::IdentityClaims;
use crate::crypto::{self, DUMMY_PASSWORD_HASH};
use crate::errors::GatewayError;
use crate::models::{NewUser, RegisterRequest, User};
use crate::repositories::UserRepository;
use tracing::instrument;

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check an email and password.
///
/// # Security
///
/// - A bcrypt verification always runs, against a dummy hash when the
///   account is missing or has no password, so response timing does not
///   reveal which emails are registered
/// - Every failure is the same `InvalidCredentials`
#[instrument(skip_all, name = "gateway.user.login")]
pub async fn login(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<User, GatewayError> {
    let user = users.find_by_email(&normalize_email(email)).await?;

    let stored_hash = user.as_ref().and_then(|u| u.password_hash.as_deref());
    let Some(hash) = stored_hash else {
        // The dummy hash may fail to decode on some bcrypt versions; only the
        // time spent matters here.
        let _ = crypto::verify_password(password, DUMMY_PASSWORD_HASH);
        tracing::debug!(target: "gateway.user", "Login rejected: no password on record");
        return Err(GatewayError::InvalidCredentials);
    };

    if !crypto::verify_password(password, hash)? {
        tracing::debug!(target: "gateway.user", "Login rejected: password mismatch");
        return Err(GatewayError::InvalidCredentials);
    }

    user.ok_or(GatewayError::InvalidCredentials)
}

/// Create an account with a password.
///
/// # Errors
///
/// - `BadRequest` for a blank name/email/password or an email without `@`
/// - `Conflict` when the email or contact is already registered
#[instrument(skip_all, name = "gateway.user.register")]
pub async fn register(
    users: &dyn UserRepository,
    request: RegisterRequest,
    bcrypt_cost: u32,
) -> Result<User, GatewayError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(GatewayError::BadRequest("Name cannot be empty".to_string()));
    }

    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(GatewayError::BadRequest("Invalid email format".to_string()));
    }

    if request.password.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "Password cannot be empty".to_string(),
        ));
    }

    let password_hash = crypto::hash_password(&request.password, bcrypt_cost)?;

    let user = users
        .create(NewUser {
            name: name.to_string(),
            email,
            contact: non_blank(request.contact),
            address: non_blank(request.address),
            password_hash: Some(password_hash),
        })
        .await?;

    tracing::info!(target: "gateway.user", user_id = %user.id, "User registered");

    Ok(user)
}

/// Find or create the account behind a verified Google identity.
///
/// The identity must carry an email, and the provider must not have marked
/// it unverified. New accounts have no password.
#[instrument(skip_all, name = "gateway.user.resolve_identity")]
pub async fn resolve_identity_user(
    users: &dyn UserRepository,
    claims: &IdentityClaims,
) -> Result<User, GatewayError> {
    if claims.email_verified == Some(false) {
        return Err(GatewayError::InvalidToken(
            "The identity token email is not verified".to_string(),
        ));
    }

    let email = claims
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| is_valid_email(e))
        .ok_or_else(|| {
            GatewayError::InvalidToken("The identity token carries no email".to_string())
        })?;

    if let Some(user) = users.find_by_email(&email).await? {
        return Ok(user);
    }

    let name = non_blank(claims.name.clone()).unwrap_or_else(|| email.clone());
    let user = users
        .create(NewUser {
            name,
            email,
            contact: None,
            address: None,
            password_hash: None,
        })
        .await?;

    tracing::info!(target: "gateway.user", user_id = %user.id, "User created from identity token");

    Ok(user)
}
