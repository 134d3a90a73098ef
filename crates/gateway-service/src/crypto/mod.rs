//! Password hashing.
//!
//! Passwords are hashed with bcrypt. Cost is validated against the same
//! bounds as configuration so a direct caller cannot hash with a weak cost.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::GatewayError;
use tracing::instrument;

/// Hash verified when the account does not exist or has no password, so
/// login takes the same time either way.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Hash a password with bcrypt at `cost`.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, GatewayError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(GatewayError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password, cost)
        .map_err(|e| GatewayError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, GatewayError> {
    bcrypt::verify(password, hash)
        .map_err(|e| GatewayError::Crypto(format!("Password verification failed: {}", e)))
}
