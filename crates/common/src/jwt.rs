//! JWT utilities shared across gateway components.
//!
//! This module provides the pieces of token handling that do not depend on
//! which key signed a token:
//! - Size limits for DoS prevention
//! - Key ID extraction from JWT headers
//! - The expiry comparison used by every validator
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header values are only ever used to *select* a key from a trusted set
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, extract_kid, is_expired_at};
//!
//! check_token_size(token)?;
//! let kid = extract_kid(token)?;
//! // ... look up key by kid, verify signature ...
//! if is_expired_at(claims.exp, clock.now().timestamp()) {
//!     return Err(Expired);
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical session tokens are 150-250 bytes (HS256, three claims)
/// - Google ID tokens are roughly 1KB (RS256 signature, profile claims)
/// - 8KB leaves room for growth while bounding base64 and signature work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The token is invalid")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The token is invalid")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The token is invalid")]
    MissingKid,
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens larger than [`MAX_JWT_SIZE_BYTES`].
///
/// # Errors
///
/// Returns `JwtValidationError::TokenTooLarge` when the limit is exceeded.
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// This is used to look up the correct verification key in a remote key set
/// that publishes several keys at once (e.g., during key rotation).
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value must only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Token format invalid (wrong structure, bad base64, invalid JSON)
/// - `MissingKid` - Token header missing `kid` field, `kid` is not a string, or is empty
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    check_token_size(token)?;

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let header_part = parts.next().ok_or(JwtValidationError::MalformedToken)?;
    let part_count = 1 + parts.count();
    if part_count != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = part_count,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(kid)
}

/// Whether a token with expiry `exp` is expired at instant `now`.
///
/// Both values are Unix epoch seconds. A token whose expiry instant has been
/// reached is expired.
#[must_use]
pub fn is_expired_at(exp: i64, now: i64) -> bool {
    now >= exp
}

// =============================================================================
// Tests
// =============================================================================
