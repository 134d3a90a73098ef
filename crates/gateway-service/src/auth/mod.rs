//! Token handling.
//!
//! - `codec` - HS256 session tokens signed with the gateway secret
//! - `jwks` - Remote key set fetching and RSA key reconstruction
//! - `identity` - Verification of Google ID tokens against a trusted key set
//! - `claims` - Claim structures for both token kinds

pub mod claims;
pub mod codec;
pub mod identity;
pub mod jwks;

pub use claims::{Claims, IdentityClaims};
pub use codec::{ClaimsCodec, CodecError};
pub use identity::{verify_identity_token, IdentityError, IdentityValidation};
pub use jwks::{
    resolve_public_key, CachedKeySetSource, HttpKeySetSource, Jwk, KeyProviderError, KeySet,
    KeySetSource, StaticKeySetSource,
};
