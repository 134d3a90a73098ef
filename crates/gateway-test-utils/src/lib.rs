//! # Gateway Test Utilities
//!
//! Shared test utilities for the storefront gateway.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys, secrets, JWKS documents)
//! - Token builders (Google ID tokens, forged session tokens)
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestGatewayServer::spawn().await?;
//!     let token = server.register_user("ada@example.com", "hunter22").await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/authentication/users/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
