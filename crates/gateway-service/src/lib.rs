//! Storefront authentication gateway.
//!
//! Issues HS256 session tokens, verifies Google ID tokens against Google's
//! published key set, and gates every `/api/` request behind a bearer token
//! that names an existing user.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/gate.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Session token codec, remote key set, identity token verification
//! - `config` - Service configuration from environment
//! - `crypto` - Password hashing
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Request gate and HTTP metrics
//! - `models` - Data models
//! - `observability` - Prometheus metrics
//! - `repositories` - User store
//! - `routes` - Axum router setup
//! - `services` - Token service and account flows

pub mod auth;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
