//! HTTP request handlers.

pub mod auth_handler;
pub mod health;
pub mod me;
pub mod metrics;

pub use auth_handler::{handle_identity_exchange, handle_login, handle_register};
pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;

use crate::errors::GatewayError;

/// Fallback for unknown routes.
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound("Resource not found".to_string())
}
