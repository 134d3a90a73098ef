//! Current user handler.

use crate::models::{AuthenticatedUser, User};
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/authentication/users/me
///
/// Returns the principal the gate attached to the request. The password
/// hash is never serialized.
#[instrument(skip_all, name = "gateway.handlers.me")]
pub async fn get_me(Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>) -> Json<User> {
    tracing::debug!(target: "gateway.handlers.me", user_id = %user.id, "Returning current user");
    Json(user)
}
