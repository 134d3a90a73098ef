//! Account endpoints under `/api/v1/authentication`.
//!
//! All three are on the gate's bypass list and return a fresh session token.

use crate::errors::GatewayError;
use crate::models::{
    AuthResponse, IdentityExchangeRequest, LoginRequest, RegisterRequest, User,
};
use crate::observability::metrics::record_token_issued;
use crate::routes::AppState;
use crate::services::{user_service, TokenError};
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

const LOGIN_MESSAGE: &str = "Authentication succeeded.";
const REGISTER_MESSAGE: &str = "User registered successfully.";

fn issue_for(
    state: &AppState,
    user: &User,
    flow: &'static str,
    message: &str,
) -> Result<AuthResponse, GatewayError> {
    let token = state
        .token_service
        .issue_first_party_token(&user.email)
        .map_err(|e| {
            tracing::error!(target: "gateway.handlers.auth", error = %e, "Failed to issue session token");
            GatewayError::Internal
        })?;

    record_token_issued(flow);

    Ok(AuthResponse {
        token,
        message: message.to_string(),
    })
}

/// Password login.
///
/// POST /api/v1/authentication/login
#[instrument(skip_all, name = "gateway.handlers.login")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, GatewayError> {
    let user = user_service::login(state.users.as_ref(), &payload.email, &payload.password).await?;

    Ok(Json(issue_for(&state, &user, "login", LOGIN_MESSAGE)?))
}

/// Registration.
///
/// POST /api/v1/authentication/signin
#[instrument(skip_all, name = "gateway.handlers.register")]
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, GatewayError> {
    let user =
        user_service::register(state.users.as_ref(), payload, state.config.bcrypt_cost).await?;

    Ok(Json(issue_for(&state, &user, "register", REGISTER_MESSAGE)?))
}

/// Google sign-in: exchange a verified ID token for a session token.
///
/// POST /api/v1/authentication/oauth/google
#[instrument(skip_all, name = "gateway.handlers.identity_exchange")]
pub async fn handle_identity_exchange(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IdentityExchangeRequest>,
) -> Result<Json<AuthResponse>, GatewayError> {
    let claims = state
        .token_service
        .verify_third_party_token(&payload.id_token)
        .await
        .map_err(|e| match e {
            TokenError::InvalidIdentityToken => {
                GatewayError::InvalidToken("The identity token is invalid".to_string())
            }
            _ => GatewayError::Internal,
        })?;

    let user = user_service::resolve_identity_user(state.users.as_ref(), &claims).await?;

    Ok(Json(issue_for(&state, &user, "identity", LOGIN_MESSAGE)?))
}
