//! Request gate.
//!
//! Runs in front of every route. For paths inside the gated scope it:
//!
//! 1. attaches CORS headers to whatever response goes back, rejections included
//! 2. answers `OPTIONS` with an empty 200
//! 3. lets allow-listed paths through without a principal
//! 4. otherwise requires `Authorization: Bearer <token>`, validates it,
//!    loads the user named by its subject and puts an [`AuthenticatedUser`]
//!    into the request extensions
//!
//! Every rejection is the same 401; the reason is only logged and counted.

use crate::auth::CodecError;
use crate::config::{CorsPolicy, GatePolicy};
use crate::errors::{ErrorResponse, WWW_AUTHENTICATE_BEARER};
use crate::models::AuthenticatedUser;
use crate::observability::metrics::record_gate_decision;
use crate::repositories::UserRepository;
use crate::services::{TokenError, TokenService};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Body of every gate rejection.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid authentication token, or token missing.";

const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type,Authorization";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TokenMissing,
    TokenExpired,
    TokenMalformed,
    SignatureInvalid,
    PrincipalNotFound,
    Internal,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::TokenMissing => "token_missing",
            Rejection::TokenExpired => "token_expired",
            Rejection::TokenMalformed => "token_malformed",
            Rejection::SignatureInvalid => "signature_invalid",
            Rejection::PrincipalNotFound => "principal_not_found",
            Rejection::Internal => "internal",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(UNAUTHORIZED_MESSAGE)),
        )
            .into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(WWW_AUTHENTICATE_BEARER),
        );
        response
    }
}

/// Map a session token failure to its rejection reason.
pub fn classify(error: &TokenError) -> Rejection {
    match error {
        TokenError::Expired => Rejection::TokenExpired,
        TokenError::Invalid(CodecError::InvalidSignature) => Rejection::SignatureInvalid,
        TokenError::Invalid(_) | TokenError::InvalidIdentityToken => Rejection::TokenMalformed,
    }
}

/// Shared state for [`authentication_gate`].
#[derive(Clone)]
pub struct GateState {
    pub token_service: Arc<TokenService>,
    pub users: Arc<dyn UserRepository>,
    pub policy: GatePolicy,
}

/// Extract the token from `Authorization: Bearer <token>`.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The gate middleware. Install with `axum::middleware::from_fn_with_state`.
#[instrument(skip_all, name = "gateway.middleware.gate")]
pub async fn authentication_gate(
    State(state): State<Arc<GateState>>,
    req: Request,
    next: Next,
) -> Response {
    if !state.policy.in_scope(req.uri().path()) {
        return next.run(req).await;
    }

    let origin = req.headers().get(header::ORIGIN).cloned();

    let mut response = if req.method() == Method::OPTIONS {
        record_gate_decision("preflight", None);
        StatusCode::OK.into_response()
    } else if state.policy.is_bypassed(req.uri().path()) {
        record_gate_decision("bypass", None);
        next.run(req).await
    } else {
        match authenticate(&state, req).await {
            Ok(req) => {
                record_gate_decision("authorized", None);
                next.run(req).await
            }
            Err(rejection) => {
                tracing::debug!(
                    target: "gateway.middleware.gate",
                    reason = rejection.as_str(),
                    "Request rejected"
                );
                record_gate_decision("rejected", Some(rejection.as_str()));
                rejection.into_response()
            }
        }
    };

    apply_cors(&state.policy.cors, origin.as_ref(), response.headers_mut());
    response
}

async fn authenticate(state: &GateState, mut req: Request) -> Result<Request, Rejection> {
    let token = extract_bearer_token(req.headers()).ok_or(Rejection::TokenMissing)?;

    let subject = state
        .token_service
        .validate_first_party_token(token)
        .map_err(|e| classify(&e))?;

    let user = state
        .users
        .find_by_email(&subject)
        .await
        .map_err(|e| {
            tracing::error!(target: "gateway.middleware.gate", error = %e, "Principal lookup failed");
            Rejection::Internal
        })?
        .ok_or(Rejection::PrincipalNotFound)?;

    req.extensions_mut().insert(AuthenticatedUser(user));
    Ok(req)
}

/// Attach CORS headers for `origin` under `policy`.
///
/// Under an allow-list an unlisted or missing origin gets no
/// `Access-Control-Allow-Origin`; the browser then blocks the response.
fn apply_cors(policy: &CorsPolicy, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
    match policy {
        CorsPolicy::AnyOrigin => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
        CorsPolicy::AllowList(allowed) => {
            let matched = origin.filter(|o| {
                o.to_str()
                    .map(|o| allowed.iter().any(|a| a == o))
                    .unwrap_or(false)
            });
            if let Some(origin) = matched {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}
