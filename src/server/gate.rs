//! Request-path gates, composed as ordered middleware layers:
//! authentication gate -> admin role gate -> audit wrapper -> handler.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::AppState;
use crate::auth::{Principal, TokenValidator};
use crate::error::AuthError;

/// Establishes (or leaves absent) the authenticated principal for one
/// request. Evaluated once per inbound request:
///
/// 1. No bearer header: pass through with no principal; routes that need
///    one reject the absence themselves.
/// 2. Header present: the blacklist is consulted first; a revoked token is
///    answered here, before any signature work.
/// 3. Signature/expiry failures are answered here, expired tagged
///    distinctly from invalid so clients know when to reissue.
/// 4. On success a `Principal` is attached to the request extensions,
///    replacing any prior value.
/// 5. Anything else (store outage, malformed subject) is logged and the
///    request continues with no principal; the unauthorized decision is
///    deferred downstream.
pub async fn authentication_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| TokenValidator::strip_bearer(h).ok())
        .map(str::to_owned);
    let Some(token) = bearer else {
        return next.run(req).await;
    };

    match state.blacklist.exists(&token).await {
        Ok(true) => return AuthError::TokenRevoked.into_response(),
        Ok(false) => {}
        Err(e) => {
            debug!("blacklist lookup failed, continuing unauthenticated: {e}");
            return next.run(req).await;
        }
    }

    match state.validator.extract_claims(&token) {
        Ok(claims) => match Principal::from_claims(&claims) {
            Some(principal) => {
                req.extensions_mut().insert(principal);
            }
            None => debug!("token subject is not numeric, continuing unauthenticated"),
        },
        Err(e @ (AuthError::TokenExpired | AuthError::TokenInvalid)) => {
            return e.into_response();
        }
        Err(e) => debug!("token processing failed, continuing unauthenticated: {e}"),
    }
    next.run(req).await
}

/// Admin-only gate. Runs strictly after the authentication gate.
pub async fn require_admin(req: Request, next: Next) -> Response {
    match req.extensions().get::<Principal>() {
        None => AuthError::Unauthenticated.into_response(),
        Some(p) if !p.role.is_admin() => AuthError::Forbidden.into_response(),
        Some(_) => next.run(req).await,
    }
}

/// Around-wrapper for admin routes: one structured line per call with the
/// caller, route and outcome.
pub async fn audit_admin(req: Request, next: Next) -> Response {
    let user_id = req.extensions().get::<Principal>().map(|p| p.id);
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        target: "admin_audit",
        user_id = ?user_id,
        %method,
        %uri,
        status = %response.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "admin api call"
    );
    response
}
