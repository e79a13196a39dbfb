//!
//! turnstile HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP API for turnstile.
//!
//! Responsibilities:
//! - Signup/signin/signout/reissue endpoints backed by the session service.
//! - The per-request authentication gate and the admin-only route group
//!   (role gate + audit wrapper), composed as ordered middleware layers.
//! - Store selection at startup (SQLite when configured, in-memory
//!   otherwise) and the background token cleanup task.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{Principal, TokenCodec, TokenIssuer, TokenValidator};
use crate::cleanup;
use crate::config::Config;
use crate::error::{AuthError, AuthResult};
use crate::session::{SessionService, TokenPair};
use crate::store::{
    BlacklistReason, MemoryStore, RefreshTokenStore, SqliteStore, TokenBlacklistStore, UserStore,
};

pub mod gate;

use gate::{audit_admin, authentication_gate, require_admin};

/// Shared server state injected into all handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionService>,
    pub blacklist: Arc<dyn TokenBlacklistStore>,
    pub validator: TokenValidator,
}

/// Start the turnstile HTTP server from environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let (users, refresh, blacklist): (
        Arc<dyn UserStore>,
        Arc<dyn RefreshTokenStore>,
        Arc<dyn TokenBlacklistStore>,
    ) = match &config.db_url {
        Some(url) => {
            let store = Arc::new(SqliteStore::connect(url).await?);
            info!("using SQLite store at {url}");
            (store.clone(), store.clone(), store)
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            warn!("TURNSTILE_DB_URL not set; using in-memory stores (state is lost on restart)");
            (store.clone(), store.clone(), store)
        }
    };

    let codec = Arc::new(TokenCodec::new(&config.signing_key));
    let issuer = TokenIssuer::new(codec.clone());
    let validator = TokenValidator::new(codec);
    let session = Arc::new(SessionService::new(
        users,
        refresh.clone(),
        blacklist.clone(),
        issuer,
        validator.clone(),
    ));
    let state = AppState {
        session,
        blacklist: blacklist.clone(),
        validator,
    };

    let cleanup_task = cleanup::spawn(refresh, blacklist, config.cleanup_interval_secs);

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    if let Some(task) = cleanup_task {
        task.stop();
    }
    Ok(served?)
}

/// Mount all routes. The authentication gate wraps everything; the admin
/// group additionally runs the role gate and then the audit wrapper, in
/// that order, before its handlers.
pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/tokens/revoke", post(admin_revoke))
        .layer(middleware::from_fn(audit_admin))
        .layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/", get(|| async { "turnstile ok" }))
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
        .route("/reissue", post(reissue))
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), authentication_gate))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    email: String,
    password: String,
    user_role: String,
}

#[derive(Debug, Deserialize)]
struct SigninRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReissueParams {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeRequest {
    token: String,
    user_id: i64,
    reason: String,
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AuthResult<Json<TokenPair>> {
    let pair = state
        .session
        .signup(&payload.email, &payload.password, &payload.user_role)
        .await?;
    Ok(Json(pair))
}

async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> AuthResult<Json<TokenPair>> {
    let pair = state.session.signin(&payload.email, &payload.password).await?;
    Ok(Json(pair))
}

async fn signout(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
) -> AuthResult<StatusCode> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::TokenInvalid)?;
    state.session.signout(principal.id, bearer).await?;
    Ok(StatusCode::OK)
}

async fn reissue(
    State(state): State<AppState>,
    Query(params): Query<ReissueParams>,
    headers: HeaderMap,
) -> AuthResult<Json<TokenPair>> {
    let refresh_token = headers
        .get("Refresh-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::TokenInvalid)?;
    let pair = state.session.reissue(params.user_id, refresh_token).await?;
    Ok(Json(pair))
}

async fn admin_revoke(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> AuthResult<Json<serde_json::Value>> {
    let reason = BlacklistReason::parse(&payload.reason)
        .ok_or_else(|| AuthError::InvalidRequest(format!("unknown reason: {}", payload.reason)))?;
    state
        .session
        .force_revoke(&payload.token, payload.user_id, reason)
        .await?;
    Ok(Json(json!({"status": "ok"})))
}
