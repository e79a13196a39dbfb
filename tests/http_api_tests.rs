//! HTTP surface tests: routes, status codes and error codes, and the
//! request gates (authentication, admin role, revocation-first ordering).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use turnstile::auth::{AccessClaims, Role, TokenCodec, TokenIssuer, TokenValidator};
use turnstile::server::{router, AppState};
use turnstile::session::SessionService;
use turnstile::store::MemoryStore;

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let codec = Arc::new(TokenCodec::new(SECRET));
    let issuer = TokenIssuer::new(codec.clone());
    let validator = TokenValidator::new(codec);
    let session = Arc::new(SessionService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        issuer,
        validator.clone(),
    ));
    router(AppState {
        session,
        blacklist: store,
        validator,
    })
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn signup(app: &Router, email: &str, role: &str) -> Value {
    let (status, body) = send(
        app,
        post_json(
            "/auth/signup",
            &json!({"email": email, "password": "pw", "userRole": role}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body}");
    body
}

#[tokio::test]
async fn signup_and_signin_round_trip() {
    let app = app();
    let body = signup(&app, "a@x.com", "USER").await;
    assert!(body["accessToken"].as_str().unwrap().starts_with("Bearer "));
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());

    let (status, body) = send(
        &app,
        post_json("/auth/signup", &json!({"email": "a@x.com", "password": "pw", "userRole": "USER"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "duplicate_email");

    let (status, body) = send(
        &app,
        post_json("/auth/signin", &json!({"email": "a@x.com", "password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "bad_credentials");

    let (status, body) = send(
        &app,
        post_json("/auth/signin", &json!({"email": "who@x.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "user_not_found");

    let (status, _) = send(
        &app,
        post_json("/auth/signin", &json!({"email": "a@x.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reissue_rotates_and_rejects_the_spent_token() {
    let app = app();
    // First signup in a fresh store gets user id 1.
    let body = signup(&app, "a@x.com", "USER").await;
    let refresh = body["refreshToken"].as_str().unwrap().to_string();

    let reissue_req = |token: &str| {
        Request::builder()
            .method("POST")
            .uri("/reissue?userId=1")
            .header("Refresh-Token", token)
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, reissue_req(&refresh)).await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    let (status, body) = send(&app, reissue_req(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "refresh_mismatch");

    // Missing header is rejected too.
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/reissue?userId=1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signout_then_revoked_token_is_rejected_before_signature_checks() {
    let app = app();
    let body = signup(&app, "a@x.com", "USER").await;
    let access = body["accessToken"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/signout")
            .header(header::AUTHORIZATION, access.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Any later request carrying the revoked token dies at the gate with
    // the dedicated code, even though the embedded expiry has not passed.
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, access.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_revoked");
}

#[tokio::test]
async fn gate_tags_expired_and_invalid_distinctly_and_passes_anonymous() {
    let app = app();

    // Anonymous request to an open route is fine.
    let (status, body) = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("turnstile ok".into()));

    // Signout without a principal is the handler's rejection, not the gate's.
    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/signout")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    // Expired token: crafted with the same signing key.
    let codec = TokenCodec::new(SECRET);
    let now = Utc::now().timestamp();
    let expired = codec
        .sign(&AccessClaims {
            sub: "1".into(),
            email: "a@x.com".into(),
            user_role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
        })
        .unwrap();
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {expired}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "access_expired");

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_token");
}

#[tokio::test]
async fn admin_route_enforces_role_and_revokes() {
    let app = app();
    let admin = signup(&app, "admin@x.com", "ADMIN").await;
    let user = signup(&app, "user@x.com", "USER").await;
    let admin_access = admin["accessToken"].as_str().unwrap();
    let user_access = user["accessToken"].as_str().unwrap().to_string();

    let revoke_body = json!({
        "token": user_access,
        "userId": 2,
        "reason": "COMPROMISED",
    });

    // Unauthenticated and non-admin callers are turned away.
    let (status, body) = send(&app, post_json("/admin/tokens/revoke", &revoke_body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let mut req = post_json("/admin/tokens/revoke", &revoke_body);
    req.headers_mut()
        .insert(header::AUTHORIZATION, user_access.parse().unwrap());
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let mut req = post_json("/admin/tokens/revoke", &revoke_body);
    req.headers_mut()
        .insert(header::AUTHORIZATION, admin_access.parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    // The condemned token is now dead at the gate.
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, user_access.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_revoked");

    // Unknown reasons are a validation error.
    let mut req = post_json(
        "/admin/tokens/revoke",
        &json!({"token": admin_access, "userId": 1, "reason": "BECAUSE"}),
    );
    req.headers_mut()
        .insert(header::AUTHORIZATION, admin_access.parse().unwrap());
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}
