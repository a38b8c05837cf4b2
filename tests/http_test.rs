// Integration tests for the HTTP surface: routes, status codes,
// response bodies and cookie headers. The router runs in-process via
// tower's oneshot, against a real SQLite database, with a handle on
// the challenge store to read generated codes back out.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::db::seed_account;
use helpers::TestDb;
use postern::auth::AuthService;
use postern::challenge::{ChallengeStore, InMemoryChallengeStore};
use postern::mailer::Mailer;
use postern::settings::Settings;
use postern::token::TokenIssuer;
use postern::web::{self, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(test_db: &TestDb) -> (axum::Router, InMemoryChallengeStore) {
    let settings = Settings::default();
    let store = InMemoryChallengeStore::new();
    let issuer = TokenIssuer::new(
        settings.auth.token_secret.as_bytes(),
        settings.auth.token_ttl_secs,
    );
    let mailer = Mailer::new(settings.mail.clone());
    let auth = AuthService::with_store(
        test_db.connection().clone(),
        issuer,
        mailer,
        store.clone(),
        settings.auth.otp_ttl_secs,
    );

    let router = web::router(AppState {
        settings: Arc::new(settings),
        auth,
    });
    (router, store)
}

/// POST a JSON body and return (status, set-cookie value, JSON body).
async fn post_json(
    router: &axum::Router,
    uri: &str,
    body: Value,
) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get_with_headers(
    router: &axum::Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    for &(name, value) in headers {
        builder = builder.header(name, value);
    }
    send(router, builder.body(Body::empty()).unwrap()).await
}

async fn send(
    router: &axum::Router,
    request: Request<Body>,
) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get("set-cookie")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, body)
}

#[tokio::test]
async fn test_signup_sends_code() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);

    let (status, cookie, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({
            "fullName": "Jonas Kahnwald",
            "dob": "1997-12-11",
            "email": "jonas@example.com"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_none(), "no session before verification");
    assert_eq!(
        body["message"],
        "OTP sent to jonas@example.com. Please verify to complete signup."
    );
    assert!(store.get("jonas@example.com").is_some());
}

#[tokio::test]
async fn test_signup_missing_fields_is_bad_request() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);

    let (status, _cookie, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({ "email": "jonas@example.com" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Full name, Date of Birth, and Email are required."
    );
}

#[tokio::test]
async fn test_signup_existing_email_is_conflict() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);
    seed_account(test_db.connection(), "taken@example.com", "Martha Nielsen", "1997-06-20").await;

    let (status, _cookie, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({
            "fullName": "Someone Else",
            "dob": "2000-01-01",
            "email": "taken@example.com"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User with this email already exists.");
}

#[tokio::test]
async fn test_signup_verify_creates_session() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);

    post_json(
        &router,
        "/api/auth/signup",
        json!({
            "fullName": "Jonas Kahnwald",
            "dob": "1997-12-11",
            "email": "jonas@example.com"
        }),
    )
    .await;
    let code = store.get("jonas@example.com").unwrap().code;

    let (status, cookie, body) = post_json(
        &router,
        "/api/auth/signup/verify",
        json!({ "email": "jonas@example.com", "otp": code }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Signup successful!");
    assert_eq!(body["user"]["email"], "jonas@example.com");
    assert_eq!(body["user"]["fullName"], "Jonas Kahnwald");

    let cookie = cookie.expect("verification sets the session cookie");
    assert!(cookie.starts_with("postern_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.ends_with("Max-Age=3600"));
}

#[tokio::test]
async fn test_signup_verify_wrong_code_is_unauthorized() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);

    post_json(
        &router,
        "/api/auth/signup",
        json!({
            "fullName": "Jonas Kahnwald",
            "dob": "1997-12-11",
            "email": "jonas@example.com"
        }),
    )
    .await;
    let code = store.get("jonas@example.com").unwrap().code;
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let (status, cookie, body) = post_json(
        &router,
        "/api/auth/signup/verify",
        json!({ "email": "jonas@example.com", "otp": wrong }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
    assert_eq!(body["message"], "Invalid or expired OTP.");
}

#[tokio::test]
async fn test_signin_unknown_email_is_not_found() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);

    let (status, _cookie, body) = post_json(
        &router,
        "/api/auth/signin",
        json!({ "email": "ghost@example.com" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found. Please sign up first.");
}

#[tokio::test]
async fn test_signin_roundtrip_over_http() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);
    seed_account(test_db.connection(), "martha@example.com", "Martha Nielsen", "1997-06-20").await;

    let (status, _cookie, body) = post_json(
        &router,
        "/api/auth/signin",
        json!({ "email": "martha@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "OTP sent to martha@example.com. Please verify to complete signin."
    );

    let code = store.get("martha@example.com").unwrap().code;
    let (status, cookie, body) = post_json(
        &router,
        "/api/auth/signin/verify",
        json!({ "email": "martha@example.com", "otp": code }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Signin successful!");
    assert_eq!(body["user"]["fullName"], "Martha Nielsen");
    assert!(cookie.unwrap().starts_with("postern_session="));
}

#[tokio::test]
async fn test_profile_without_token() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);

    let (status, _cookie, body) = get_with_headers(&router, "/api/auth/profile", &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access Denied: No token provided.");
}

#[tokio::test]
async fn test_profile_with_bearer_token() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);
    seed_account(test_db.connection(), "martha@example.com", "Martha Nielsen", "1997-06-20").await;

    post_json(&router, "/api/auth/signin", json!({ "email": "martha@example.com" })).await;
    let code = store.get("martha@example.com").unwrap().code;
    let (_status, cookie, _body) = post_json(
        &router,
        "/api/auth/signin/verify",
        json!({ "email": "martha@example.com", "otp": code }),
    )
    .await;
    let token = session_token(&cookie.unwrap());

    let (status, _cookie, body) = get_with_headers(
        &router,
        "/api/auth/profile",
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User profile fetched successfully.");
    assert_eq!(body["profile"]["email"], "martha@example.com");
    assert_eq!(body["profile"]["fullName"], "Martha Nielsen");
}

#[tokio::test]
async fn test_profile_with_cookie() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);
    seed_account(test_db.connection(), "martha@example.com", "Martha Nielsen", "1997-06-20").await;

    post_json(&router, "/api/auth/signin", json!({ "email": "martha@example.com" })).await;
    let code = store.get("martha@example.com").unwrap().code;
    let (_status, cookie, _body) = post_json(
        &router,
        "/api/auth/signin/verify",
        json!({ "email": "martha@example.com", "otp": code }),
    )
    .await;
    let token = session_token(&cookie.unwrap());

    let (status, _cookie, body) = get_with_headers(
        &router,
        "/api/auth/profile",
        &[("cookie", &format!("postern_session={token}"))],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["email"], "martha@example.com");
}

#[tokio::test]
async fn test_profile_with_invalid_token() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);

    let (status, _cookie, body) = get_with_headers(
        &router,
        "/api/auth/profile",
        &[("authorization", "Bearer not.a.token")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access Denied: Invalid or expired token.");
}

#[tokio::test]
async fn test_protected_route() {
    let test_db = TestDb::new().await;
    let (router, store) = app(&test_db);
    seed_account(test_db.connection(), "martha@example.com", "Martha Nielsen", "1997-06-20").await;

    post_json(&router, "/api/auth/signin", json!({ "email": "martha@example.com" })).await;
    let code = store.get("martha@example.com").unwrap().code;
    let (_status, cookie, _body) = post_json(
        &router,
        "/api/auth/signin/verify",
        json!({ "email": "martha@example.com", "otp": code }),
    )
    .await;
    let token = session_token(&cookie.unwrap());

    let (status, _cookie, body) = get_with_headers(
        &router,
        "/api/auth/protected",
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You have accessed a protected route!");
    assert_eq!(body["user"]["email"], "martha@example.com");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);

    // Logout needs no body and no token.
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .body(Body::empty())
        .unwrap();
    let (status, cookie, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully.");
    let cookie = cookie.expect("logout clears the cookie");
    assert!(cookie.starts_with("postern_session=;"));
    assert!(cookie.ends_with("Max-Age=0"));
}

#[tokio::test]
async fn test_fallback_serves_app_shell() {
    let test_db = TestDb::new().await;
    let (router, _store) = app(&test_db);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("<!DOCTYPE html>"));
    assert!(text.contains("Sign in"));
}

/// Extract the raw token from a Set-Cookie header value.
fn session_token(set_cookie: &str) -> String {
    set_cookie
        .strip_prefix("postern_session=")
        .and_then(|rest| rest.split(';').next())
        .expect("session cookie value")
        .to_string()
}
