//! HTTP adapter over the auth workflow: route table, status-code
//! mapping and cookie emission. All decisions live in `auth`; handlers
//! here unpack JSON, call one workflow operation and frame its result.

use crate::auth::{AuthService, SignedIn};
use crate::errors::AuthError;
use crate::mailer::Mailer;
use crate::session::SessionCookie;
use crate::settings::Settings;
use crate::token::{SessionClaims, TokenIssuer};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: AuthService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signup/verify", post(verify_signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/signin/verify", post(verify_signin))
        .route("/api/auth/profile", get(profile))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/protected", get(protected))
        // Everything else is the single-page frontend.
        .fallback_service(ServeDir::new("static"))
        .with_state(state)
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let issuer = TokenIssuer::new(
        settings.auth.token_secret.as_bytes(),
        settings.auth.token_ttl_secs,
    );
    let mailer = Mailer::new(settings.mail.clone());
    let auth = AuthService::new(db, issuer, mailer, settings.auth.otp_ttl_secs);

    let state = AppState {
        settings: Arc::new(settings),
        auth,
    };
    let router = router(state.clone());

    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    tracing::info!(%addr, "API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    full_name: Option<String>,
    dob: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SigninRequest {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    email: Option<String>,
    otp: Option<String>,
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, AuthError> {
    let email = state
        .auth
        .request_signup_code(req.full_name.as_deref(), req.dob.as_deref(), req.email.as_deref())
        .await?;

    Ok(Json(json!({
        "message": format!("OTP sent to {email}. Please verify to complete signup.")
    }))
    .into_response())
}

async fn verify_signup(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, AuthError> {
    let signed_in = state
        .auth
        .verify_signup(req.email.as_deref(), req.otp.as_deref())
        .await?;

    Ok(session_response(
        &state,
        StatusCode::CREATED,
        "Signup successful!",
        signed_in,
    ))
}

async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<Response, AuthError> {
    let email = state.auth.request_signin_code(req.email.as_deref()).await?;

    Ok(Json(json!({
        "message": format!("OTP sent to {email}. Please verify to complete signin.")
    }))
    .into_response())
}

async fn verify_signin(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, AuthError> {
    let signed_in = state
        .auth
        .verify_signin(req.email.as_deref(), req.otp.as_deref())
        .await?;

    Ok(session_response(
        &state,
        StatusCode::OK,
        "Signin successful!",
        signed_in,
    ))
}

async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let claims = authenticate(&state, &headers)?;

    Ok(Json(json!({
        "message": "User profile fetched successfully.",
        "profile": claims,
    }))
    .into_response())
}

async fn protected(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let claims = authenticate(&state, &headers)?;

    Ok(Json(json!({
        "message": "You have accessed a protected route!",
        "user": claims,
    }))
    .into_response())
}

/// Logout only clears the cookie. The token itself stays valid until
/// expiry (nothing is stored server-side to revoke), so clients must
/// also drop any copy they hold.
async fn logout() -> Response {
    (
        [(header::SET_COOKIE, SessionCookie::delete_cookie_header())],
        Json(json!({ "message": "Logged out successfully." })),
    )
        .into_response()
}

/// Success body plus the Set-Cookie carrying the session token.
fn session_response(
    state: &AppState,
    status: StatusCode,
    message: &str,
    signed_in: SignedIn,
) -> Response {
    let cookie = SessionCookie::new(signed_in.token).to_cookie_header(&state.settings);

    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "message": message,
            "user": signed_in.claims,
        })),
    )
        .into_response()
}

/// Pull the session token from a Bearer header or the session cookie,
/// in that order, and validate it.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<SessionClaims, AuthError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = bearer
        .or_else(|| SessionCookie::from_headers(headers).map(|c| c.token))
        .ok_or_else(|| {
            AuthError::Unauthorized("Access Denied: No token provided.".to_string())
        })?;

    state.auth.issuer().validate(&token)
}
