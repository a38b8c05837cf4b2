use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    #[error("{0}")]
    #[diagnostic(code(postern::invalid_request))]
    InvalidRequest(String),

    #[error("{0}")]
    #[diagnostic(code(postern::conflict))]
    Conflict(String),

    #[error("{0}")]
    #[diagnostic(code(postern::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(code(postern::unauthorized))]
    Unauthorized(String),

    #[error("{0}")]
    #[diagnostic(code(postern::internal))]
    Internal(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(postern::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(postern::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(postern::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(postern::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("JOSE error: {0}")]
    #[diagnostic(code(postern::jose))]
    Jose(String),
}

impl From<josekit::JoseError> for AuthError {
    fn from(value: josekit::JoseError) -> Self {
        AuthError::Jose(value.to_string())
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_)
            | AuthError::Io(_)
            | AuthError::Config(_)
            | AuthError::Serde(_)
            | AuthError::Db(_)
            | AuthError::Jose(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal(_) is already client-facing text; other 500 variants
        // log their detail and answer with a generic message.
        let message = match &self {
            AuthError::Internal(msg) => msg.clone(),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                "Internal server error.".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
