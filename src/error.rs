use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Auth errors
    #[error("invalid code")]
    InvalidCode,
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedAuthorization,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage deadline exceeded: {0}")]
    StorageTimeout(&'static str),

    #[error("failed to sign token: {0}")]
    TokenSigning(jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification used to pick the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Auth,
    Storage,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorKind::Input,
            AppError::InvalidCode
            | AppError::MissingToken
            | AppError::MalformedAuthorization
            | AppError::InvalidToken
            | AppError::TokenExpired => ErrorKind::Auth,
            AppError::Database(_)
            | AppError::StorageTimeout(_)
            | AppError::TokenSigning(_)
            | AppError::Internal(_) => ErrorKind::Storage,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.kind() {
            ErrorKind::Input => {
                let message = match &self {
                    AppError::Validation(msg) | AppError::BadRequest(msg) => msg.clone(),
                    _ => self.to_string(),
                };
                (StatusCode::BAD_REQUEST, message)
            }
            ErrorKind::Auth => (StatusCode::UNAUTHORIZED, self.to_string()),
            // Messages are passed through; callers are internal/staging clients.
            ErrorKind::Storage => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
