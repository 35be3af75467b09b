use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid access key")]
    UnknownKey,
    #[error("no doctor vote to reveal")]
    NoDoctorVote,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("voting has ended")]
    VotingEnded,
    #[error("access key already used")]
    AlreadyVoted,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownKey => StatusCode::UNAUTHORIZED,
            AppError::NoDoctorVote => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) | AppError::VotingEnded | AppError::AlreadyVoted => {
                StatusCode::FORBIDDEN
            }
            AppError::Db(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Malformed or mistyped request bodies are client errors like any other
/// bad input, so they share the `{error}` shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store failures are logged in full and reported generically.
        let message = match &self {
            AppError::Db(_) | AppError::Io(_) => {
                error!(err = %self, "request failed");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
