use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use validator::ValidationErrors;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a handler can report.
///
/// All variants except `Internal`, `Serialization` and non-constraint
/// `Database` errors are operational: their message is safe to show to the
/// client. The rest are logged and answered with a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

const GENERIC_MESSAGE: &str = "Something went very wrong!";

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Database(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => StatusCode::CONFLICT,
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) | AppError::Serialization(_) => GENERIC_MESSAGE.to_string(),
            AppError::Database(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    "Duplicate field value. Please use another value!".to_string()
                }
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    "Referenced record does not exist".to_string()
                }
                _ => GENERIC_MESSAGE.to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.public_message();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        let label = if status.is_client_error() { "fail" } else { "error" };

        (status, Json(json!({ "status": label, "message": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| match &err.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid {}", field),
                })
            })
            .collect();
        messages.sort();

        AppError::BadRequest(format!("Invalid input data. {}", messages.join(". ")))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}
